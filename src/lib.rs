pub mod buffer;
pub mod codec;
pub mod container;
pub mod error;
pub mod player;
pub mod point;
pub mod poly;
pub mod show;
pub mod stats;

pub use buffer::Buffer;
pub use container::{Block, BlockType, ShowFile, ShowFileWriter};
pub use error::{Result, ShowError};
pub use point::{BoundingBox, Point3, Point4};
pub use poly::{Poly, Poly4};
pub use show::events::{Event, EventList, EventPlayer};
pub use show::light::{LightPlayer, LightProgram, Rgb};
pub use show::rth::{RthAction, RthPlanEntry};
pub use show::trajectory::{Trajectory, TrajectoryBuilder, TrajectoryPlayer};
pub use show::yaw::{YawControl, YawPlayer};
pub use show::Show;
pub use stats::{StatsCalculator, StatsConfig, TrajectoryStats};
