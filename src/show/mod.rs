//! Per-block-type decoders and the aggregate show loader.

pub mod events;
pub mod light;
pub mod rth;
pub mod trajectory;
pub mod yaw;

use log::debug;

use crate::container::{BlockType, ShowFile};
use crate::error::Result;

use events::EventList;
use light::LightProgram;
use rth::RthPlanEntry;
use trajectory::Trajectory;
use yaw::YawControl;

/// Everything a show container can hold, decoded in one pass.
///
/// Absent blocks stay `None`; unknown block types are skipped.
#[derive(Debug, Clone, Default)]
pub struct Show {
    pub trajectory: Option<Trajectory>,
    pub lights: Option<LightProgram>,
    pub yaw: Option<YawControl>,
    pub events: Option<EventList>,
    pub rth_plan: Option<RthPlanEntry>,
    pub comment: Option<String>,
}

impl Show {
    /// Decode every known block of a container. The first block of each
    /// type wins; duplicates are ignored.
    pub fn load(file: &ShowFile<'_>) -> Result<Self> {
        let mut show = Show::default();
        for block in file.blocks() {
            let block = block?;
            let body = file.body(&block);
            match block.block_type() {
                Some(BlockType::Trajectory) if show.trajectory.is_none() => {
                    show.trajectory = Some(Trajectory::from_bytes(body)?);
                }
                Some(BlockType::LightProgram) if show.lights.is_none() => {
                    show.lights = Some(LightProgram::from_bytes(body));
                }
                Some(BlockType::YawControl) if show.yaw.is_none() => {
                    show.yaw = Some(YawControl::from_bytes(body)?);
                }
                Some(BlockType::Events) if show.events.is_none() => {
                    show.events = Some(EventList::from_bytes(body)?);
                }
                Some(BlockType::RthPlan) if show.rth_plan.is_none() => {
                    show.rth_plan = Some(RthPlanEntry::decode(body)?);
                }
                Some(BlockType::Comment) if show.comment.is_none() => {
                    show.comment = Some(String::from_utf8_lossy(body).into_owned());
                }
                Some(_) => {}
                None => debug!("skipping unknown block type {}", block.type_id),
            }
        }
        Ok(show)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
