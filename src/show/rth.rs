//! Return-to-home plan decoding and trajectory synthesis.
//!
//! Body layout (little-endian):
//! ```text
//! VERSION:u8 ACTION:u8 START:3*i32 TARGET:2*i32 TARGET_ALT:i32
//! PRE_DELAY:u16 POST_DELAY:u16 PRE_NECK:i32 PRE_NECK_DURATION:u16
//! DURATION:u32
//! ```
//!
//! An entry expands into ordinary trajectory segments (hover, optional
//! vertical neck, the action itself, hover again), so the standard
//! trajectory player evaluates the fallback plan with no special cases.

use crate::codec;
use crate::container::{BlockType, ShowFile};
use crate::error::{Result, ShowError};
use crate::show::trajectory::{Trajectory, TrajectoryBuilder};

const ENTRY_LEN: usize = 40;

/// What the fallback plan does after the optional neck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RthAction {
    /// Descend vertically to the target altitude.
    Land = 0,
    /// Fly to the target, keeping altitude.
    GoTo = 1,
    /// Fly to the target and the target altitude together.
    GoTo3d = 2,
}

impl RthAction {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::Land),
            1 => Ok(Self::GoTo),
            2 => Ok(Self::GoTo3d),
            _ => Err(ShowError::InvalidArgument("unknown rth action")),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One return-to-home plan entry. Distances are millimeters, times
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RthPlanEntry {
    pub action: RthAction,
    pub start: (i32, i32, i32),
    pub target: (i32, i32),
    pub target_altitude: i32,
    pub pre_delay_ms: u16,
    pub post_delay_ms: u16,
    pub pre_neck_mm: i32,
    pub pre_neck_duration_ms: u16,
    pub duration_ms: u32,
}

impl RthPlanEntry {
    pub fn decode(body: &[u8]) -> Result<Self> {
        if body.len() < ENTRY_LEN {
            return Err(ShowError::truncated("rth plan entry", 0, ENTRY_LEN, body.len()));
        }
        let version = body[0];
        if version != 0 {
            return Err(ShowError::UnsupportedVersion { version });
        }
        Ok(Self {
            action: RthAction::from_byte(body[1])?,
            start: (
                codec::read_i32(body, 2)?,
                codec::read_i32(body, 6)?,
                codec::read_i32(body, 10)?,
            ),
            target: (codec::read_i32(body, 14)?, codec::read_i32(body, 18)?),
            target_altitude: codec::read_i32(body, 22)?,
            pre_delay_ms: codec::read_u16(body, 26)?,
            post_delay_ms: codec::read_u16(body, 28)?,
            pre_neck_mm: codec::read_i32(body, 30)?,
            pre_neck_duration_ms: codec::read_u16(body, 34)?,
            duration_ms: codec::read_u32(body, 36)?,
        })
    }

    /// Decode the first RTH plan block of a container.
    pub fn from_show_file(file: &mut ShowFile<'_>) -> Result<Self> {
        let block = file.find_first_by_type(BlockType::RthPlan)?;
        Self::decode(file.body(&block))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(ENTRY_LEN);
        body.push(0);
        body.push(self.action.as_byte());
        codec::write_i32(&mut body, self.start.0);
        codec::write_i32(&mut body, self.start.1);
        codec::write_i32(&mut body, self.start.2);
        codec::write_i32(&mut body, self.target.0);
        codec::write_i32(&mut body, self.target.1);
        codec::write_i32(&mut body, self.target_altitude);
        codec::write_u16(&mut body, self.pre_delay_ms);
        codec::write_u16(&mut body, self.post_delay_ms);
        codec::write_i32(&mut body, self.pre_neck_mm);
        codec::write_u16(&mut body, self.pre_neck_duration_ms);
        codec::write_u32(&mut body, self.duration_ms);
        body
    }

    /// Expand into a synthetic trajectory the standard player evaluates.
    pub fn to_trajectory(&self) -> Result<Trajectory> {
        if self.duration_ms == 0 {
            return Err(ShowError::InvalidArgument("rth action duration must be > 0"));
        }
        let (x0, y0, z0) = self.start;
        let mut builder = TrajectoryBuilder::new(x0, y0, z0, 0);

        if self.pre_delay_ms > 0 {
            builder.hold(self.pre_delay_ms)?;
        }

        let mut z = z0;
        if self.pre_neck_mm != 0 && self.pre_neck_duration_ms > 0 {
            z += self.pre_neck_mm;
            builder.line_to(x0, y0, z, self.pre_neck_duration_ms)?;
        }

        // The action may outlast a single 16-bit segment duration.
        let mut remaining = self.duration_ms;
        let (end_x, end_y, end_z) = match self.action {
            RthAction::Land => (x0, y0, self.target_altitude),
            RthAction::GoTo => (self.target.0, self.target.1, z),
            RthAction::GoTo3d => (self.target.0, self.target.1, self.target_altitude),
        };
        let mut elapsed: u64 = 0;
        let total = u64::from(self.duration_ms);
        let (sx, sy, sz) = (x0, y0, z);
        while remaining > 0 {
            let step = remaining.min(u32::from(u16::MAX)) as u16;
            elapsed += u64::from(step);
            let frac = elapsed as f64 / total as f64;
            let at = |a: i32, b: i32| a + ((f64::from(b - a) * frac).round() as i32);
            builder.line_to(at(sx, end_x), at(sy, end_y), at(sz, end_z), step)?;
            remaining -= u32::from(step);
        }

        if self.post_delay_ms > 0 {
            builder.hold(self.post_delay_ms)?;
        }

        builder.finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
