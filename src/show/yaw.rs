//! Yaw control block decoding and playback.
//!
//! Body layout (little-endian):
//! ```text
//! FLAGS:u8 OFFSET:i16 DELTA*
//! DELTA = DURATION:u16 CHANGE:i16
//! ```
//!
//! `FLAGS` bit 0 selects auto-yaw. All yaw values are tenths of degrees;
//! the absolute yaw at a segment start is the offset plus the cumulative
//! sum of the preceding changes.

use crate::codec;
use crate::container::{BlockType, ShowFile};
use crate::error::{Result, ShowError};
use crate::player::{Cursor, Landing, SegmentSource, Window};

const HEADER_LEN: usize = 3;

/// Decoded yaw setpoint stream.
#[derive(Debug, Clone)]
pub struct YawControl {
    auto_yaw: bool,
    offset_ddeg: i16,
    deltas: Vec<u8>,
}

impl YawControl {
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        if body.len() < HEADER_LEN {
            return Err(ShowError::truncated(
                "yaw control header",
                0,
                HEADER_LEN,
                body.len(),
            ));
        }
        Ok(Self {
            auto_yaw: body[0] & 0x01 != 0,
            offset_ddeg: codec::read_i16(body, 1)?,
            deltas: body[HEADER_LEN..].to_vec(),
        })
    }

    /// Decode the first yaw control block of a container.
    pub fn from_show_file(file: &mut ShowFile<'_>) -> Result<Self> {
        let block = file.find_first_by_type(BlockType::YawControl)?;
        Self::from_bytes(file.body(&block))
    }

    /// Whether yaw should instead follow the trajectory heading. The
    /// player answers zero in this mode; composing the heading is the
    /// caller's job.
    pub fn auto_yaw(&self) -> bool {
        self.auto_yaw
    }

    /// Constant offset applied to every setpoint, tenths of degrees.
    pub fn offset_ddeg(&self) -> i16 {
        self.offset_ddeg
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn player(&self) -> Result<YawPlayer<'_>> {
        YawPlayer::new(self)
    }
}

/// One yaw segment: linear motion from `start_ddeg` by `change_ddeg`.
#[derive(Debug, Clone, Copy)]
pub struct YawSegment {
    pub start_ddeg: i32,
    pub change_ddeg: i16,
}

impl YawSegment {
    pub fn end_ddeg(&self) -> i32 {
        self.start_ddeg + i32::from(self.change_ddeg)
    }
}

#[derive(Debug)]
struct YawSource<'a> {
    ctrl: &'a YawControl,
    offset: usize,
    t_ms: u32,
    acc_ddeg: i32,
}

impl<'a> YawSource<'a> {
    fn new(ctrl: &'a YawControl) -> Self {
        Self {
            ctrl,
            offset: 0,
            t_ms: 0,
            acc_ddeg: i32::from(ctrl.offset_ddeg),
        }
    }
}

impl SegmentSource for YawSource<'_> {
    type Segment = YawSegment;

    fn rewind(&mut self) {
        self.offset = 0;
        self.t_ms = 0;
        self.acc_ddeg = i32::from(self.ctrl.offset_ddeg);
    }

    fn next_window(&mut self) -> Result<Option<Window<YawSegment>>> {
        let deltas = &self.ctrl.deltas;
        if self.offset >= deltas.len() {
            return Ok(None);
        }
        let duration_ms = codec::read_u16(deltas, self.offset).map_err(|_| {
            ShowError::truncated(
                "yaw delta",
                HEADER_LEN + self.offset,
                4,
                deltas.len() - self.offset,
            )
        })?;
        let change_ddeg = codec::read_i16(deltas, self.offset + 2).map_err(|_| {
            ShowError::truncated(
                "yaw delta",
                HEADER_LEN + self.offset,
                4,
                deltas.len() - self.offset,
            )
        })?;
        if duration_ms == 0 {
            return Err(ShowError::ZeroDuration {
                offset: HEADER_LEN + self.offset,
            });
        }
        let window = Window {
            start_ms: self.t_ms,
            duration_ms: u32::from(duration_ms),
            data: YawSegment {
                start_ddeg: self.acc_ddeg,
                change_ddeg,
            },
        };
        self.offset += 4;
        self.t_ms = self.t_ms.saturating_add(u32::from(duration_ms));
        self.acc_ddeg += i32::from(change_ddeg);
        Ok(Some(window))
    }
}

/// Answers absolute yaw and yaw rate at arbitrary show times.
#[derive(Debug)]
pub struct YawPlayer<'a> {
    ctrl: &'a YawControl,
    cursor: Cursor<YawSource<'a>>,
}

impl<'a> YawPlayer<'a> {
    pub fn new(ctrl: &'a YawControl) -> Result<Self> {
        Ok(Self {
            ctrl,
            cursor: Cursor::new(YawSource::new(ctrl))?,
        })
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.cursor.rewind()
    }

    pub fn build_next_segment(&mut self) -> Result<bool> {
        self.cursor.build_next_segment()
    }

    pub fn has_more_segments(&self) -> bool {
        self.cursor.has_more_segments()
    }

    pub fn current_segment(&self) -> Option<&Window<YawSegment>> {
        self.cursor.current()
    }

    /// Yaw in degrees at `t` seconds. Zero in auto-yaw mode; clamps to
    /// the first/last setpoint outside the timeline.
    pub fn yaw_at(&mut self, t_sec: f32) -> Result<f32> {
        if self.ctrl.auto_yaw {
            return Ok(0.0);
        }
        let t_ms = sec_to_ms(t_sec);
        Ok(match self.cursor.seek_ms(t_ms)? {
            Landing::Empty => f32::from(self.ctrl.offset_ddeg) / 10.0,
            Landing::Within => {
                let window = self.cursor.current().expect("within implies a window");
                let frac = (t_ms - window.start_ms) as f32 / window.duration_ms as f32;
                (window.data.start_ddeg as f32 + f32::from(window.data.change_ddeg) * frac) / 10.0
            }
            Landing::PastEnd => {
                let window = self.cursor.current().expect("past-end keeps the last window");
                window.data.end_ddeg() as f32 / 10.0
            }
        })
    }

    /// Yaw rate in degrees per second at `t` seconds. Zero in auto-yaw
    /// mode and outside the timeline.
    pub fn yaw_rate_at(&mut self, t_sec: f32) -> Result<f32> {
        if self.ctrl.auto_yaw {
            return Ok(0.0);
        }
        let t_ms = sec_to_ms(t_sec);
        Ok(match self.cursor.seek_ms(t_ms)? {
            Landing::Empty | Landing::PastEnd => 0.0,
            Landing::Within => {
                let window = self.cursor.current().expect("within implies a window");
                // ddeg per msec equals 100 deg per sec.
                f32::from(window.data.change_ddeg) / window.duration_ms as f32 * 100.0
            }
        })
    }
}

fn sec_to_ms(t_sec: f32) -> u32 {
    if !(t_sec > 0.0) {
        return 0;
    }
    let ms = (f64::from(t_sec) * 1000.0).round();
    if ms >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        ms as u32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-3, "expected {b}, got {a}");
    }

    /// Offset 90.0 deg, then +45 deg over 3 s, then -90 deg over 2 s.
    fn sample() -> YawControl {
        let mut body = vec![0u8];
        codec::write_i16(&mut body, 900);
        codec::write_u16(&mut body, 3000);
        codec::write_i16(&mut body, 450);
        codec::write_u16(&mut body, 2000);
        codec::write_i16(&mut body, -900);
        YawControl::from_bytes(&body).unwrap()
    }

    #[test]
    fn decode_header() {
        let ctrl = sample();
        assert!(!ctrl.auto_yaw());
        assert_eq!(ctrl.offset_ddeg(), 900);
        assert!(!ctrl.is_empty());
    }

    #[test]
    fn absolute_yaw_accumulates() {
        let ctrl = sample();
        let mut player = ctrl.player().unwrap();
        assert_close(player.yaw_at(0.0).unwrap(), 90.0);
        assert_close(player.yaw_at(1.5).unwrap(), 112.5);
        assert_close(player.yaw_at(3.0).unwrap(), 135.0);
        assert_close(player.yaw_at(4.0).unwrap(), 90.0);
        assert_close(player.yaw_at(5.0).unwrap(), 45.0);
    }

    #[test]
    fn clamps_outside_timeline() {
        let ctrl = sample();
        let mut player = ctrl.player().unwrap();
        assert_close(player.yaw_at(-1.0).unwrap(), 90.0);
        assert_close(player.yaw_at(99.0).unwrap(), 45.0);
        assert_eq!(player.yaw_rate_at(99.0).unwrap(), 0.0);
    }

    #[test]
    fn yaw_rate_per_segment() {
        let ctrl = sample();
        let mut player = ctrl.player().unwrap();
        assert_close(player.yaw_rate_at(1.0).unwrap(), 15.0);
        assert_close(player.yaw_rate_at(4.0).unwrap(), -45.0);
    }

    #[test]
    fn backward_query_rewinds() {
        let ctrl = sample();
        let mut player = ctrl.player().unwrap();
        assert_close(player.yaw_at(4.5).unwrap(), 67.5);
        assert_close(player.yaw_at(0.5).unwrap(), 97.5);
    }

    #[test]
    fn auto_yaw_answers_zero() {
        let mut body = vec![1u8];
        codec::write_i16(&mut body, 900);
        codec::write_u16(&mut body, 1000);
        codec::write_i16(&mut body, 100);
        let ctrl = YawControl::from_bytes(&body).unwrap();
        assert!(ctrl.auto_yaw());
        let mut player = ctrl.player().unwrap();
        assert_eq!(player.yaw_at(0.5).unwrap(), 0.0);
        assert_eq!(player.yaw_rate_at(0.5).unwrap(), 0.0);
    }

    #[test]
    fn empty_control_holds_offset() {
        let mut body = vec![0u8];
        codec::write_i16(&mut body, -450);
        let ctrl = YawControl::from_bytes(&body).unwrap();
        assert!(ctrl.is_empty());
        let mut player = ctrl.player().unwrap();
        assert_close(player.yaw_at(10.0).unwrap(), -45.0);
        assert_eq!(player.yaw_rate_at(10.0).unwrap(), 0.0);
    }

    #[test]
    fn zero_duration_rejected() {
        let mut body = vec![0u8];
        codec::write_i16(&mut body, 0);
        codec::write_u16(&mut body, 0);
        codec::write_i16(&mut body, 100);
        let ctrl = YawControl::from_bytes(&body).unwrap();
        assert!(matches!(ctrl.player(), Err(ShowError::ZeroDuration { .. })));
    }

    #[test]
    fn truncated_delta_rejected() {
        let mut body = vec![0u8];
        codec::write_i16(&mut body, 0);
        body.push(0xE8); // half a duration field
        let ctrl = YawControl::from_bytes(&body).unwrap();
        assert!(matches!(ctrl.player(), Err(ShowError::Truncated { .. })));
    }
}
