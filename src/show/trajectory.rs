//! Trajectory block decoding, playback, and encoding.
//!
//! Body layout (little-endian):
//! ```text
//! SCALE:u8 FLAGS:u8 X0:i16 Y0:i16 Z0:i16 YAW0:u16 SEGMENT*
//! SEGMENT = HEADER:u8 DURATION:u16 DELTAS*
//! ```
//!
//! `HEADER` packs four 2-bit axis formats, `(yaw << 6) | (z << 4) |
//! (y << 2) | x`, each one of constant (no deltas), linear (endpoint
//! delta), or cubic Bézier (two control deltas plus endpoint). Deltas are
//! relative to the previous segment's endpoint. Stored positions convert
//! to millimeters as `mm = raw * scale`; yaw is tenths of degrees and is
//! never scaled.

use log::trace;

use crate::codec;
use crate::container::{BlockType, ShowFile};
use crate::error::{Result, ShowError};
use crate::player::{Cursor, Landing, SegmentSource, Window};
use crate::point::Point4;
use crate::poly::{Poly, Poly4};

/// Bytes before the segment stream: scale, flags, start point.
const HEADER_LEN: usize = 10;

/// Axis encodings inside a segment header.
const FMT_CONSTANT: u8 = 0;
const FMT_LINEAR: u8 = 1;
const FMT_CUBIC: u8 = 2;

/// A decoded show trajectory. Segment polynomials are reconstructed
/// lazily by the player.
#[derive(Debug, Clone)]
pub struct Trajectory {
    scale: u8,
    flags: u8,
    start: RawPoint,
    segments: Vec<u8>,
}

/// Control-point accumulator in storage units (scaled integers for the
/// position axes, tenths of degrees for yaw).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawPoint {
    x: i32,
    y: i32,
    z: i32,
    yaw_ddeg: i32,
}

impl Trajectory {
    /// Decode a trajectory block body.
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        if body.len() < HEADER_LEN {
            return Err(ShowError::truncated(
                "trajectory header",
                0,
                HEADER_LEN,
                body.len(),
            ));
        }
        let scale = body[0];
        if scale == 0 || scale > 127 {
            return Err(ShowError::BadScale { scale });
        }
        let start = RawPoint {
            x: i32::from(codec::read_i16(body, 2)?),
            y: i32::from(codec::read_i16(body, 4)?),
            z: i32::from(codec::read_i16(body, 6)?),
            yaw_ddeg: i32::from(codec::read_u16(body, 8)?),
        };
        Ok(Self {
            scale,
            flags: body[1],
            start,
            segments: body[HEADER_LEN..].to_vec(),
        })
    }

    /// Decode the first trajectory block of a container.
    pub fn from_show_file(file: &mut ShowFile<'_>) -> Result<Self> {
        let block = file.find_first_by_type(BlockType::Trajectory)?;
        Self::from_bytes(file.body(&block))
    }

    /// Millimeters per stored coordinate unit.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// True if the segment stream is empty.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first point of the flight, in millimeters and degrees.
    pub fn start_point(&self) -> Point4 {
        self.point_of(self.start)
    }

    /// Attach a player to this trajectory.
    pub fn player(&self) -> Result<TrajectoryPlayer<'_>> {
        TrajectoryPlayer::new(self)
    }

    fn point_of(&self, raw: RawPoint) -> Point4 {
        let s = f32::from(self.scale);
        Point4 {
            x: raw.x as f32 * s,
            y: raw.y as f32 * s,
            z: raw.z as f32 * s,
            yaw: raw.yaw_ddeg as f32 / 10.0,
        }
    }
}

/// One reconstructed trajectory segment.
#[derive(Debug, Clone)]
pub struct TrajectorySegment {
    /// Position/yaw polynomials over `[0, duration]` seconds.
    pub poly: Poly4,
    pub start: Point4,
    pub end: Point4,
}

/// Lazy segment decoder driving the generic cursor.
#[derive(Debug)]
struct TrajectorySource<'a> {
    traj: &'a Trajectory,
    offset: usize,
    t_ms: u32,
    last: RawPoint,
}

impl<'a> TrajectorySource<'a> {
    fn new(traj: &'a Trajectory) -> Self {
        Self {
            traj,
            offset: 0,
            t_ms: 0,
            last: traj.start,
        }
    }

    /// Read the delta values for one axis and return its absolute control
    /// points in storage units. `cursor` advances past the deltas.
    fn axis_controls(
        &self,
        fmt: u8,
        header: u8,
        prev: i32,
        cursor: &mut usize,
    ) -> Result<([i32; 4], usize)> {
        let seg = &self.traj.segments;
        let mut points = [prev; 4];
        let count = match fmt {
            FMT_CONSTANT => 1,
            FMT_LINEAR => 2,
            FMT_CUBIC => 4,
            _ => {
                return Err(ShowError::ReservedAxisFormat {
                    header,
                    offset: HEADER_LEN + self.offset,
                });
            }
        };
        for slot in points.iter_mut().take(count).skip(1) {
            let delta = codec::read_i16(seg, *cursor).map_err(|_| {
                ShowError::truncated(
                    "segment deltas",
                    HEADER_LEN + *cursor,
                    2,
                    seg.len().saturating_sub(*cursor),
                )
            })?;
            *slot = prev + i32::from(delta);
            *cursor += 2;
        }
        Ok((points, count))
    }
}

impl SegmentSource for TrajectorySource<'_> {
    type Segment = TrajectorySegment;

    fn rewind(&mut self) {
        self.offset = 0;
        self.t_ms = 0;
        self.last = self.traj.start;
    }

    fn next_window(&mut self) -> Result<Option<Window<TrajectorySegment>>> {
        let seg = &self.traj.segments;
        if self.offset >= seg.len() {
            return Ok(None);
        }
        let header = codec::read_u8(seg, self.offset)?;
        let duration_ms = codec::read_u16(seg, self.offset + 1).map_err(|_| {
            ShowError::truncated(
                "segment header",
                HEADER_LEN + self.offset,
                3,
                seg.len() - self.offset,
            )
        })?;
        if duration_ms == 0 {
            return Err(ShowError::ZeroDuration {
                offset: HEADER_LEN + self.offset,
            });
        }
        let duration_sec = f32::from(duration_ms) / 1000.0;
        let mut cursor = self.offset + 3;

        let scale = f32::from(self.traj.scale);
        let mut polys = [Poly::zero(); 4];
        let mut end = self.last;
        for (axis, poly) in polys.iter_mut().enumerate() {
            let fmt = (header >> (axis * 2)) & 0x3;
            let prev = match axis {
                0 => self.last.x,
                1 => self.last.y,
                2 => self.last.z,
                _ => self.last.yaw_ddeg,
            };
            let (points, count) = self.axis_controls(fmt, header, prev, &mut cursor)?;
            let mut mm = [0.0f32; 4];
            for (value, raw) in mm.iter_mut().zip(points.iter()) {
                *value = if axis == 3 {
                    *raw as f32 / 10.0
                } else {
                    *raw as f32 * scale
                };
            }
            *poly = Poly::bezier(duration_sec, &mm[..count])?;
            let axis_end = points[count - 1];
            match axis {
                0 => end.x = axis_end,
                1 => end.y = axis_end,
                2 => end.z = axis_end,
                _ => end.yaw_ddeg = axis_end,
            }
        }

        let poly = Poly4::new(polys[0], polys[1], polys[2], polys[3]);
        let window = Window {
            start_ms: self.t_ms,
            duration_ms: u32::from(duration_ms),
            data: TrajectorySegment {
                poly,
                start: self.traj.point_of(self.last),
                end: self.traj.point_of(end),
            },
        };
        trace!(
            "trajectory segment at {} ms, {} ms long, {} bytes",
            self.t_ms,
            duration_ms,
            cursor - self.offset
        );
        self.offset = cursor;
        self.t_ms = self.t_ms.saturating_add(u32::from(duration_ms));
        self.last = end;
        Ok(Some(window))
    }
}

/// A stateful evaluator answering position, velocity, and acceleration
/// queries at arbitrary show times.
///
/// The player borrows its trajectory and caches one decoded segment;
/// monotone query sequences decode each segment once.
#[derive(Debug)]
pub struct TrajectoryPlayer<'a> {
    traj: &'a Trajectory,
    cursor: Cursor<TrajectorySource<'a>>,
}

impl<'a> TrajectoryPlayer<'a> {
    pub fn new(traj: &'a Trajectory) -> Result<Self> {
        Ok(Self {
            traj,
            cursor: Cursor::new(TrajectorySource::new(traj))?,
        })
    }

    /// Restart at the first segment.
    pub fn rewind(&mut self) -> Result<()> {
        self.cursor.rewind()
    }

    /// Decode the next segment; `false` at end of stream.
    pub fn build_next_segment(&mut self) -> Result<bool> {
        self.cursor.build_next_segment()
    }

    pub fn has_more_segments(&self) -> bool {
        self.cursor.has_more_segments()
    }

    /// The cached segment, with its absolute start time and duration.
    pub fn current_segment(&self) -> Option<&Window<TrajectorySegment>> {
        self.cursor.current()
    }

    /// Position at `t` seconds. Queries clamp to the flight's endpoints;
    /// an empty trajectory answers its start point everywhere.
    pub fn position_at(&mut self, t_sec: f32) -> Result<Point4> {
        let t_ms = sec_to_ms(t_sec);
        Ok(match self.cursor.seek_ms(t_ms)? {
            Landing::Empty => self.traj.start_point(),
            Landing::Within => {
                let window = self.cursor.current().expect("within implies a window");
                window.data.poly.eval(window.local_sec(t_ms))
            }
            Landing::PastEnd => {
                let window = self.cursor.current().expect("past-end keeps the last window");
                window.data.end
            }
        })
    }

    /// Velocity at `t` seconds (mm/s, degrees/s). Zero outside the flight.
    pub fn velocity_at(&mut self, t_sec: f32) -> Result<Point4> {
        self.derivative_at(t_sec, 1)
    }

    /// Acceleration at `t` seconds (mm/s², degrees/s²). Zero outside the
    /// flight.
    pub fn acceleration_at(&mut self, t_sec: f32) -> Result<Point4> {
        self.derivative_at(t_sec, 2)
    }

    fn derivative_at(&mut self, t_sec: f32, order: u32) -> Result<Point4> {
        let t_ms = sec_to_ms(t_sec);
        Ok(match self.cursor.seek_ms(t_ms)? {
            Landing::Empty | Landing::PastEnd => Point4::ZERO,
            Landing::Within => {
                let window = self.cursor.current().expect("within implies a window");
                let mut poly = window.data.poly;
                for _ in 0..order {
                    poly.differentiate();
                }
                poly.eval(window.local_sec(t_ms))
            }
        })
    }
}

/// Convert a query time to milliseconds, clamping negatives (and NaN) to
/// zero and saturating far past any representable show.
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
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum AxisCurve {
    Hold,
    /// Absolute target in millimeters (tenths of degrees for yaw).
    Line(i32),
    /// Two intermediate controls plus target, absolute.
    Cubic(i32, i32, i32),
}

#[derive(Debug, Clone, Copy)]
struct SegmentSpec {
    duration_ms: u16,
    x: AxisCurve,
    y: AxisCurve,
    z: AxisCurve,
    yaw: AxisCurve,
}

/// Encodes waypoint segments into the trajectory body format, fitting the
/// smallest storage scale that keeps every coordinate within 16 bits.
///
/// Used by the return-to-home synthesis and by test fixtures.
#[derive(Debug, Clone)]
pub struct TrajectoryBuilder {
    start_mm: (i32, i32, i32),
    start_yaw_ddeg: u16,
    specs: Vec<SegmentSpec>,
}

impl TrajectoryBuilder {
    /// Start a trajectory at a position in millimeters and a yaw in
    /// tenths of degrees.
    pub fn new(x_mm: i32, y_mm: i32, z_mm: i32, yaw_ddeg: u16) -> Self {
        Self {
            start_mm: (x_mm, y_mm, z_mm),
            start_yaw_ddeg: yaw_ddeg,
            specs: Vec::new(),
        }
    }

    /// Hover in place.
    pub fn hold(&mut self, duration_ms: u16) -> Result<&mut Self> {
        self.push(SegmentSpec {
            duration_ms,
            x: AxisCurve::Hold,
            y: AxisCurve::Hold,
            z: AxisCurve::Hold,
            yaw: AxisCurve::Hold,
        })
    }

    /// Straight line to a position in millimeters.
    pub fn line_to(&mut self, x: i32, y: i32, z: i32, duration_ms: u16) -> Result<&mut Self> {
        self.push(SegmentSpec {
            duration_ms,
            x: AxisCurve::Line(x),
            y: AxisCurve::Line(y),
            z: AxisCurve::Line(z),
            yaw: AxisCurve::Hold,
        })
    }

    /// Cubic Bézier to `end` with two intermediate control points, all in
    /// millimeters.
    pub fn cubic_to(
        &mut self,
        c1: (i32, i32, i32),
        c2: (i32, i32, i32),
        end: (i32, i32, i32),
        duration_ms: u16,
    ) -> Result<&mut Self> {
        self.push(SegmentSpec {
            duration_ms,
            x: AxisCurve::Cubic(c1.0, c2.0, end.0),
            y: AxisCurve::Cubic(c1.1, c2.1, end.1),
            z: AxisCurve::Cubic(c1.2, c2.2, end.2),
            yaw: AxisCurve::Hold,
        })
    }

    /// Rotate in place to an absolute yaw in tenths of degrees.
    pub fn yaw_to(&mut self, yaw_ddeg: i32, duration_ms: u16) -> Result<&mut Self> {
        self.push(SegmentSpec {
            duration_ms,
            x: AxisCurve::Hold,
            y: AxisCurve::Hold,
            z: AxisCurve::Hold,
            yaw: AxisCurve::Line(yaw_ddeg),
        })
    }

    fn push(&mut self, spec: SegmentSpec) -> Result<&mut Self> {
        if spec.duration_ms == 0 {
            return Err(ShowError::InvalidArgument("segment duration must be > 0"));
        }
        self.specs.push(spec);
        Ok(self)
    }

    /// Encode the body and decode it back into a [`Trajectory`].
    pub fn finish(&self) -> Result<Trajectory> {
        Trajectory::from_bytes(&self.encode()?)
    }

    /// Encode the trajectory block body.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let scale = self.fit_scale()?;
        let mut body = Vec::new();
        body.push(scale);
        body.push(0); // flags
        codec::write_i16(&mut body, quantize(self.start_mm.0, scale) as i16);
        codec::write_i16(&mut body, quantize(self.start_mm.1, scale) as i16);
        codec::write_i16(&mut body, quantize(self.start_mm.2, scale) as i16);
        codec::write_u16(&mut body, self.start_yaw_ddeg);

        let mut last = (
            quantize(self.start_mm.0, scale),
            quantize(self.start_mm.1, scale),
            quantize(self.start_mm.2, scale),
            i32::from(self.start_yaw_ddeg),
        );
        for spec in &self.specs {
            let axes = [spec.x, spec.y, spec.z, spec.yaw];
            let mut header = 0u8;
            for (i, axis) in axes.iter().enumerate() {
                let fmt = match axis {
                    AxisCurve::Hold => FMT_CONSTANT,
                    AxisCurve::Line(_) => FMT_LINEAR,
                    AxisCurve::Cubic(..) => FMT_CUBIC,
                };
                header |= fmt << (i * 2);
            }
            body.push(header);
            codec::write_u16(&mut body, spec.duration_ms);

            let prevs = [last.0, last.1, last.2, last.3];
            let mut ends = prevs;
            for (i, axis) in axes.iter().enumerate() {
                // Yaw is stored unscaled.
                let s = if i == 3 { 1 } else { scale };
                let prev = prevs[i];
                let (targets, count) = axis_targets(axis);
                for &target in &targets[..count] {
                    let raw = quantize(target, s);
                    let delta = i16::try_from(raw - prev)
                        .map_err(|_| ShowError::CoordinateOverflow { value: target })?;
                    codec::write_i16(&mut body, delta);
                    ends[i] = raw;
                }
            }
            last = (ends[0], ends[1], ends[2], ends[3]);
        }
        Ok(body)
    }

    /// Smallest scale in 1..=127 keeping every stored value and delta in
    /// 16 bits.
    fn fit_scale(&self) -> Result<u8> {
        'scales: for scale in 1u8..=127 {
            let mut coords = vec![
                quantize(self.start_mm.0, scale),
                quantize(self.start_mm.1, scale),
                quantize(self.start_mm.2, scale),
            ];
            let mut last = [
                quantize(self.start_mm.0, scale),
                quantize(self.start_mm.1, scale),
                quantize(self.start_mm.2, scale),
            ];
            let mut deltas_ok = true;
            for spec in &self.specs {
                for (i, axis) in [spec.x, spec.y, spec.z].iter().enumerate() {
                    let (targets, count) = axis_targets(axis);
                    let segment_start = last[i];
                    for &target in &targets[..count] {
                        let raw = quantize(target, scale);
                        coords.push(raw);
                        // Deltas are relative to the segment's start point.
                        if i16::try_from(raw - segment_start).is_err() {
                            deltas_ok = false;
                        }
                        last[i] = raw;
                    }
                }
            }
            if !deltas_ok {
                continue 'scales;
            }
            for &raw in &coords {
                if i16::try_from(raw).is_err() {
                    continue 'scales;
                }
            }
            return Ok(scale);
        }
        let worst = self
            .extreme_coordinate()
            .expect("scale fitting fails only with coordinates present");
        Err(ShowError::CoordinateOverflow { value: worst })
    }

    fn extreme_coordinate(&self) -> Option<i32> {
        let mut worst: Option<i32> = None;
        let mut consider = |v: i32| {
            if worst.is_none_or(|w| v.abs() > w.abs()) {
                worst = Some(v);
            }
        };
        consider(self.start_mm.0);
        consider(self.start_mm.1);
        consider(self.start_mm.2);
        for spec in &self.specs {
            for axis in [spec.x, spec.y, spec.z] {
                match axis {
                    AxisCurve::Hold => {}
                    AxisCurve::Line(end) => consider(end),
                    AxisCurve::Cubic(c1, c2, end) => {
                        consider(c1);
                        consider(c2);
                        consider(end);
                    }
                }
            }
        }
        worst
    }
}

/// Absolute control-point targets encoded by one axis curve.
fn axis_targets(axis: &AxisCurve) -> ([i32; 3], usize) {
    match axis {
        AxisCurve::Hold => ([0; 3], 0),
        AxisCurve::Line(end) => ([*end, 0, 0], 1),
        AxisCurve::Cubic(c1, c2, end) => ([*c1, *c2, *end], 3),
    }
}

/// Round a millimeter value to storage units at a scale.
fn quantize(mm: i32, scale: u8) -> i32 {
    (f64::from(mm) / f64::from(scale)).round() as i32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
