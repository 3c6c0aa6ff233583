//! Light program block decoding and playback.
//!
//! The body is an opcode stream driven by a single current-color
//! register. Instantaneous opcodes mutate the register or the program
//! counter; SLEEP, WAIT_UNTIL, and the fades advance a millisecond clock
//! and become time windows the player can seek. Durations are LEB128
//! varuints in milliseconds; JUMP offsets are zigzag varints relative to
//! the byte after the operand.

use crate::codec;
use crate::container::{BlockType, ShowFile};
use crate::error::{Result, ShowError};
use crate::player::{Cursor, Landing, SegmentSource, Window};

// Opcode tags.
pub const OP_END: u8 = 0;
pub const OP_NOP: u8 = 1;
pub const OP_SLEEP: u8 = 2;
pub const OP_WAIT_UNTIL: u8 = 3;
pub const OP_SET_COLOR: u8 = 4;
pub const OP_SET_GRAY: u8 = 5;
pub const OP_SET_BLACK: u8 = 6;
pub const OP_SET_WHITE: u8 = 7;
pub const OP_FADE_TO_COLOR: u8 = 8;
pub const OP_FADE_TO_GRAY: u8 = 9;
pub const OP_FADE_TO_BLACK: u8 = 10;
pub const OP_FADE_TO_WHITE: u8 = 11;
pub const OP_LOOP_BEGIN: u8 = 12;
pub const OP_LOOP_END: u8 = 13;
pub const OP_JUMP: u8 = 18;

/// Nested loops supported by the interpreter.
const MAX_LOOP_DEPTH: usize = 8;

/// Instantaneous opcodes allowed between two time advances. A malformed
/// backward jump trips this instead of hanging a seek.
const FUEL: u32 = 65_536;

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn gray(v: u8) -> Self {
        Self { r: v, g: v, b: v }
    }

    /// Linear interpolation per channel; the fraction is clamped to [0, 1].
    pub fn lerp(self, other: Rgb, frac: f32) -> Rgb {
        let frac = frac.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * frac).round() as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

/// An encoded light program.
#[derive(Debug, Clone, Default)]
pub struct LightProgram {
    code: Vec<u8>,
}

impl LightProgram {
    /// A program that stays black forever.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap an opcode stream. Validation happens lazily during playback.
    pub fn from_bytes(code: &[u8]) -> Self {
        Self {
            code: code.to_vec(),
        }
    }

    /// Decode the first light program block of a container.
    pub fn from_show_file(file: &mut ShowFile<'_>) -> Result<Self> {
        let block = file.find_first_by_type(BlockType::LightProgram)?;
        Ok(Self::from_bytes(file.body(&block)))
    }

    /// Drop all opcodes.
    pub fn clear(&mut self) {
        self.code.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn player(&self) -> Result<LightPlayer<'_>> {
        LightPlayer::new(self)
    }
}

/// One time window of light output: constant color when the endpoints
/// match, a linear fade otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightSegment {
    pub start: Rgb,
    pub end: Rgb,
}

#[derive(Debug, Clone, Copy, Default)]
struct LoopFrame {
    body_pc: usize,
    remaining: u8,
    infinite: bool,
}

#[derive(Debug)]
struct LightSource<'a> {
    code: &'a [u8],
    pc: usize,
    clock_ms: u32,
    color: Rgb,
    loops: [LoopFrame; MAX_LOOP_DEPTH],
    depth: usize,
    ended: bool,
}

impl<'a> LightSource<'a> {
    fn new(program: &'a LightProgram) -> Self {
        Self {
            code: &program.code,
            pc: 0,
            clock_ms: 0,
            color: Rgb::BLACK,
            loops: [LoopFrame::default(); MAX_LOOP_DEPTH],
            depth: 0,
            ended: false,
        }
    }

    fn operand_u8(&self, at: usize) -> Result<u8> {
        codec::read_u8(self.code, at)
            .map_err(|_| ShowError::truncated("light opcode operand", at, 1, 0))
    }

    /// Emit a window of `duration_ms` ending in `end_color`, advancing the
    /// clock and the register.
    fn emit(&mut self, duration_ms: u32, end_color: Rgb) -> Window<LightSegment> {
        let window = Window {
            start_ms: self.clock_ms,
            duration_ms,
            data: LightSegment {
                start: self.color,
                end: end_color,
            },
        };
        self.clock_ms = self.clock_ms.saturating_add(duration_ms);
        self.color = end_color;
        window
    }
}

impl SegmentSource for LightSource<'_> {
    type Segment = LightSegment;

    fn rewind(&mut self) {
        self.pc = 0;
        self.clock_ms = 0;
        self.color = Rgb::BLACK;
        self.depth = 0;
        self.ended = false;
    }

    fn next_window(&mut self) -> Result<Option<Window<LightSegment>>> {
        if self.ended {
            return Ok(None);
        }
        let mut fuel: u32 = 0;
        loop {
            if self.pc >= self.code.len() {
                self.ended = true;
                return Ok(None);
            }
            fuel += 1;
            if fuel > FUEL {
                return Err(ShowError::NoTimeProgress { offset: self.pc });
            }
            let opcode = self.code[self.pc];
            match opcode {
                OP_END => {
                    self.ended = true;
                    return Ok(None);
                }
                OP_NOP => self.pc += 1,
                OP_SLEEP => {
                    let (duration, used) = codec::read_varuint(self.code, self.pc + 1)?;
                    self.pc += 1 + used;
                    if duration > 0 {
                        let color = self.color;
                        return Ok(Some(self.emit(duration, color)));
                    }
                }
                OP_WAIT_UNTIL => {
                    let (deadline, used) = codec::read_varuint(self.code, self.pc + 1)?;
                    self.pc += 1 + used;
                    if deadline > self.clock_ms {
                        let duration = deadline - self.clock_ms;
                        let color = self.color;
                        return Ok(Some(self.emit(duration, color)));
                    }
                }
                OP_SET_COLOR => {
                    let r = self.operand_u8(self.pc + 1)?;
                    let g = self.operand_u8(self.pc + 2)?;
                    let b = self.operand_u8(self.pc + 3)?;
                    self.color = Rgb::new(r, g, b);
                    self.pc += 4;
                }
                OP_SET_GRAY => {
                    self.color = Rgb::gray(self.operand_u8(self.pc + 1)?);
                    self.pc += 2;
                }
                OP_SET_BLACK => {
                    self.color = Rgb::BLACK;
                    self.pc += 1;
                }
                OP_SET_WHITE => {
                    self.color = Rgb::WHITE;
                    self.pc += 1;
                }
                OP_FADE_TO_COLOR => {
                    let r = self.operand_u8(self.pc + 1)?;
                    let g = self.operand_u8(self.pc + 2)?;
                    let b = self.operand_u8(self.pc + 3)?;
                    let (duration, used) = codec::read_varuint(self.code, self.pc + 4)?;
                    self.pc += 4 + used;
                    let target = Rgb::new(r, g, b);
                    if duration > 0 {
                        return Ok(Some(self.emit(duration, target)));
                    }
                    self.color = target;
                }
                OP_FADE_TO_GRAY => {
                    let target = Rgb::gray(self.operand_u8(self.pc + 1)?);
                    let (duration, used) = codec::read_varuint(self.code, self.pc + 2)?;
                    self.pc += 2 + used;
                    if duration > 0 {
                        return Ok(Some(self.emit(duration, target)));
                    }
                    self.color = target;
                }
                OP_FADE_TO_BLACK | OP_FADE_TO_WHITE => {
                    let target = if opcode == OP_FADE_TO_BLACK {
                        Rgb::BLACK
                    } else {
                        Rgb::WHITE
                    };
                    let (duration, used) = codec::read_varuint(self.code, self.pc + 1)?;
                    self.pc += 1 + used;
                    if duration > 0 {
                        return Ok(Some(self.emit(duration, target)));
                    }
                    self.color = target;
                }
                OP_LOOP_BEGIN => {
                    let count = self.operand_u8(self.pc + 1)?;
                    if self.depth >= MAX_LOOP_DEPTH {
                        return Err(ShowError::LoopTooDeep {
                            max: MAX_LOOP_DEPTH,
                            offset: self.pc,
                        });
                    }
                    self.loops[self.depth] = LoopFrame {
                        body_pc: self.pc + 2,
                        remaining: count,
                        infinite: count == 0,
                    };
                    self.depth += 1;
                    self.pc += 2;
                }
                OP_LOOP_END => {
                    if self.depth == 0 {
                        return Err(ShowError::UnbalancedLoopEnd { offset: self.pc });
                    }
                    let frame = &mut self.loops[self.depth - 1];
                    if frame.infinite {
                        self.pc = frame.body_pc;
                    } else {
                        frame.remaining -= 1;
                        if frame.remaining > 0 {
                            self.pc = frame.body_pc;
                        } else {
                            self.depth -= 1;
                            self.pc += 1;
                        }
                    }
                }
                OP_JUMP => {
                    let (offset, used) = codec::read_varint(self.code, self.pc + 1)?;
                    let base = (self.pc + 1 + used) as isize;
                    let target = base + offset as isize;
                    if target < 0 || target > self.code.len() as isize {
                        return Err(ShowError::JumpOutOfRange {
                            target,
                            len: self.code.len(),
                        });
                    }
                    self.pc = target as usize;
                }
                other => {
                    return Err(ShowError::UnknownOpcode {
                        opcode: other,
                        offset: self.pc,
                    });
                }
            }
        }
    }
}

/// Answers the light color at arbitrary show times.
#[derive(Debug)]
pub struct LightPlayer<'a> {
    cursor: Cursor<LightSource<'a>>,
}

impl<'a> LightPlayer<'a> {
    pub fn new(program: &'a LightProgram) -> Result<Self> {
        Ok(Self {
            cursor: Cursor::new(LightSource::new(program))?,
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

    pub fn current_segment(&self) -> Option<&Window<LightSegment>> {
        self.cursor.current()
    }

    /// Color at `t` seconds. Before the first window the initial color
    /// holds; after the program ends the terminal color holds.
    pub fn color_at(&mut self, t_sec: f32) -> Result<Rgb> {
        let t_ms = sec_to_ms(t_sec);
        Ok(match self.cursor.seek_ms(t_ms)? {
            // The register holds the terminal color once the source has
            // run to END (and black for an empty program).
            Landing::Empty | Landing::PastEnd => self.cursor.source().color,
            Landing::Within => {
                let window = self.cursor.current().expect("within implies a window");
                let data = window.data;
                if data.start == data.end {
                    data.start
                } else {
                    let frac = (t_ms - window.start_ms) as f32 / window.duration_ms as f32;
                    data.start.lerp(data.end, frac)
                }
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
