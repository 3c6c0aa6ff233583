//! The block-structured show container.
//!
//! File layout (little-endian):
//! ```text
//! 5B B3 VERSION [CRC32 (version 2 only)] BLOCK*
//! BLOCK = TYPE:u8 LENGTH:u16 BODY[LENGTH]
//! ```
//!
//! Version 1 carries no checksum. Version 2 prepends a CRC32 (ArduPilot
//! variant) over every byte after the checksum field. Blocks follow each
//! other until end of file; unknown block types are skipped by iteration.

use std::fmt;
use std::path::Path;

use log::debug;

use crate::buffer::Buffer;
use crate::codec;
use crate::error::{Result, ShowError};

/// Leading two bytes of every show container.
pub const MAGIC: [u8; 2] = [0x5B, 0xB3];

/// Block type tags. Type 0 is reserved and never appears in a valid stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    Trajectory = 1,
    LightProgram = 2,
    Comment = 3,
    RthPlan = 4,
    YawControl = 5,
    Events = 6,
}

impl BlockType {
    /// Decode a type byte. Unknown (or reserved) types yield `None`; the
    /// container treats them as opaque, skippable blocks.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Trajectory),
            2 => Some(Self::LightProgram),
            3 => Some(Self::Comment),
            4 => Some(Self::RthPlan),
            5 => Some(Self::YawControl),
            6 => Some(Self::Events),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trajectory => write!(f, "trajectory"),
            Self::LightProgram => write!(f, "light program"),
            Self::Comment => write!(f, "comment"),
            Self::RthPlan => write!(f, "rth plan"),
            Self::YawControl => write!(f, "yaw control"),
            Self::Events => write!(f, "events"),
        }
    }
}

/// One typed, length-prefixed block inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub type_id: u8,
    pub length: u16,
    /// Byte offset of the body from the start of the file.
    pub body_offset: usize,
}

impl Block {
    pub fn block_type(&self) -> Option<BlockType> {
        BlockType::from_byte(self.type_id)
    }
}

/// A parsed show container with a block cursor.
///
/// The whole file is held in memory; construction validates magic,
/// version, and (for version 2) the body checksum, so queries afterwards
/// never touch the operating system.
#[derive(Debug)]
pub struct ShowFile<'a> {
    buf: Buffer<'a>,
    version: u8,
    body_start: usize,
    current: Option<Block>,
}

impl ShowFile<'static> {
    /// Read a container from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_vec(std::fs::read(path)?)
    }

    /// Take ownership of container bytes.
    pub fn from_vec(data: Vec<u8>) -> Result<Self> {
        Self::from_buffer(Buffer::from_vec(data)?)
    }
}

impl<'a> ShowFile<'a> {
    /// Parse a container from a borrowed byte slice.
    pub fn from_slice(data: &'a [u8]) -> Result<Self> {
        Self::from_buffer(Buffer::view(data))
    }

    /// Parse a container from an existing buffer.
    pub fn from_buffer(buf: Buffer<'a>) -> Result<Self> {
        let data = buf.as_slice();
        if data.len() < 3 {
            return Err(ShowError::truncated("container header", 0, 3, data.len()));
        }
        if data[0] != MAGIC[0] || data[1] != MAGIC[1] {
            return Err(ShowError::BadMagic {
                got0: data[0],
                got1: data[1],
            });
        }
        let version = data[2];
        let body_start = match version {
            1 => 3,
            2 => {
                let expected = codec::read_u32(data, 3)?;
                let computed = codec::crc32(&data[7..]);
                if expected != computed {
                    return Err(ShowError::ChecksumMismatch { expected, computed });
                }
                7
            }
            other => return Err(ShowError::UnsupportedVersion { version: other }),
        };
        debug!(
            "opened show container: version {version}, {} body bytes",
            data.len() - body_start
        );

        let mut file = Self {
            buf,
            version,
            body_start,
            current: None,
        };
        file.rewind()?;
        Ok(file)
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// The entire container, header included.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// Reposition the cursor at the first block.
    pub fn rewind(&mut self) -> Result<()> {
        self.current = self.block_at(self.body_start)?;
        Ok(())
    }

    /// The block under the cursor, or `None` once iteration ran off the
    /// end of the file.
    pub fn current_block(&self) -> Option<Block> {
        self.current
    }

    /// Advance the cursor to the next block.
    ///
    /// Seeking when the cursor is already past the final block fails with
    /// `EndOfStream`; the cursor stays invalid until [`rewind`].
    ///
    /// [`rewind`]: Self::rewind
    pub fn seek_next(&mut self) -> Result<()> {
        let Some(current) = self.current else {
            return Err(ShowError::EndOfStream);
        };
        self.current = self.block_at(current.body_offset + usize::from(current.length))?;
        Ok(())
    }

    /// The body bytes of a block.
    pub fn body(&self, block: &Block) -> &[u8] {
        &self.buf.as_slice()[block.body_offset..block.body_offset + usize::from(block.length)]
    }

    /// Copy the current block's body into `out`, resizing it to fit.
    pub fn read_current_body(&self, out: &mut Buffer<'_>) -> Result<()> {
        let block = self
            .current
            .ok_or(ShowError::InvalidArgument("no current block"))?;
        out.resize(usize::from(block.length))?;
        out.as_mut_slice()?.copy_from_slice(self.body(&block));
        Ok(())
    }

    /// Scan from the start of the file for the first block of a type.
    pub fn find_first_by_type(&mut self, block_type: BlockType) -> Result<Block> {
        self.rewind()?;
        loop {
            match self.current {
                Some(block) if block.type_id == block_type.as_byte() => return Ok(block),
                Some(_) => self.seek_next()?,
                None => {
                    return Err(ShowError::BlockNotFound {
                        type_id: block_type.as_byte(),
                    });
                }
            }
        }
    }

    /// Iterate all blocks without touching the cursor.
    pub fn blocks(&self) -> BlockIter<'_> {
        BlockIter {
            data: self.buf.as_slice(),
            offset: self.body_start,
            failed: false,
        }
    }

    fn block_at(&self, offset: usize) -> Result<Option<Block>> {
        let data = self.buf.as_slice();
        if offset >= data.len() {
            return Ok(None);
        }
        if data.len() - offset < 3 {
            return Err(ShowError::truncated(
                "block header",
                offset,
                3,
                data.len() - offset,
            ));
        }
        let type_id = data[offset];
        let length = codec::read_u16(data, offset + 1)?;
        let body_offset = offset + 3;
        if data.len() - body_offset < usize::from(length) {
            return Err(ShowError::truncated(
                "block body",
                body_offset,
                usize::from(length),
                data.len() - body_offset,
            ));
        }
        Ok(Some(Block {
            type_id,
            length,
            body_offset,
        }))
    }
}

/// Iterator over container blocks; stops after the first structural error.
#[derive(Debug, Clone)]
pub struct BlockIter<'f> {
    data: &'f [u8],
    offset: usize,
    failed: bool,
}

impl Iterator for BlockIter<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }
        if self.data.len() - self.offset < 3 {
            self.failed = true;
            return Some(Err(ShowError::truncated(
                "block header",
                self.offset,
                3,
                self.data.len() - self.offset,
            )));
        }
        let type_id = self.data[self.offset];
        let length = match codec::read_u16(self.data, self.offset + 1) {
            Ok(len) => len,
            Err(err) => {
                self.failed = true;
                return Some(Err(err));
            }
        };
        let body_offset = self.offset + 3;
        if self.data.len() - body_offset < usize::from(length) {
            self.failed = true;
            return Some(Err(ShowError::truncated(
                "block body",
                body_offset,
                usize::from(length),
                self.data.len() - body_offset,
            )));
        }
        self.offset = body_offset + usize::from(length);
        Some(Ok(Block {
            type_id,
            length,
            body_offset,
        }))
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Assembles a show container, computing the version-2 checksum on
/// [`finish`].
///
/// [`finish`]: Self::finish
#[derive(Debug)]
pub struct ShowFileWriter {
    version: u8,
    body: Vec<u8>,
}

impl ShowFileWriter {
    pub fn new(version: u8) -> Result<Self> {
        if version != 1 && version != 2 {
            return Err(ShowError::UnsupportedVersion { version });
        }
        Ok(Self {
            version,
            body: Vec::new(),
        })
    }

    /// Append a typed block.
    pub fn push_block(&mut self, block_type: BlockType, body: &[u8]) -> Result<&mut Self> {
        self.push_raw(block_type.as_byte(), body)
    }

    /// Append a block with an arbitrary non-zero type byte.
    pub fn push_raw(&mut self, type_id: u8, body: &[u8]) -> Result<&mut Self> {
        if type_id == 0 {
            return Err(ShowError::InvalidArgument("block type 0 is reserved"));
        }
        let length = u16::try_from(body.len())
            .map_err(|_| ShowError::InvalidArgument("block body longer than 65535 bytes"))?;
        self.body.push(type_id);
        codec::write_u16(&mut self.body, length);
        self.body.extend_from_slice(body);
        Ok(self)
    }

    /// Produce the final container bytes.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 7);
        out.extend_from_slice(&MAGIC);
        out.push(self.version);
        if self.version == 2 {
            codec::write_u32(&mut out, codec::crc32(&self.body));
        }
        out.extend_from_slice(&self.body);
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
