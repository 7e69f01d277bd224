//! Mach-O 64-bit image header and load-command walking.
//!
//! Loaded images are read in place, so every field is in host byte order.
//! Only what segment enumeration needs is decoded: the `mach_header_64`,
//! the generic `load_command` prefix, and `segment_command_64`.

use thiserror::Error;

use crate::enumerate::LibraryRegion;

/// 64-bit Mach-O magic, host byte order.
pub const MH_MAGIC_64: u32 = 0xfeed_facf;
/// 64-bit segment load command.
pub const LC_SEGMENT_64: u32 = 0x19;
/// Size of `struct mach_header_64`.
pub const MACH_HEADER_64_SIZE: usize = 32;
/// Size of the generic `struct load_command` prefix.
pub const LOAD_COMMAND_SIZE: usize = 8;
/// Size of `struct segment_command_64`.
pub const SEGMENT_COMMAND_64_SIZE: usize = 72;

/// Error type for Mach-O parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachError {
    #[error("invalid Mach-O magic: {0:#x}")]
    InvalidMagic(u32),
    #[error("buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Result type for Mach-O operations.
pub type MachResult<T> = Result<T, MachError>;

fn read_u32(data: &[u8], offset: usize) -> MachResult<u32> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(MachError::BufferTooSmall {
            needed: offset + 4,
            available: data.len(),
        })?;
    Ok(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64(data: &[u8], offset: usize) -> MachResult<u64> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or(MachError::BufferTooSmall {
            needed: offset + 8,
            available: data.len(),
        })?;
    let mut raw = [0_u8; 8];
    raw.copy_from_slice(bytes);
    Ok(u64::from_ne_bytes(raw))
}

/// `struct mach_header_64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader64 {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
}

impl MachHeader64 {
    /// Parse the header at the start of `data`.
    pub fn parse(data: &[u8]) -> MachResult<Self> {
        if data.len() < MACH_HEADER_64_SIZE {
            return Err(MachError::BufferTooSmall {
                needed: MACH_HEADER_64_SIZE,
                available: data.len(),
            });
        }
        let magic = read_u32(data, 0)?;
        if magic != MH_MAGIC_64 {
            return Err(MachError::InvalidMagic(magic));
        }
        Ok(Self {
            magic,
            cputype: read_u32(data, 4)?,
            cpusubtype: read_u32(data, 8)?,
            filetype: read_u32(data, 12)?,
            ncmds: read_u32(data, 16)?,
            sizeofcmds: read_u32(data, 20)?,
            flags: read_u32(data, 24)?,
        })
    }

    /// Header plus load commands, the span an in-memory image must expose.
    #[must_use]
    pub fn image_span(&self) -> usize {
        MACH_HEADER_64_SIZE + self.sizeofcmds as usize
    }
}

/// The address range of one `LC_SEGMENT_64` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment64 {
    pub segname: [u8; 16],
    pub vmaddr: u64,
    pub vmsize: u64,
}

impl Segment64 {
    fn parse(data: &[u8], offset: usize) -> MachResult<Self> {
        let name = data
            .get(offset + 8..offset + 24)
            .ok_or(MachError::BufferTooSmall {
                needed: offset + 24,
                available: data.len(),
            })?;
        let mut segname = [0_u8; 16];
        segname.copy_from_slice(name);
        Ok(Self {
            segname,
            vmaddr: read_u64(data, offset + 24)?,
            vmsize: read_u64(data, offset + 32)?,
        })
    }

    /// Segment name without NUL padding.
    #[must_use]
    pub fn name(&self) -> &str {
        let end = self.segname.iter().position(|&b| b == 0).unwrap_or(16);
        std::str::from_utf8(&self.segname[..end]).unwrap_or("")
    }

    /// Runtime `[low, high)` after applying the image's load slide.
    #[must_use]
    pub fn runtime_range(&self, slide: isize) -> (usize, usize) {
        let low = (self.vmaddr as usize).wrapping_add_signed(slide);
        (low, low.wrapping_add(self.vmsize as usize))
    }
}

/// Segment commands of the image whose header starts `image`.
///
/// The walk stops at a zero `cmdsize` or at a command that would run past
/// the end of `image`, keeping the segments found so far.
pub fn segments(image: &[u8]) -> MachResult<Vec<Segment64>> {
    let header = MachHeader64::parse(image)?;

    let mut found = Vec::new();
    let mut offset = MACH_HEADER_64_SIZE;
    for _ in 0..header.ncmds {
        let (Ok(cmd), Ok(cmdsize)) = (read_u32(image, offset), read_u32(image, offset + 4)) else {
            break;
        };
        if cmdsize == 0 {
            break;
        }
        let cmdsize = cmdsize as usize;
        if offset + cmdsize > image.len() {
            break;
        }
        if cmd == LC_SEGMENT_64 && cmdsize >= SEGMENT_COMMAND_64_SIZE {
            found.push(Segment64::parse(image, offset)?);
        }
        offset += cmdsize;
    }
    Ok(found)
}

/// Report every segment of one loaded image to `visitor`.
///
/// Images whose magic does not match are skipped (`0`). Returns the first
/// non-zero visitor result, otherwise `0`.
pub fn visit_image_segments(
    image: &[u8],
    slide: isize,
    path: &[u8],
    visitor: &mut dyn FnMut(&LibraryRegion<'_>) -> usize,
) -> usize {
    let segments = match segments(image) {
        Ok(segments) => segments,
        Err(err) => {
            tracing::debug!(path = %path.escape_ascii(), %err, "skipping image");
            return 0;
        }
    };
    for segment in segments {
        let (low, high) = segment.runtime_range(slide);
        let result = visitor(&LibraryRegion { path, low, high });
        if result != 0 {
            return result;
        }
    }
    0
}
