use std::io::{self, Write};

use bytemuck::{Pod, Zeroable};
use bytes::Bytes;

/// Header in front of every payload, little-endian on disk
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct FrameHeader {
    /// Payload length in bytes
    pub len: u32,
    pub flags: u32,
}

pub const FRAME_HEADER_SIZE: usize = std::mem::size_of::<FrameHeader>();

/// Entry was put back by a replay pass rather than appended fresh
pub const FLAG_REQUEUED: u32 = 1;

/// Bytes a payload occupies on disk
#[inline]
pub fn frame_len(payload_len: usize) -> u64 {
    (FRAME_HEADER_SIZE + payload_len) as u64
}

pub fn write_frame<W: Write>(w: &mut W, payload: &[u8], flags: u32) -> io::Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame payload of {} bytes exceeds u32", payload.len()),
        )
    })?;
    let header = FrameHeader {
        len: len.to_le(),
        flags: flags.to_le(),
    };
    w.write_all(bytemuck::bytes_of(&header))?;
    w.write_all(payload)
}

/// A decoded frame and where it starts in its segment
#[derive(Debug, Clone)]
pub struct Frame {
    pub position: u64,
    pub flags: u32,
    pub payload: Bytes,
}

/// Frames in `data[from..to]`, plus the end of the last complete frame.
/// Stops early at a torn or truncated frame.
pub fn read_frames(data: &Bytes, from: u64, to: u64) -> (Vec<Frame>, u64) {
    let to = (to as usize).min(data.len());
    let mut pos = from as usize;
    let mut frames = Vec::new();

    while pos + FRAME_HEADER_SIZE <= to {
        let header: FrameHeader =
            bytemuck::pod_read_unaligned(&data[pos..pos + FRAME_HEADER_SIZE]);
        let len = u32::from_le(header.len) as usize;
        let start = pos + FRAME_HEADER_SIZE;
        if start + len > to {
            break;
        }
        frames.push(Frame {
            position: pos as u64,
            flags: u32::from_le(header.flags),
            payload: data.slice(start..start + len),
        });
        pos = start + len;
    }
    (frames, pos as u64)
}
