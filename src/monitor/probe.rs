//! Video duration probe
//!
//! Reads the movie header (`moov/mvhd`) of an ISO base media file (MP4, MOV,
//! M4V) or the segment info of a Matroska file (MKV, WebM). Other containers
//! (AVI, MPEG-TS, Ogg) are reported as `InvalidData`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

/// Byte span of a box payload
#[derive(Debug, Clone, Copy)]
struct BoxSpan {
    body_start: u64,
    end: u64,
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

/// Playback duration of the video at `path`
///
/// Blocking; run it off the async workers.
pub fn probe_duration(path: &Path) -> io::Result<Duration> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    read_duration(&mut file, len)
}

/// Playback duration from a reader over `len` bytes of MP4 or Matroska data
pub fn read_duration<R: Read + Seek>(reader: &mut R, len: u64) -> io::Result<Duration> {
    let mut magic = [0u8; 4];
    if len >= 4 {
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut magic)?;
    }

    if magic == EBML_MAGIC {
        read_matroska_duration(reader, len)
    } else {
        read_mp4_duration(reader, len)
    }
}

fn read_mp4_duration<R: Read + Seek>(reader: &mut R, len: u64) -> io::Result<Duration> {
    let moov = find_box(reader, 0, len, *b"moov")?.ok_or_else(|| invalid("no moov box"))?;
    let mvhd = find_box(reader, moov.body_start, moov.end, *b"mvhd")?
        .ok_or_else(|| invalid("no mvhd box"))?;

    reader.seek(SeekFrom::Start(mvhd.body_start))?;
    read_mvhd(reader)
}

/// Scan sibling boxes in `[start, end)` for the first one of type `kind`
fn find_box<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    kind: [u8; 4],
) -> io::Result<Option<BoxSpan>> {
    let mut pos = start;

    while pos.saturating_add(8) <= end {
        reader.seek(SeekFrom::Start(pos))?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;

        let size32 = be_u32(&header, 0);
        let box_type = [header[4], header[5], header[6], header[7]];

        let (size, header_len) = match size32 {
            // Box runs to the end of its parent
            0 => (end - pos, 8),
            1 => {
                let mut large = [0u8; 8];
                reader.read_exact(&mut large)?;
                (u64::from_be_bytes(large), 16)
            }
            n => (u64::from(n), 8),
        };

        let box_end = pos
            .checked_add(size)
            .filter(|&e| size >= header_len && e <= end)
            .ok_or_else(|| invalid("truncated or oversized box"))?;

        if box_type == kind {
            return Ok(Some(BoxSpan {
                body_start: pos + header_len,
                end: box_end,
            }));
        }
        pos = box_end;
    }

    Ok(None)
}

fn read_mvhd<R: Read>(reader: &mut R) -> io::Result<Duration> {
    let mut version_flags = [0u8; 4];
    reader.read_exact(&mut version_flags)?;

    let (timescale, duration) = match version_flags[0] {
        0 => {
            // creation(4) modification(4) timescale(4) duration(4)
            let mut buf = [0u8; 16];
            reader.read_exact(&mut buf)?;
            let duration = be_u32(&buf, 12);
            if duration == u32::MAX {
                return Err(invalid("duration unknown"));
            }
            (be_u32(&buf, 8), u64::from(duration))
        }
        1 => {
            // creation(8) modification(8) timescale(4) duration(8)
            let mut buf = [0u8; 28];
            reader.read_exact(&mut buf)?;
            let duration = u64::from_be_bytes([
                buf[20], buf[21], buf[22], buf[23], buf[24], buf[25], buf[26], buf[27],
            ]);
            if duration == u64::MAX {
                return Err(invalid("duration unknown"));
            }
            (be_u32(&buf, 16), duration)
        }
        v => return Err(invalid(&format!("unsupported mvhd version {v}"))),
    };

    if timescale == 0 {
        return Err(invalid("mvhd timescale is zero"));
    }

    #[allow(clippy::cast_precision_loss)]
    let secs = duration as f64 / f64::from(timescale);
    Duration::try_from_secs_f64(secs).map_err(|_| invalid("mvhd duration out of range"))
}

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

// Matroska element IDs, marker bits included
const MKV_SEGMENT: u64 = 0x1853_8067;
const MKV_INFO: u64 = 0x1549_A966;
const MKV_TIMECODE_SCALE: u64 = 0x2A_D7B1;
const MKV_DURATION: u64 = 0x4489;

/// Nanoseconds per tick when the file does not say
const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// One EBML element; `end` is the parent's end for unknown-size elements
#[derive(Debug, Clone, Copy)]
struct Element {
    id: u64,
    body_start: u64,
    end: u64,
}

fn read_matroska_duration<R: Read + Seek>(reader: &mut R, len: u64) -> io::Result<Duration> {
    let header = read_element(reader, 0, len)?;
    let segment = find_element(reader, header.end, len, MKV_SEGMENT)?
        .ok_or_else(|| invalid("no Segment element"))?;
    let info = find_element(reader, segment.body_start, segment.end, MKV_INFO)?
        .ok_or_else(|| invalid("no Info element"))?;

    let mut scale = DEFAULT_TIMECODE_SCALE;
    let mut ticks = None;
    let mut pos = info.body_start;
    while pos < info.end {
        let element = read_element(reader, pos, info.end)?;
        let size = element.end - element.body_start;
        match element.id {
            MKV_TIMECODE_SCALE => scale = read_uint(reader, size)?,
            MKV_DURATION => ticks = Some(read_float(reader, size)?),
            _ => {}
        }
        pos = element.end;
    }

    let ticks = ticks.ok_or_else(|| invalid("no Duration in segment info"))?;
    if scale == 0 {
        return Err(invalid("timecode scale is zero"));
    }

    #[allow(clippy::cast_precision_loss)]
    let secs = ticks * scale as f64 / 1e9;
    Duration::try_from_secs_f64(secs).map_err(|_| invalid("matroska duration out of range"))
}

/// Scan sibling elements in `[start, end)` for the first one with `id`
fn find_element<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    id: u64,
) -> io::Result<Option<Element>> {
    let mut pos = start;
    while pos < end {
        let element = read_element(reader, pos, end)?;
        if element.id == id {
            return Ok(Some(element));
        }
        pos = element.end;
    }
    Ok(None)
}

/// Read the element header at `pos`, leaving the reader at its body
fn read_element<R: Read + Seek>(reader: &mut R, pos: u64, parent_end: u64) -> io::Result<Element> {
    reader.seek(SeekFrom::Start(pos))?;
    let (id, id_len) = read_vint(reader, 4, true)?;
    let (size, size_len) = read_vint(reader, 8, false)?;
    let body_start = pos + id_len + size_len;

    // All value bits set means the size is unknown
    let unknown = size == (1u64 << (7 * size_len)) - 1;
    let end = if unknown {
        parent_end
    } else {
        body_start
            .checked_add(size)
            .filter(|&e| e <= parent_end)
            .ok_or_else(|| invalid("truncated or oversized element"))?
    };

    Ok(Element { id, body_start, end })
}

/// EBML variable-length integer: `(value, encoded length)`
fn read_vint<R: Read>(reader: &mut R, max_len: u64, keep_marker: bool) -> io::Result<(u64, u64)> {
    let mut first = [0u8; 1];
    reader.read_exact(&mut first)?;

    let len = (0..8u64)
        .find(|&i| first[0] & (0x80u8 >> i) != 0)
        .map_or(u64::MAX, |i| i + 1);
    if len > max_len {
        return Err(invalid("invalid EBML length"));
    }

    let marker = 0x80u8 >> (len - 1);
    let mut value = u64::from(if keep_marker { first[0] } else { first[0] & !marker });
    for _ in 1..len {
        reader.read_exact(&mut first)?;
        value = (value << 8) | u64::from(first[0]);
    }
    Ok((value, len))
}

fn read_uint<R: Read>(reader: &mut R, size: u64) -> io::Result<u64> {
    if size > 8 {
        return Err(invalid("unsigned integer wider than 8 bytes"));
    }
    let mut value = 0u64;
    let mut byte = [0u8; 1];
    for _ in 0..size {
        reader.read_exact(&mut byte)?;
        value = (value << 8) | u64::from(byte[0]);
    }
    Ok(value)
}

fn read_float<R: Read>(reader: &mut R, size: u64) -> io::Result<f64> {
    match size {
        4 => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            Ok(f64::from(f32::from_be_bytes(buf)))
        }
        8 => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            Ok(f64::from_be_bytes(buf))
        }
        _ => Err(invalid("float must be 4 or 8 bytes")),
    }
}

#[inline]
const fn be_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
