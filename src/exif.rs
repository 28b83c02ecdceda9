//! EXIF tag-directory patcher
//!
//! Inserts the gain-map marker entry into an EXIF package, then repairs
//! every offset-valued field the insertion displaced.
//!
//! EXIF Structure:
//! - `Exif\0\0` signature, then the TIFF header: byte order (II/MM),
//!   magic 0x002A, IFD0 offset
//! - IFD: 2-byte entry count, then 12-byte entries
//! - Entry: tag ID (2), data format (2), element count (4), value (4);
//!   the value holds the data inline when it fits in 4 bytes, otherwise a
//!   byte offset relative to the TIFF header
//!
//! Unrelated tag payloads are copied verbatim and never interpreted; the
//! patcher touches only the fields required to keep offsets valid.

use crate::cursor::{ByteCursor, Endian};
use crate::error::{Error, Result};

/// Size of one directory entry. The inserted marker is a single entry, so
/// this is also the byte length added in front of the original entries and
/// therefore the shift applied to every displaced offset.
pub const ENTRY_SIZE: usize = 12;

/// Fixed EXIF package written when no source directory exists: signature,
/// little-endian TIFF header, and a single-entry IFD holding the marker.
pub const PSEUDO_EXIF_PACKAGE: [u8; 28] = [
    0x45, 0x78, 0x69, 0x66, 0x00, 0x00, // "Exif\0\0"
    0x49, 0x49, 0x2A, 0x00, // "II", magic
    0x08, 0x00, 0x00, 0x00, // IFD0 at offset 8
    0x01, 0x00, // one entry
    0x4A, 0x52, // tag "JR"
    0x07, 0x00, // format: undefined
    0x01, 0x00, 0x00, 0x00, // one element
    0x00, 0x00, 0x00, 0x00, // inline value
];

const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";

/// Tag whose value points at the EXIF sub-directory
const EXIF_SUB_IFD_POINTER: u16 = 0x8769;

/// Marker tag bytes, literal ASCII "JR" in either byte order
const MARKER_TAG: [u8; 2] = *b"JR";
const MARKER_FORMAT: u16 = 7; // undefined
const MARKER_COUNT: u32 = 1;

/// Byte positions within the package: the IFD0 entry count sits after the
/// signature and TIFF header, entries follow it, and after patching the
/// first original entry lands past the inserted marker.
const ENTRY_COUNT_POS: usize = 14;
const FIRST_ENTRY_POS: usize = 16;
const OFFSET_FIX_START: usize = ENTRY_COUNT_POS + 2 + ENTRY_SIZE;

/// Maximum sub-directory nesting (rejects cyclic pointer chains)
const MAX_IFD_DEPTH: usize = 32;

/// Insert the gain-map marker entry into an EXIF package.
///
/// With no source package (or an empty one), writes [`PSEUDO_EXIF_PACKAGE`]
/// to `dest`. Otherwise the source header is copied with its entry count
/// incremented, the marker entry is written where the first original entry
/// stood, the original entries and value area follow verbatim, and a
/// recursive pass shifts every displaced offset by [`ENTRY_SIZE`].
///
/// Returns the number of bytes written. On error `dest` may hold a partial
/// write and must be discarded.
pub fn update_exif(exif: Option<&[u8]>, dest: &mut [u8]) -> Result<usize> {
    let exif = match exif {
        Some(data) if !data.is_empty() => data,
        _ => {
            let mut cursor = ByteCursor::new(dest);
            return cursor.write(&PSEUDO_EXIF_PACKAGE);
        }
    };

    if exif.len() < FIRST_ENTRY_POS {
        return Err(Error::Metadata(format!(
            "EXIF package too short: {} bytes",
            exif.len()
        )));
    }

    let endian = match &exif[6..8] {
        b"II" => Endian::Little,
        b"MM" => Endian::Big,
        other => {
            return Err(Error::Metadata(format!(
                "unsupported byte-order marker {other:02X?}"
            )))
        }
    };

    let entry_count = endian.read_u16(exif, ENTRY_COUNT_POS)?;
    let new_count = entry_count
        .checked_add(1)
        .ok_or_else(|| Error::Metadata("IFD0 entry count overflow".to_string()))?;
    let count_bytes = match endian {
        Endian::Little => new_count.to_le_bytes(),
        Endian::Big => new_count.to_be_bytes(),
    };

    let mut cursor = ByteCursor::new(dest);
    cursor.write(&exif[..ENTRY_COUNT_POS])?;
    cursor.write(&count_bytes)?;
    cursor.write(&marker_entry(endian))?;
    cursor.write(&exif[FIRST_ENTRY_POS..])?;
    let written = cursor.position();

    // Skip the marker itself; only the original entries carry offsets that
    // the insertion displaced.
    update_offsets(
        &mut dest[..written],
        OFFSET_FIX_START,
        entry_count as usize,
        endian,
        0,
    )?;

    Ok(written)
}

/// Build the marker entry in the directory's byte order. The tag bytes are
/// the ASCII pair "JR" regardless of endianness.
fn marker_entry(endian: Endian) -> [u8; ENTRY_SIZE] {
    let mut entry = [0u8; ENTRY_SIZE];
    entry[..2].copy_from_slice(&MARKER_TAG);
    match endian {
        Endian::Little => {
            entry[2..4].copy_from_slice(&MARKER_FORMAT.to_le_bytes());
            entry[4..8].copy_from_slice(&MARKER_COUNT.to_le_bytes());
        }
        Endian::Big => {
            entry[2..4].copy_from_slice(&MARKER_FORMAT.to_be_bytes());
            entry[4..8].copy_from_slice(&MARKER_COUNT.to_be_bytes());
        }
    }
    entry
}

/// Shift the offset-valued fields of `entry_count` entries starting at
/// `pos`, recursing through EXIF sub-directories. Entries whose data fits
/// inline are left untouched; their bytes are the value, not a pointer.
fn update_offsets(
    data: &mut [u8],
    pos: usize,
    entry_count: usize,
    endian: Endian,
    depth: usize,
) -> Result<()> {
    if depth > MAX_IFD_DEPTH {
        return Err(Error::Metadata(
            "tag directory nesting too deep".to_string(),
        ));
    }

    let mut pos = pos;
    for _ in 0..entry_count {
        let tag = endian.read_u16(data, pos)?;
        if tag == EXIF_SUB_IFD_POINTER {
            let offset = endian.read_u32(data, pos + 8)?;
            // Stored offsets are relative to the TIFF header; within the
            // patched package the signature precedes it and the marker
            // entry has shifted everything past the header.
            let sub_ifd = (offset as usize)
                .checked_add(EXIF_SIGNATURE.len() + ENTRY_SIZE)
                .ok_or_else(|| Error::Metadata("sub-directory offset overflow".to_string()))?;
            let sub_count = endian.read_u16(data, sub_ifd)? as usize;
            update_offsets(data, sub_ifd + 2, sub_count, endian, depth + 1)?;
            write_shifted_offset(data, pos + 8, offset, endian)?;
        } else {
            let format = endian.read_u16(data, pos + 2)?;
            let count = endian.read_u32(data, pos + 4)?;
            let data_length = format_size(format)? as u64 * u64::from(count);
            if data_length > 4 {
                let offset = endian.read_u32(data, pos + 8)?;
                write_shifted_offset(data, pos + 8, offset, endian)?;
            }
        }
        pos += ENTRY_SIZE;
    }
    Ok(())
}

fn write_shifted_offset(data: &mut [u8], pos: usize, offset: u32, endian: Endian) -> Result<()> {
    let shifted = offset
        .checked_add(ENTRY_SIZE as u32)
        .ok_or_else(|| Error::Metadata(format!("offset overflow at position {pos}")))?;
    endian.write_u32(data, pos, shifted)
}

/// Byte width of one element of each tag data format.
///
/// Formats 1..=12: byte, ascii, short, long, rational, sbyte, undefined,
/// sshort, slong, srational, float, double. Anything else is a hard
/// failure, never a silent default.
fn format_size(format: u16) -> Result<usize> {
    match format {
        1 | 2 | 6 | 7 => Ok(1),
        3 | 8 => Ok(2),
        4 | 9 | 11 => Ok(4),
        5 | 10 | 12 => Ok(8),
        other => Err(Error::Metadata(format!("unknown tag data format {other}"))),
    }
}
