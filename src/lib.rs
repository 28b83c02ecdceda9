//! Gain-map (JPEG-R) metadata codec.
//!
//! A gain-map image pairs a standard dynamic-range base JPEG with a
//! secondary recovery-map image; the parameters for reconstructing the HDR
//! rendition travel inside the base file in two carriers, both handled here:
//!
//! - an XMP block describing the container directory and the gain-map
//!   parameters ([`xmp`])
//! - an EXIF tag directory into which a fixed marker entry is spliced,
//!   with every displaced offset repaired in place ([`exif`])
//!
//! # Design Principles
//!
//! - **Caller-owned buffers**: destinations are fixed-capacity slices; the
//!   crate never allocates or resizes an output buffer and reports
//!   [`Error::BufferTooSmall`] when one cannot hold the result
//! - **Reject, never crash**: malformed or truncated input yields an error;
//!   there is no panic path for untrusted bytes
//! - **No I/O**: every operation is a bounded computation over in-memory
//!   buffers, synchronous and reentrant
//!
//! # Quick Start
//!
//! ```no_run
//! use jpegr_metadata::{exif, xmp, GainMapMetadata, TransferFunction};
//!
//! # fn main() -> jpegr_metadata::Result<()> {
//! // Packaging: describe the recovery map in XMP...
//! let metadata = GainMapMetadata {
//!     version: 1,
//!     range_scaling_factor: 4.0,
//!     transfer_function: TransferFunction::Hlg,
//!     hdr10: None,
//! };
//! let xmp_block = xmp::generate_xmp(32768, &metadata)?;
//!
//! // ...and flag the file by patching its EXIF directory
//! let existing_exif: &[u8] = &[/* EXIF segment from the base image */];
//! let mut patched = vec![0u8; existing_exif.len() + exif::ENTRY_SIZE];
//! exif::update_exif(Some(existing_exif), &mut patched)?;
//!
//! // Unpacking: recover the parameters from a raw XMP segment
//! let segment: &[u8] = b"...";
//! match xmp::extract_metadata(segment) {
//!     Ok(info) => println!("scale {}", info.range_scaling_factor),
//!     Err(_) => println!("no gain-map metadata"),
//! }
//! # Ok(())
//! # }
//! ```

mod cursor;
mod error;
mod metadata;

pub mod exif;
pub mod xmp;

pub use cursor::{ByteCursor, Endian};
pub use error::{Error, Result};
pub use metadata::{
    Coordinate, GainMapMetadata, Hdr10Metadata, St2086Metadata, TransferFunction,
};
