//! Gain-map metadata record
//!
//! Plain data carried between the XMP codec and the surrounding encode /
//! decode pipeline. Numeric range validation is left to the display
//! pipeline; the only structural rule is that the HDR10 block accompanies
//! the PQ transfer function and nothing else.

/// Transfer function of the HDR rendition, as encoded in the
/// `RecoveryMap:TransferFunction` XMP attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferFunction {
    #[default]
    Srgb = 0,
    Linear = 1,
    Hlg = 2,
    Pq = 3,
}

impl TransferFunction {
    /// Numeric wire code used in the XMP block.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code; unknown codes yield `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TransferFunction::Srgb),
            1 => Some(TransferFunction::Linear),
            2 => Some(TransferFunction::Hlg),
            3 => Some(TransferFunction::Pq),
            _ => None,
        }
    }
}

/// An (x, y) chromaticity coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coordinate {
    pub x: f32,
    pub y: f32,
}

/// SMPTE ST 2086 mastering display metadata
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct St2086Metadata {
    pub max_luminance: f32,
    pub min_luminance: f32,
    pub red_primary: Coordinate,
    pub green_primary: Coordinate,
    pub blue_primary: Coordinate,
    pub white_point: Coordinate,
}

/// HDR10 static metadata, present only for PQ content
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Hdr10Metadata {
    /// Maximum frame-average light level, cd/m^2
    pub max_fall: u16,
    /// Maximum content light level, cd/m^2
    pub max_cll: u16,
    pub st2086: St2086Metadata,
}

/// Parameters describing how to reconstruct the HDR rendition from the
/// primary image and its recovery map.
///
/// `hdr10` must be `Some` exactly when `transfer_function` is
/// [`TransferFunction::Pq`]; the XMP writer rejects a PQ record without it
/// and omits the block for every other transfer function.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GainMapMetadata {
    /// Gain-map format revision
    pub version: u32,
    /// Scaling factor applied to the recovery map range; finite by contract
    pub range_scaling_factor: f32,
    pub transfer_function: TransferFunction,
    pub hdr10: Option<Hdr10Metadata>,
}
