//! Gain-map XMP codec
//!
//! Reads and writes the GContainer/RecoveryMap XMP block that accompanies a
//! gain-map JPEG. The element and attribute names below are a wire contract:
//! interoperating readers match them literally.
//!
//! XMP Structure:
//! - The host file stores the block behind the standard XMP namespace
//!   signature (`http://ns.adobe.com/xap/1.0/` plus a NUL)
//! - A `GContainer:Directory` sequence lists the Primary item followed by
//!   the RecoveryMap item
//! - Gain-map parameters ride as `RecoveryMap:` attributes on the Primary
//!   item, with an optional nested HDR10 block for PQ content

use std::io::Cursor;

use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    name::QName,
    Reader, Writer,
};

use crate::error::{Error, Result};
use crate::metadata::{Coordinate, GainMapMetadata, TransferFunction};

/// Namespace signature preceding the XML text in the host file
const XMP_SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

// GContainer namespace - URI, element and attribute names
const CONTAINER_URI: &str = "http://ns.google.com/photos/1.0/container/";
const CONTAINER_DIRECTORY: &str = "GContainer:Directory";
const CONTAINER_ITEM: &str = "GContainer:Item";
const ITEM_LENGTH: &str = "GContainer:ItemLength";
const ITEM_MIME: &str = "GContainer:ItemMime";
const ITEM_SEMANTIC: &str = "GContainer:ItemSemantic";
const CONTAINER_VERSION: &str = "GContainer:Version";

// GContainer attribute values
const SEMANTIC_PRIMARY: &str = "Primary";
const SEMANTIC_RECOVERY_MAP: &str = "RecoveryMap";
const MIME_IMAGE_JPEG: &str = "image/jpeg";
const CONTAINER_VERSION_VALUE: &str = "1";

// RecoveryMap namespace - URI, element and attribute names
const RECOVERY_MAP_URI: &str = "http://ns.google.com/photos/1.0/recoverymap/";
const MAP_VERSION: &str = "RecoveryMap:Version";
const MAP_RANGE_SCALING_FACTOR: &str = "RecoveryMap:RangeScalingFactor";
const MAP_TRANSFER_FUNCTION: &str = "RecoveryMap:TransferFunction";
const MAP_HDR10_METADATA: &str = "RecoveryMap:HDR10Metadata";
const MAP_HDR10_MAX_FALL: &str = "RecoveryMap:HDR10MaxFALL";
const MAP_HDR10_MAX_CLL: &str = "RecoveryMap:HDR10MaxCLL";
const MAP_ST2086_METADATA: &str = "RecoveryMap:ST2086Metadata";
const MAP_ST2086_MAX_LUM: &str = "RecoveryMap:ST2086MaxLuminance";
const MAP_ST2086_MIN_LUM: &str = "RecoveryMap:ST2086MinLuminance";
const MAP_ST2086_PRIMARY: &str = "RecoveryMap:ST2086Primary";
const MAP_ST2086_COORDINATE: &str = "RecoveryMap:ST2086Coordinate";
const MAP_ST2086_COORDINATE_X: &str = "RecoveryMap:ST2086CoordinateX";
const MAP_ST2086_COORDINATE_Y: &str = "RecoveryMap:ST2086CoordinateY";

// ST2086Primary attribute values
const PRIMARY_RED: &str = "0";
const PRIMARY_GREEN: &str = "1";
const PRIMARY_BLUE: &str = "2";
const PRIMARY_WHITE: &str = "3";

/// Gain-map fields recovered from an XMP block.
///
/// The reader's contract covers these two attributes only; the HDR10 block,
/// when present, must be obtained from the encode-side record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XmpInfo {
    pub range_scaling_factor: f32,
    pub transfer_function: TransferFunction,
}

fn emit(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Metadata(format!("XMP serialization failed: {e}")))
}

fn emit_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, name: &str, text: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn emit_coordinate(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    primary: &str,
    coordinate: &Coordinate,
) -> Result<()> {
    let mut elem = BytesStart::new(MAP_ST2086_COORDINATE);
    elem.push_attribute((MAP_ST2086_PRIMARY, primary));
    elem.push_attribute((MAP_ST2086_COORDINATE_X, coordinate.x.to_string().as_str()));
    elem.push_attribute((MAP_ST2086_COORDINATE_Y, coordinate.y.to_string().as_str()));
    emit(writer, Event::Empty(elem))
}

/// Serialize the container directory and gain-map parameters as an XMP block.
///
/// `secondary_item_length` is the byte length of the compressed recovery-map
/// image recorded on the RecoveryMap item. The Primary item always precedes
/// the RecoveryMap item; the HDR10 block is written only for PQ content, and
/// a PQ record without one is rejected as [`Error::Metadata`].
///
/// The returned text does not include the namespace signature; the container
/// assembler prepends it when building the host segment.
pub fn generate_xmp(secondary_item_length: u32, metadata: &GainMapMetadata) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut xmpmeta = BytesStart::new("x:xmpmeta");
    xmpmeta.push_attribute(("xmlns:x", "adobe:ns:meta/"));
    xmpmeta.push_attribute(("x:xmptk", "Adobe XMP Core 5.1.2"));
    emit(&mut writer, Event::Start(xmpmeta))?;

    let mut rdf = BytesStart::new("rdf:RDF");
    rdf.push_attribute(("xmlns:rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"));
    emit(&mut writer, Event::Start(rdf))?;

    let mut description = BytesStart::new("rdf:Description");
    description.push_attribute(("xmlns:GContainer", CONTAINER_URI));
    description.push_attribute(("xmlns:RecoveryMap", RECOVERY_MAP_URI));
    emit(&mut writer, Event::Start(description))?;

    emit_text_element(&mut writer, CONTAINER_VERSION, CONTAINER_VERSION_VALUE)?;

    emit(&mut writer, Event::Start(BytesStart::new(CONTAINER_DIRECTORY)))?;
    emit(&mut writer, Event::Start(BytesStart::new("rdf:Seq")))?;

    // Primary item carries the gain-map parameters
    emit(&mut writer, Event::Start(BytesStart::new("rdf:li")))?;
    let mut primary = BytesStart::new(CONTAINER_ITEM);
    primary.push_attribute((ITEM_SEMANTIC, SEMANTIC_PRIMARY));
    primary.push_attribute((ITEM_MIME, MIME_IMAGE_JPEG));
    primary.push_attribute((MAP_VERSION, metadata.version.to_string().as_str()));
    primary.push_attribute((
        MAP_RANGE_SCALING_FACTOR,
        metadata.range_scaling_factor.to_string().as_str(),
    ));
    primary.push_attribute((
        MAP_TRANSFER_FUNCTION,
        metadata.transfer_function.code().to_string().as_str(),
    ));

    if metadata.transfer_function == TransferFunction::Pq {
        let hdr10 = metadata.hdr10.as_ref().ok_or_else(|| {
            Error::Metadata("PQ transfer function requires HDR10 metadata".to_string())
        })?;

        emit(&mut writer, Event::Start(primary))?;

        let mut hdr10_elem = BytesStart::new(MAP_HDR10_METADATA);
        hdr10_elem.push_attribute((MAP_HDR10_MAX_FALL, hdr10.max_fall.to_string().as_str()));
        hdr10_elem.push_attribute((MAP_HDR10_MAX_CLL, hdr10.max_cll.to_string().as_str()));
        emit(&mut writer, Event::Start(hdr10_elem))?;

        let st2086 = &hdr10.st2086;
        let mut st2086_elem = BytesStart::new(MAP_ST2086_METADATA);
        st2086_elem.push_attribute((MAP_ST2086_MAX_LUM, st2086.max_luminance.to_string().as_str()));
        st2086_elem.push_attribute((MAP_ST2086_MIN_LUM, st2086.min_luminance.to_string().as_str()));
        emit(&mut writer, Event::Start(st2086_elem))?;

        emit_coordinate(&mut writer, PRIMARY_RED, &st2086.red_primary)?;
        emit_coordinate(&mut writer, PRIMARY_GREEN, &st2086.green_primary)?;
        emit_coordinate(&mut writer, PRIMARY_BLUE, &st2086.blue_primary)?;
        emit_coordinate(&mut writer, PRIMARY_WHITE, &st2086.white_point)?;

        emit(&mut writer, Event::End(BytesEnd::new(MAP_ST2086_METADATA)))?;
        emit(&mut writer, Event::End(BytesEnd::new(MAP_HDR10_METADATA)))?;
        emit(&mut writer, Event::End(BytesEnd::new(CONTAINER_ITEM)))?;
    } else {
        emit(&mut writer, Event::Empty(primary))?;
    }
    emit(&mut writer, Event::End(BytesEnd::new("rdf:li")))?;

    // RecoveryMap item records the secondary image length
    emit(&mut writer, Event::Start(BytesStart::new("rdf:li")))?;
    let mut recovery = BytesStart::new(CONTAINER_ITEM);
    recovery.push_attribute((ITEM_SEMANTIC, SEMANTIC_RECOVERY_MAP));
    recovery.push_attribute((ITEM_MIME, MIME_IMAGE_JPEG));
    recovery.push_attribute((ITEM_LENGTH, secondary_item_length.to_string().as_str()));
    emit(&mut writer, Event::Empty(recovery))?;
    emit(&mut writer, Event::End(BytesEnd::new("rdf:li")))?;

    emit(&mut writer, Event::End(BytesEnd::new("rdf:Seq")))?;
    emit(&mut writer, Event::End(BytesEnd::new(CONTAINER_DIRECTORY)))?;
    emit(&mut writer, Event::End(BytesEnd::new("rdf:Description")))?;
    emit(&mut writer, Event::End(BytesEnd::new("rdf:RDF")))?;
    emit(&mut writer, Event::End(BytesEnd::new("x:xmpmeta")))?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| Error::Metadata(format!("XMP is not UTF-8: {e}")))
}

/// Scan state while locating the container item element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    NotStarted,
    Started,
    Done,
}

/// Extract the gain-map parameters from a raw XMP segment.
///
/// `xmp` must begin with the XMP namespace signature followed by the XML
/// text; trailing bytes after the last `>` are tolerated and stripped before
/// parsing. Only the first container item scan that completes is honored;
/// any further matching elements are ignored.
///
/// Rejected input (missing signature, ill-formed XML, absent or non-numeric
/// required attributes) yields [`Error::ParseRejected`] and never a partial
/// result.
pub fn extract_metadata(xmp: &[u8]) -> Result<XmpInfo> {
    if xmp.len() < XMP_SIGNATURE.len() + 1 {
        return Err(Error::ParseRejected(format!(
            "XMP block too short: {} bytes",
            xmp.len()
        )));
    }
    if !xmp.starts_with(XMP_SIGNATURE) {
        return Err(Error::ParseRejected(
            "missing XMP namespace signature".to_string(),
        ));
    }

    // Drop trailing padding after the closing tag so the tokenizer sees a
    // complete document
    let mut body = &xmp[XMP_SIGNATURE.len()..];
    while body.len() > 1 && body[body.len() - 1] != b'>' {
        body = &body[..body.len() - 1];
    }

    let text = std::str::from_utf8(body)
        .map_err(|e| Error::ParseRejected(format!("XMP is not valid UTF-8: {e}")))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut state = ParseState::NotStarted;
    let mut range_scaling_factor: Option<String> = None;
    let mut transfer_function: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if state != ParseState::Done {
                    if e.name() == QName(CONTAINER_ITEM.as_bytes()) {
                        state = ParseState::Started;
                        capture_item_attributes(
                            e,
                            &mut range_scaling_factor,
                            &mut transfer_function,
                        )?;
                    } else {
                        state = ParseState::NotStarted;
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                if state != ParseState::Done {
                    if e.name() == QName(CONTAINER_ITEM.as_bytes()) {
                        capture_item_attributes(
                            e,
                            &mut range_scaling_factor,
                            &mut transfer_function,
                        )?;
                        state = ParseState::Done;
                    } else {
                        state = ParseState::NotStarted;
                    }
                }
            }
            Ok(Event::End(_)) => {
                if state == ParseState::Started {
                    state = ParseState::Done;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::ParseRejected(format!("malformed XML: {e}")));
            }
        }
    }

    if state != ParseState::Done {
        return Err(Error::ParseRejected(
            "container item element not found".to_string(),
        ));
    }

    let factor_str = range_scaling_factor.ok_or_else(|| {
        Error::ParseRejected(format!("missing {MAP_RANGE_SCALING_FACTOR} attribute"))
    })?;
    let range_scaling_factor: f32 = factor_str.trim().parse().map_err(|_| {
        Error::ParseRejected(format!("non-numeric {MAP_RANGE_SCALING_FACTOR}: {factor_str:?}"))
    })?;
    if !range_scaling_factor.is_finite() {
        return Err(Error::ParseRejected(format!(
            "non-finite {MAP_RANGE_SCALING_FACTOR}: {factor_str:?}"
        )));
    }

    let tf_str = transfer_function.ok_or_else(|| {
        Error::ParseRejected(format!("missing {MAP_TRANSFER_FUNCTION} attribute"))
    })?;
    let code: u8 = tf_str.trim().parse().map_err(|_| {
        Error::ParseRejected(format!("non-numeric {MAP_TRANSFER_FUNCTION}: {tf_str:?}"))
    })?;
    let transfer_function = TransferFunction::from_code(code).ok_or_else(|| {
        Error::ParseRejected(format!("unknown transfer function code {code}"))
    })?;

    Ok(XmpInfo {
        range_scaling_factor,
        transfer_function,
    })
}

/// Retain the two recognized attributes from a container item element;
/// everything else is ignored.
fn capture_item_attributes(
    elem: &BytesStart<'_>,
    range_scaling_factor: &mut Option<String>,
    transfer_function: &mut Option<String>,
) -> Result<()> {
    for attr_result in elem.attributes() {
        let attr = attr_result
            .map_err(|e| Error::ParseRejected(format!("XMP attribute error: {e}")))?;
        let target = if attr.key == QName(MAP_RANGE_SCALING_FACTOR.as_bytes()) {
            &mut *range_scaling_factor
        } else if attr.key == QName(MAP_TRANSFER_FUNCTION.as_bytes()) {
            &mut *transfer_function
        } else {
            continue;
        };
        let value = String::from_utf8(attr.value.to_vec())
            .map_err(|e| Error::ParseRejected(format!("XMP attribute is not UTF-8: {e}")))?;
        *target = Some(value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Hdr10Metadata, St2086Metadata};

    fn with_signature(xml: &str) -> Vec<u8> {
        let mut data = XMP_SIGNATURE.to_vec();
        data.extend_from_slice(xml.as_bytes());
        data
    }

    fn sdr_metadata() -> GainMapMetadata {
        GainMapMetadata {
            version: 1,
            range_scaling_factor: 4.5,
            transfer_function: TransferFunction::Hlg,
            hdr10: None,
        }
    }

    #[test]
    fn test_generate_xmp_structure() {
        let xml = generate_xmp(12345, &sdr_metadata()).unwrap();

        assert!(xml.starts_with("<x:xmpmeta"));
        assert!(xml.ends_with("</x:xmpmeta>"));
        assert!(xml.contains(r#"xmlns:GContainer="http://ns.google.com/photos/1.0/container/""#));
        assert!(xml.contains(r#"xmlns:RecoveryMap="http://ns.google.com/photos/1.0/recoverymap/""#));
        assert!(xml.contains("<GContainer:Version>1</GContainer:Version>"));
        assert!(xml.contains(r#"GContainer:ItemSemantic="Primary""#));
        assert!(xml.contains(r#"GContainer:ItemSemantic="RecoveryMap""#));
        assert!(xml.contains(r#"GContainer:ItemLength="12345""#));
        assert!(xml.contains(r#"RecoveryMap:RangeScalingFactor="4.5""#));
        assert!(xml.contains(r#"RecoveryMap:TransferFunction="2""#));

        // Primary item listed before the recovery map item
        let primary = xml.find(r#"GContainer:ItemSemantic="Primary""#).unwrap();
        let recovery = xml.find(r#"GContainer:ItemSemantic="RecoveryMap""#).unwrap();
        assert!(primary < recovery);

        // Not PQ, so no HDR10 block
        assert!(!xml.contains("HDR10Metadata"));
    }

    #[test]
    fn test_generate_xmp_pq_hdr10_block() {
        let metadata = GainMapMetadata {
            version: 1,
            range_scaling_factor: 8.0,
            transfer_function: TransferFunction::Pq,
            hdr10: Some(Hdr10Metadata {
                max_fall: 400,
                max_cll: 1000,
                st2086: St2086Metadata {
                    max_luminance: 1000.0,
                    min_luminance: 0.005,
                    red_primary: Coordinate { x: 0.708, y: 0.292 },
                    green_primary: Coordinate { x: 0.17, y: 0.797 },
                    blue_primary: Coordinate { x: 0.131, y: 0.046 },
                    white_point: Coordinate { x: 0.3127, y: 0.329 },
                },
            }),
        };
        let xml = generate_xmp(999, &metadata).unwrap();

        assert!(xml.contains(r#"RecoveryMap:HDR10MaxFALL="400""#));
        assert!(xml.contains(r#"RecoveryMap:HDR10MaxCLL="1000""#));
        assert!(xml.contains(r#"RecoveryMap:ST2086MaxLuminance="1000""#));
        assert!(xml.contains(r#"RecoveryMap:ST2086MinLuminance="0.005""#));
        assert_eq!(xml.matches("RecoveryMap:ST2086Coordinate ").count(), 4);
        assert!(xml.contains(r#"RecoveryMap:ST2086Primary="0""#));
        assert!(xml.contains(r#"RecoveryMap:ST2086Primary="3""#));
    }

    #[test]
    fn test_generate_xmp_pq_without_hdr10_is_contract_violation() {
        let metadata = GainMapMetadata {
            version: 1,
            range_scaling_factor: 8.0,
            transfer_function: TransferFunction::Pq,
            hdr10: None,
        };
        assert!(matches!(
            generate_xmp(0, &metadata),
            Err(Error::Metadata(_))
        ));
    }

    #[test]
    fn test_extract_metadata_minimal() {
        let data = with_signature(
            r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF><rdf:Description>
            <GContainer:Directory><rdf:Seq><rdf:li>
            <GContainer:Item GContainer:ItemSemantic="Primary"
                RecoveryMap:RangeScalingFactor="4.5"
                RecoveryMap:TransferFunction="2"/>
            </rdf:li></rdf:Seq></GContainer:Directory>
            </rdf:Description></rdf:RDF></x:xmpmeta>"#,
        );
        let info = extract_metadata(&data).unwrap();
        assert_eq!(info.range_scaling_factor, 4.5);
        assert_eq!(info.transfer_function, TransferFunction::Hlg);
    }

    #[test]
    fn test_extract_metadata_tolerates_trailing_padding() {
        let xml = generate_xmp(7, &sdr_metadata()).unwrap();
        let mut data = with_signature(&xml);
        data.extend_from_slice(&[0u8; 64]);
        let info = extract_metadata(&data).unwrap();
        assert_eq!(info.transfer_function, TransferFunction::Hlg);
    }

    #[test]
    fn test_extract_metadata_rejects_bad_signature() {
        assert!(matches!(
            extract_metadata(b"http://ns.example.com/\0<a/>"),
            Err(Error::ParseRejected(_))
        ));
        assert!(matches!(
            extract_metadata(b"short"),
            Err(Error::ParseRejected(_))
        ));
    }

    #[test]
    fn test_extract_metadata_rejects_missing_transfer_function() {
        let data = with_signature(
            r#"<r><GContainer:Item RecoveryMap:RangeScalingFactor="4.5"/></r>"#,
        );
        assert!(matches!(
            extract_metadata(&data),
            Err(Error::ParseRejected(_))
        ));
    }

    #[test]
    fn test_extract_metadata_rejects_non_numeric_factor() {
        let data = with_signature(
            r#"<r><GContainer:Item RecoveryMap:RangeScalingFactor="wide"
                RecoveryMap:TransferFunction="2"/></r>"#,
        );
        assert!(matches!(
            extract_metadata(&data),
            Err(Error::ParseRejected(_))
        ));
    }

    #[test]
    fn test_extract_metadata_rejects_unknown_transfer_code() {
        let data = with_signature(
            r#"<r><GContainer:Item RecoveryMap:RangeScalingFactor="1.0"
                RecoveryMap:TransferFunction="9"/></r>"#,
        );
        assert!(matches!(
            extract_metadata(&data),
            Err(Error::ParseRejected(_))
        ));
    }

    #[test]
    fn test_extract_metadata_rejects_ill_formed_xml() {
        let data = with_signature("<GContainer:Item <<nope>");
        assert!(matches!(
            extract_metadata(&data),
            Err(Error::ParseRejected(_))
        ));
    }

    #[test]
    fn test_first_completed_item_wins() {
        let data = with_signature(
            r#"<r>
            <GContainer:Item RecoveryMap:RangeScalingFactor="2"
                RecoveryMap:TransferFunction="1"/>
            <GContainer:Item RecoveryMap:RangeScalingFactor="8"
                RecoveryMap:TransferFunction="3"/>
            </r>"#,
        );
        let info = extract_metadata(&data).unwrap();
        assert_eq!(info.range_scaling_factor, 2.0);
        assert_eq!(info.transfer_function, TransferFunction::Linear);
    }
}
