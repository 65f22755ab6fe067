//! EXIF for JPEG outputs.
//!
//! The TIFF structure is produced by `kamadak-exif`'s writer and wrapped in an
//! APP1 segment, which replaces any EXIF segment the JPEG already carries.

use std::io::Cursor;

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use exn::{OptionExt, ResultExt};
use remem_export::models::MemoryRecord;
use time::macros::format_description;

use super::error::{ErrorKind, Result};

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const EXIF_HEADER: &[u8] = b"Exif\0\0";
// Seconds are stored with four decimal places.
const SECONDS_SCALE: u32 = 10_000;

/// Serializes capture time (and location, when known) as big-endian TIFF.
pub(crate) fn build_exif(record: &MemoryRecord) -> Result<Vec<u8>> {
    let stamp = record
        .captured_at
        .format(format_description!("[year]:[month]:[day] [hour]:[minute]:[second]"))
        .or_raise(|| ErrorKind::Timestamp)?;
    let ascii = |tag| Field { tag, ifd_num: In::PRIMARY, value: Value::Ascii(vec![stamp.clone().into_bytes()]) };
    let mut fields = vec![ascii(Tag::DateTime), ascii(Tag::DateTimeOriginal), ascii(Tag::DateTimeDigitized)];

    if let Some(location) = record.location {
        let reference = |value: &str| Value::Ascii(vec![value.as_bytes().to_vec()]);
        fields.extend([
            Field { tag: Tag::GPSVersionID, ifd_num: In::PRIMARY, value: Value::Byte(vec![2, 3, 0, 0]) },
            Field {
                tag: Tag::GPSLatitudeRef,
                ifd_num: In::PRIMARY,
                value: reference(if location.latitude < 0.0 { "S" } else { "N" }),
            },
            Field { tag: Tag::GPSLatitude, ifd_num: In::PRIMARY, value: Value::Rational(dms(location.latitude)) },
            Field {
                tag: Tag::GPSLongitudeRef,
                ifd_num: In::PRIMARY,
                value: reference(if location.longitude < 0.0 { "W" } else { "E" }),
            },
            Field { tag: Tag::GPSLongitude, ifd_num: In::PRIMARY, value: Value::Rational(dms(location.longitude)) },
        ]);
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).or_raise(|| ErrorKind::Exif)?;
    Ok(tiff.into_inner())
}

/// Degrees, minutes and seconds of the absolute coordinate.
fn dms(coordinate: f64) -> Vec<Rational> {
    let coordinate = coordinate.abs();
    let degrees = coordinate.trunc();
    let minutes = ((coordinate - degrees) * 60.0).trunc();
    let seconds = (coordinate - degrees - minutes / 60.0) * 3600.0;
    let seconds = ((seconds * f64::from(SECONDS_SCALE)).round() as u32).min(60 * SECONDS_SCALE - 1);
    vec![
        Rational { num: degrees as u32, denom: 1 },
        Rational { num: minutes as u32, denom: 1 },
        Rational { num: seconds, denom: SECONDS_SCALE },
    ]
}

/// Returns `jpeg` with `tiff` as its only EXIF segment, placed after any
/// JFIF (APP0) header.
pub(crate) fn splice_exif(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>> {
    if !jpeg.starts_with(&SOI) {
        exn::bail!(ErrorKind::InvalidJpeg);
    }
    let length = u16::try_from(2 + EXIF_HEADER.len() + tiff.len()).or_raise(|| ErrorKind::Exif)?;
    let mut segment = Vec::with_capacity(usize::from(length) + 2);
    segment.extend_from_slice(&[0xFF, APP1]);
    segment.extend_from_slice(&length.to_be_bytes());
    segment.extend_from_slice(EXIF_HEADER);
    segment.extend_from_slice(tiff);

    let mut leading = Vec::new();
    let mut trailing = Vec::new();
    let mut position = SOI.len();
    loop {
        let Some(&[0xFF, marker]) = jpeg.get(position..position + 2) else {
            exn::bail!(ErrorKind::InvalidJpeg);
        };
        if marker == SOS || marker == EOI {
            break;
        }
        let size = jpeg
            .get(position + 2..position + 4)
            .map(|b| usize::from(u16::from_be_bytes([b[0], b[1]])))
            .filter(|size| *size >= 2)
            .ok_or_raise(|| ErrorKind::InvalidJpeg)?;
        let end = position + 2 + size;
        let current = jpeg.get(position..end).ok_or_raise(|| ErrorKind::InvalidJpeg)?;
        let is_exif = marker == APP1 && current[4..].starts_with(EXIF_HEADER);
        if !is_exif {
            if marker == APP0 && trailing.is_empty() {
                leading.extend_from_slice(current);
            } else {
                trailing.extend_from_slice(current);
            }
        }
        position = end;
    }

    let mut out = Vec::with_capacity(jpeg.len() + segment.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&leading);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&trailing);
    out.extend_from_slice(&jpeg[position..]);
    Ok(out)
}
