use std::path::Path;

use exn::ResultExt;
use remem_export::models::MemoryRecord;
use time::macros::format_description;

use super::error::{ErrorKind, Result};
use crate::imaging;

/// Re-encodes the PNG at `path` with `tEXt` chunks carrying the capture time
/// and location. Used when a PNG can't be turned into a JPEG.
pub(crate) fn write_png_text(path: &Path, record: &MemoryRecord) -> Result<()> {
    let image = imaging::open(path).or_raise(|| ErrorKind::Image)?.to_rgba8();
    let created = record
        .captured_at
        .format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
        .or_raise(|| ErrorKind::Timestamp)?;

    let mut encoded = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut encoded, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.add_text_chunk("CreationTime".to_string(), created).or_raise(|| ErrorKind::Png)?;
        if let Some(location) = record.location {
            encoder
                .add_text_chunk("GPSLatitude".to_string(), location.latitude.to_string())
                .or_raise(|| ErrorKind::Png)?;
            encoder
                .add_text_chunk("GPSLongitude".to_string(), location.longitude.to_string())
                .or_raise(|| ErrorKind::Png)?;
        }
        let mut writer = encoder.write_header().or_raise(|| ErrorKind::Png)?;
        writer.write_image_data(image.as_raw()).or_raise(|| ErrorKind::Png)?;
        writer.finish().or_raise(|| ErrorKind::Png)?;
    }
    imaging::write_atomic(path, &encoded).or_raise(|| ErrorKind::Io)
}
