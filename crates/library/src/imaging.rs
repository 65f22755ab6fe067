//! Still-image helpers shared by composition and metadata reconciliation.

use std::io::{self, Cursor, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageReader, ImageResult, RgbImage, RgbaImage};

pub(crate) const JPEG_QUALITY: u8 = 95;

/// Decodes the image at `path`, trusting its content over its extension.
pub(crate) fn open(path: &Path) -> ImageResult<DynamicImage> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// Lays `overlay` over `main`, scaling the overlay to the main image's
/// dimensions first when they differ, and returns the result as an opaque RGB
/// image on a white background.
pub(crate) fn composite(main: &DynamicImage, overlay: &DynamicImage) -> RgbImage {
    let mut base = main.to_rgba8();
    let mut top = overlay.to_rgba8();
    if top.dimensions() != base.dimensions() {
        top = imageops::resize(&top, base.width(), base.height(), FilterType::Lanczos3);
    }
    imageops::overlay(&mut base, &top, 0, 0);
    flatten(&base)
}

/// Drops the alpha channel by blending every pixel onto white.
pub(crate) fn flatten(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let a = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

pub(crate) fn encode_jpeg(image: &RgbImage) -> ImageResult<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder.encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8.into())?;
    Ok(out.into_inner())
}

/// Writes `bytes` to a temporary file next to `target` and renames it into
/// place, so readers never see a partially written file.
pub(crate) fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let directory = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut staging = tempfile::Builder::new().prefix(".remem-").suffix(".part").tempfile_in(directory)?;
    staging.write_all(bytes)?;
    staging.as_file().sync_all()?;
    staging.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    #[test]
    fn flatten_blends_onto_white() {
        let mut image = RgbaImage::new(3, 1);
        image.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        image.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        image.put_pixel(2, 0, Rgba([0, 0, 0, 128]));
        let flat = flatten(&image);
        assert_eq!(flat.get_pixel(0, 0), &Rgb([10, 20, 30]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(2, 0), &Rgb([127, 127, 127]));
    }

    #[test]
    fn overlay_is_scaled_to_main() {
        let main = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([0, 0, 255])));

        let clear = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 0])));
        let out = composite(&main, &clear);
        assert_eq!(out.dimensions(), (8, 4));
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 255])));

        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255])));
        let out = composite(&main, &opaque);
        assert_eq!(out.dimensions(), (8, 4));
        assert!(out.pixels().all(|p| *p == Rgb([255, 0, 0])));
    }

    #[test]
    fn jpeg_is_written_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.jpg");
        let bytes = encode_jpeg(&RgbImage::from_pixel(4, 4, Rgb([200, 100, 50]))).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        write_atomic(&target, &bytes).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), bytes);
        // Only the target remains.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        let decoded = open(&target).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }
}
