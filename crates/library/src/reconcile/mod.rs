//! Metadata reconciliation.
//!
//! After composition, every output named `<identifier>[_suffix].<jpg|png|mp4>`
//! is matched against the memory records and gets its capture time and
//! location written back. Files without a record are left alone. Each file
//! stands alone: a failure is counted and logged, and the rest carry on.

pub mod error;
mod jpeg;
mod text;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use exn::{OptionExt, ResultExt};
use filetime::FileTime;
use futures::StreamExt;
use futures::stream;
use image::ImageFormat;
use remem_export::models::{Identifier, MediaKind, MemoryRecord, RecordTable};
use remem_toolchain::{ExifTool, Ffmpeg};
use tracing::instrument;
use walkdir::WalkDir;

use self::error::{ErrorKind, Result};
use crate::consts::OUTPUT_NAME_REGEX;
use crate::imaging;
use crate::stats::{Counter, RunStatistics};
use crate::Mode;

/// Writes metadata into MP4 files: ExifTool when installed, FFmpeg otherwise.
#[derive(Debug, Clone, Default)]
pub struct VideoTagger {
    exiftool: Option<ExifTool>,
    ffmpeg: Option<Ffmpeg>,
}

impl VideoTagger {
    pub fn new(exiftool: Option<ExifTool>, ffmpeg: Option<Ffmpeg>) -> Self {
        Self { exiftool, ffmpeg }
    }

    pub async fn tag(&self, path: &Path, record: &MemoryRecord) -> Result<()> {
        if let Some(exiftool) = &self.exiftool {
            match exiftool.tag(path, record.captured_at, record.location).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::debug!(path = %path.display(), error = ?e, "ExifTool failed; trying FFmpeg"),
            }
        }
        let ffmpeg = self.ffmpeg.as_ref().ok_or_raise(|| ErrorKind::NoVideoTool)?;
        ffmpeg.tag(path, record.captured_at, record.location).await.or_raise(|| ErrorKind::Video)
    }
}

/// Splits an output file name into the identifier it was produced for and
/// the kind of media it holds.
pub fn match_output(name: &str) -> Option<(Identifier, MediaKind)> {
    let lower = name.to_lowercase();
    let captures = OUTPUT_NAME_REGEX.captures(&lower)?;
    let kind = MediaKind::from_extension(captures.get(2)?.as_str())?;
    Some((Identifier::new(captures.get(1)?.as_str()), kind))
}

/// Every file under `output_root` (outside the scratch directory) whose name
/// could belong to a memory.
///
/// In preview, `planned` outputs that don't exist yet are included, since a
/// real run would have produced them by now.
pub fn candidates(output_root: &Path, scratch_name: &str, planned: &[PathBuf], mode: Mode) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    if output_root.is_dir() {
        let walker = WalkDir::new(output_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == scratch_name));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable output entry");
                    continue;
                },
            };
            if entry.file_type().is_file() && is_candidate(entry.path()) {
                found.insert(entry.into_path());
            }
        }
    }
    if !mode.applies() {
        found.extend(planned.iter().filter(|path| is_candidate(path)).cloned());
    }
    found.into_iter().collect()
}

fn is_candidate(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).and_then(match_output).is_some()
}

/// How one candidate ended.
enum Tagged {
    Done(MediaKind),
    Failed,
    Skipped,
}

/// Reconciles every candidate, up to `workers` at a time.
#[instrument(skip_all, fields(candidates = candidates.len(), workers, %mode))]
pub async fn reconcile_all(
    candidates: Vec<PathBuf>,
    records: &RecordTable,
    tagger: &VideoTagger,
    workers: usize,
    mode: Mode,
    stats: &RunStatistics,
) {
    let mut results = stream::iter(candidates)
        .map(|path| async move { reconcile_one(&path, records, tagger, mode).await })
        .buffer_unordered(workers.max(1));
    while let Some(tagged) = results.next().await {
        match tagged {
            Tagged::Done(MediaKind::Image) => stats.increment(Counter::ImagesTagged),
            Tagged::Done(MediaKind::Video) => stats.increment(Counter::VideosTagged),
            Tagged::Failed => stats.increment(Counter::TagsFailed),
            Tagged::Skipped => {},
        }
    }
    tracing::info!(
        images = stats.get(Counter::ImagesTagged),
        videos = stats.get(Counter::VideosTagged),
        failed = stats.get(Counter::TagsFailed),
        "Metadata reconciled",
    );
}

async fn reconcile_one(path: &Path, records: &RecordTable, tagger: &VideoTagger, mode: Mode) -> Tagged {
    let Some((identifier, kind)) = path.file_name().and_then(|n| n.to_str()).and_then(match_output) else {
        return Tagged::Skipped;
    };
    let Some(record) = records.get(&identifier) else {
        tracing::trace!(%identifier, "No record for output");
        return Tagged::Skipped;
    };
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => {
            tracing::warn!(path = %path.display(), "Skipping empty file");
            return Tagged::Skipped;
        },
        Err(e) if mode.applies() => {
            tracing::warn!(path = %path.display(), error = %e, "Output disappeared before tagging");
            return Tagged::Failed;
        },
        _ => {},
    }
    if !mode.applies() {
        return Tagged::Done(kind);
    }

    let (final_path, embedded) = match kind {
        MediaKind::Image => {
            let (owned, record_copy) = (path.to_path_buf(), record.clone());
            let fallback = owned.clone();
            match tokio::task::spawn_blocking(move || tag_image(&owned, &record_copy)).await {
                Ok(outcome) => outcome,
                Err(e) => (fallback, Err(e).or_raise(|| ErrorKind::Task)),
            }
        },
        MediaKind::Video => (path.to_path_buf(), tagger.tag(path, record).await),
    };

    // The modification time is set even when embedding failed.
    let mtime = FileTime::from_unix_time(record.captured_at.unix_timestamp(), 0);
    if let Err(e) = filetime::set_file_mtime(&final_path, mtime) {
        tracing::warn!(path = %final_path.display(), error = %e, "Could not set modification time");
    }

    match embedded {
        Ok(()) => {
            tracing::debug!(path = %final_path.display(), %identifier, "Tagged");
            Tagged::Done(kind)
        },
        Err(e) => {
            tracing::warn!(path = %final_path.display(), error = ?e, "Could not write metadata");
            Tagged::Failed
        },
    }
}

/// Writes EXIF into a JPEG, converting PNG content to JPEG first (and falling
/// back to PNG text chunks when that fails). Returns where the image ended up.
fn tag_image(path: &Path, record: &MemoryRecord) -> (PathBuf, Result<()>) {
    let bytes = match std::fs::read(path).or_raise(|| ErrorKind::Io) {
        Ok(bytes) => bytes,
        Err(e) => return (path.to_path_buf(), Err(e)),
    };
    match image::guess_format(&bytes) {
        Ok(ImageFormat::Jpeg) => (path.to_path_buf(), embed_jpeg(path, &bytes, record)),
        Ok(ImageFormat::Png) => match convert_png(path, &bytes, record) {
            Ok(target) => (target, Ok(())),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = ?e, "PNG conversion failed; writing text chunks");
                (path.to_path_buf(), text::write_png_text(path, record))
            },
        },
        _ => (path.to_path_buf(), Err(exn::Exn::from(ErrorKind::UnsupportedImage))),
    }
}

fn embed_jpeg(path: &Path, bytes: &[u8], record: &MemoryRecord) -> Result<()> {
    let tagged = jpeg::splice_exif(bytes, &jpeg::build_exif(record)?)?;
    imaging::write_atomic(path, &tagged).or_raise(|| ErrorKind::Io)
}

/// Flattens PNG content into `<stem>.jpg` with EXIF and removes the original
/// when the name changed. An existing `<stem>.jpg` is never replaced.
fn convert_png(path: &Path, bytes: &[u8], record: &MemoryRecord) -> Result<PathBuf> {
    let target = path.with_extension("jpg");
    if target != path && target.exists() {
        exn::bail!(ErrorKind::TargetExists(target));
    }
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png).or_raise(|| ErrorKind::Image)?;
    let encoded = imaging::encode_jpeg(&imaging::flatten(&image.to_rgba8())).or_raise(|| ErrorKind::Image)?;
    embed_jpeg(&target, &encoded, record)?;
    if target != path {
        std::fs::remove_file(path).or_raise(|| ErrorKind::Io)?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::{In, Reader, Tag, Value};
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use remem_export::models::Location;
    use rstest::rstest;
    use std::io::BufReader;
    use time::macros::datetime;

    const CAPTURED: i64 = 1_705_329_025;

    fn table() -> RecordTable {
        [("c3", MediaKind::Image), ("p4", MediaKind::Image), ("v5", MediaKind::Video), ("e6", MediaKind::Image)]
            .into_iter()
            .map(|(id, kind)| MemoryRecord {
                identifier: Identifier::new(id),
                captured_at: datetime!(2024-01-15 14:30:25).as_utc(),
                location: Location::new(37.7749, -122.4194),
                kind,
            })
            .collect()
    }

    fn mtime(path: &Path) -> i64 {
        FileTime::from_last_modification_time(&std::fs::metadata(path).unwrap()).unix_seconds()
    }

    #[rstest]
    #[case("c3.jpg", Some(("c3", MediaKind::Image)))]
    #[case("C3.JPG", Some(("c3", MediaKind::Image)))]
    #[case("c3_combined.mp4", Some(("c3", MediaKind::Video)))]
    #[case("0a1b-2c3d.png", Some(("0a1b-2c3d", MediaKind::Image)))]
    #[case("c3-main.jpg", Some(("c3-main", MediaKind::Image)))]
    #[case("c3.jpeg", None)]
    #[case("c3.mov", None)]
    #[case(".remem-x.part", None)]
    fn output_names(#[case] name: &str, #[case] expected: Option<(&str, MediaKind)>) {
        assert_eq!(match_output(name), expected.map(|(id, kind)| (Identifier::new(id), kind)));
    }

    #[tokio::test]
    async fn tags_jpeg_and_converts_png() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();
        RgbImage::from_pixel(4, 4, Rgb([50, 60, 70])).save(out.join("c3.jpg")).unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([50, 60, 70, 0])).save(out.join("p4.png")).unwrap();
        std::fs::write(out.join("e6.jpg"), b"").unwrap();
        std::fs::write(out.join("unknown.jpg"), b"whatever").unwrap();
        std::fs::create_dir(out.join(".tmp_work")).unwrap();
        std::fs::write(out.join(".tmp_work/c3.jpg"), b"scratch").unwrap();

        let found = candidates(out, ".tmp_work", &[], Mode::Apply);
        assert_eq!(found.len(), 4);

        let stats = RunStatistics::new();
        reconcile_all(found, &table(), &VideoTagger::default(), 4, Mode::Apply, &stats).await;
        assert_eq!(stats.get(Counter::ImagesTagged), 2);
        assert_eq!(stats.get(Counter::TagsFailed), 0);

        let exif = Reader::new()
            .read_from_container(&mut BufReader::new(std::fs::File::open(out.join("c3.jpg")).unwrap()))
            .unwrap();
        let stamp = &exif.get_field(Tag::DateTimeOriginal, In::PRIMARY).unwrap().value;
        assert_eq!(stamp, &Value::Ascii(vec![b"2024:01:15 14:30:25".to_vec()]));
        assert!(exif.get_field(Tag::GPSLatitude, In::PRIMARY).is_some());
        assert_eq!(mtime(&out.join("c3.jpg")), CAPTURED);

        // The PNG became a white-backed JPEG and the original is gone.
        assert!(!out.join("p4.png").exists());
        let converted = image::open(out.join("p4.jpg")).unwrap().to_rgb8();
        assert!(converted.get_pixel(0, 0).0.iter().all(|c| *c > 240));
        assert_eq!(mtime(&out.join("p4.jpg")), CAPTURED);
        // Scratch is not part of the output.
        assert_eq!(std::fs::read(out.join(".tmp_work/c3.jpg")).unwrap(), b"scratch");
    }

    #[tokio::test]
    async fn video_without_tools_still_gets_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v5.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        let stats = RunStatistics::new();
        reconcile_all(vec![video.clone()], &table(), &VideoTagger::default(), 1, Mode::Apply, &stats).await;
        assert_eq!(stats.get(Counter::TagsFailed), 1);
        assert_eq!(stats.get(Counter::VideosTagged), 0);
        assert_eq!(mtime(&video), CAPTURED);
    }

    #[tokio::test]
    async fn png_conversion_keeps_an_existing_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let jpeg = dir.path().join("p4.jpg");
        let png = dir.path().join("p4.png");
        RgbImage::from_pixel(2, 2, Rgb([200, 0, 0])).save(&jpeg).unwrap();
        let composited = std::fs::read(&jpeg).unwrap();
        RgbaImage::from_pixel(2, 2, Rgba([0, 0, 200, 255])).save(&png).unwrap();

        let stats = RunStatistics::new();
        reconcile_all(vec![png.clone()], &table(), &VideoTagger::default(), 1, Mode::Apply, &stats).await;
        // The PNG got text chunks instead; the JPEG is untouched.
        assert_eq!(stats.get(Counter::ImagesTagged), 1);
        assert_eq!(std::fs::read(&jpeg).unwrap(), composited);
        assert!(png.is_file());
        let reader = png::Decoder::new(std::fs::File::open(&png).unwrap()).read_info().unwrap();
        assert!(reader.info().uncompressed_latin1_text.iter().any(|c| c.keyword == "CreationTime"));
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_exiftool_write_falls_back_to_ffmpeg() {
        let tools = tempfile::tempdir().unwrap();
        let exiftool = script(
            tools.path(),
            "exiftool",
            "echo '    0 image files updated'; echo \"    1 files weren't updated due to errors\"; exit 1",
        );
        // Writes its last argument (the staging file) and leaves a marker.
        let ffmpeg = script(
            tools.path(),
            "ffmpeg",
            &format!("for last; do :; done; echo tagged > \"$last\"; touch '{}'", tools.path().join("called").display()),
        );
        let tagger = VideoTagger::new(Some(ExifTool::at(exiftool)), Some(Ffmpeg::at(ffmpeg)));

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("v5.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        let stats = RunStatistics::new();
        reconcile_all(vec![video.clone()], &table(), &tagger, 1, Mode::Apply, &stats).await;

        assert!(tools.path().join("called").exists());
        assert_eq!(std::fs::read_to_string(&video).unwrap(), "tagged\n");
        assert_eq!(stats.get(Counter::VideosTagged), 1);
        assert_eq!(stats.get(Counter::TagsFailed), 0);
        assert_eq!(mtime(&video), CAPTURED);
    }

    #[tokio::test]
    async fn preview_counts_planned_outputs_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path();
        RgbImage::from_pixel(2, 2, Rgb([1, 1, 1])).save(out.join("c3.jpg")).unwrap();
        let before = std::fs::read(out.join("c3.jpg")).unwrap();
        let planned = [out.join("v5.mp4"), out.join("c3.jpg"), out.join("noext.jpg")];

        let found = candidates(out, ".tmp_work", &planned, Mode::Preview);
        assert_eq!(found.len(), 3);
        let stats = RunStatistics::new();
        reconcile_all(found, &table(), &VideoTagger::default(), 2, Mode::Preview, &stats).await;
        assert_eq!(stats.get(Counter::ImagesTagged), 1);
        assert_eq!(stats.get(Counter::VideosTagged), 1);
        assert_eq!(std::fs::read(out.join("c3.jpg")).unwrap(), before);
        assert!(!out.join("v5.mp4").exists());
    }
}
