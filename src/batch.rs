use crate::error::{GaugeError, Result};
use crate::models::{Frame, PipelineResult};
use crate::pipeline::{DebugConfig, GaugeReader, PipelineContext};
use crate::scale::ScaleCalculator;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Text written when a frame yields no reading at all
pub const NO_OBJECTS_LINE: &str = "No objects detected.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Process one image file
    Single,
    /// Process every `*.jpg` in a folder
    Folder,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    /// Also write `<stem>_processed.jpg` with the overlay
    pub save_image: bool,
    pub debug: Option<DebugConfig>,
}

/// Outcome of processing one image file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub image: PathBuf,
    pub report_path: PathBuf,
    pub readings: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub processed: Vec<FileReport>,
    pub skipped: Vec<PathBuf>,
}

/// List the images a run should process.
///
/// `Single` returns the path as-is; `Folder` returns the sorted `*.jpg`
/// entries (extension compared case-insensitively) and fails if none exist.
pub fn collect_images(mode: Mode, path: &Path) -> Result<Vec<PathBuf>> {
    match mode {
        Mode::Single => Ok(vec![path.to_path_buf()]),
        Mode::Folder => {
            let mut images: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_jpeg(p))
                .collect();
            images.sort();

            if images.is_empty() {
                return Err(GaugeError::NoImages(path.to_path_buf()));
            }
            Ok(images)
        }
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg"))
}

/// File name without its last extension
pub fn image_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Text report for one frame: one line per reading, or the no-objects line
pub fn report_text(result: &PipelineResult, calculator: &ScaleCalculator) -> String {
    if result.is_empty() {
        return format!("{}\n", NO_OBJECTS_LINE);
    }

    result
        .readings()
        .iter()
        .map(|r| format!("{}\n", calculator.report_line(r.value)))
        .collect()
}

/// Read one frame and write its report (and optional overlay) to disk.
///
/// The report is assembled in memory, written to a sibling temporary file
/// and renamed into place, so `<stem>.txt` is either absent or complete.
pub fn process_frame(
    reader: &GaugeReader,
    frame: &Frame,
    stem: &str,
    options: &BatchOptions,
) -> Result<(PathBuf, PipelineResult)> {
    let context = PipelineContext {
        debug: options.debug.as_ref().map(|d| d.for_image(stem)),
    };
    let result = reader.read_with_context(frame, &context)?;
    let text = report_text(&result, &reader.calculator);

    std::fs::create_dir_all(&options.output_dir)?;
    let report_path = options.output_dir.join(format!("{}.txt", stem));
    write_atomic(&report_path, text.as_bytes())?;

    if options.save_image {
        let rendered = reader.render(frame, &result);
        let image_path = options.output_dir.join(format!("{}_processed.jpg", stem));
        rendered.save(&image_path)?;
        tracing::info!(path = %image_path.display(), "saved processed image");
    }

    Ok((report_path, result))
}

/// Replace `path` with `contents` via a temporary file in the same directory
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    if let Err(e) = std::fs::write(&tmp_path, contents) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Open, read and report one image file
pub fn process_file(reader: &GaugeReader, path: &Path, options: &BatchOptions) -> Result<FileReport> {
    let frame = Frame::open(path)?;
    report_file(reader, path, &frame, options)
}

fn report_file(reader: &GaugeReader, path: &Path, frame: &Frame, options: &BatchOptions) -> Result<FileReport> {
    let start = Instant::now();

    let stem = image_stem(path);
    let (report_path, result) = process_frame(reader, frame, &stem, options)?;

    tracing::info!(
        image = %path.display(),
        objects = result.detected.len(),
        readings = result.readings().len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "processed image"
    );

    Ok(FileReport {
        image: path.to_path_buf(),
        report_path,
        readings: result.readings().len(),
    })
}

/// Process a single image or a folder of images, strictly one after another.
///
/// In `Single` mode any failure is returned. In `Folder` mode an image that
/// cannot be opened or decoded is skipped with a warning; failures while
/// writing reports still abort the run.
pub fn run(reader: &GaugeReader, mode: Mode, path: &Path, options: &BatchOptions) -> Result<BatchSummary> {
    let images = collect_images(mode, path)?;
    let mut summary = BatchSummary::default();

    for image in images {
        let frame = match Frame::open(&image) {
            Ok(frame) => frame,
            Err(e) if mode == Mode::Folder => {
                tracing::warn!(image = %image.display(), error = %e, "skipping image");
                summary.skipped.push(image);
                continue;
            }
            Err(e) => return Err(e),
        };

        summary.processed.push(report_file(reader, &image, &frame, options)?);
    }

    Ok(summary)
}
