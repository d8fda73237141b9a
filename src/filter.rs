//! Eligibility rules and output naming.
//!
//! Everything here is pure: no filesystem access, so the watcher can run it on
//! every raw event and the walker on every directory entry.

use crate::config::{ConversionOptions, ResizeBound};
use crate::constants::TARGET_EXTENSION;
use image::ImageFormat;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Raster formats accepted as conversion input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Tiff,
    Avif,
}

impl SourceFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(SourceFormat::Jpeg),
            "png" => Some(SourceFormat::Png),
            "tif" | "tiff" => Some(SourceFormat::Tiff),
            "avif" => Some(SourceFormat::Avif),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Hint for the decoder when the content sniff is inconclusive.
    pub fn image_format(&self) -> ImageFormat {
        match self {
            SourceFormat::Jpeg => ImageFormat::Jpeg,
            SourceFormat::Png => ImageFormat::Png,
            SourceFormat::Tiff => ImageFormat::Tiff,
            SourceFormat::Avif => ImageFormat::Avif,
        }
    }
}

/// A path picked up by the watcher or the walker.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub extension: String,
    pub detected_at: SystemTime,
}

impl CandidateFile {
    /// Returns `None` when the path is not an eligible source.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let extension = path.extension()?.to_str()?.to_string();
        let format = SourceFormat::from_extension(&extension)?;
        if is_target(&extension) {
            return None;
        }

        Some(Self {
            path,
            format,
            extension,
            detected_at: SystemTime::now(),
        })
    }
}

/// One input-to-output conversion, fully determined by the candidate and options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: SourceFormat,
    pub resize: ResizeBound,
    pub quality: u8,
}

impl ConversionJob {
    pub fn new(candidate: &CandidateFile, options: &ConversionOptions) -> Self {
        Self {
            input: candidate.path.clone(),
            output: output_path_for(&candidate.path),
            format: candidate.format,
            resize: options.resize,
            quality: options.quality,
        }
    }

    /// Convenience for callers holding a bare path.
    pub fn for_path(path: &Path, options: &ConversionOptions) -> Option<Self> {
        CandidateFile::from_path(path).map(|candidate| Self::new(&candidate, options))
    }
}

fn is_target(extension: &str) -> bool {
    extension.eq_ignore_ascii_case(TARGET_EXTENSION)
}

/// Whether `path` names an eligible source image.
pub fn is_eligible(path: &Path) -> bool {
    CandidateFile::from_path(path).is_some()
}

/// Same directory, same stem, target extension.
pub fn output_path_for(path: &Path) -> PathBuf {
    path.with_extension(TARGET_EXTENSION)
}

/// True when any component of `path` below `root` starts with a dot.
pub fn is_hidden(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}
