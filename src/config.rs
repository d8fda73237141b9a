use crate::constants::{DEFAULT_MAX_WORKERS, DEFAULT_QUALITY, DEFAULT_SETTLE, MAX_QUALITY, MIN_QUALITY};
use crate::error::{NormalizeError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Width policy applied before encoding. Never upscales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeBound {
    MaxWidth(u32),
    Unbounded,
}

impl ResizeBound {
    /// Target dimensions for a `width` x `height` source.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        match *self {
            ResizeBound::MaxWidth(max) if width > max => {
                let scaled = (height as f64 * max as f64 / width as f64).round() as u32;
                (max, scaled.max(1))
            }
            _ => (width, height),
        }
    }
}

impl fmt::Display for ResizeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResizeBound::MaxWidth(w) => write!(f, "{}", w),
            ResizeBound::Unbounded => f.write_str("none"),
        }
    }
}

impl FromStr for ResizeBound {
    type Err = NormalizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(ResizeBound::Unbounded),
            other => match other.parse::<u32>() {
                Ok(w) if w > 0 => Ok(ResizeBound::MaxWidth(w)),
                _ => Err(NormalizeError::InvalidMaxWidth(s.to_string())),
            },
        }
    }
}

/// Per-file conversion settings shared by the watcher and the walker.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub resize: ResizeBound,
    pub quality: u8,
    pub allow_oversized: bool,
    pub retries: u32,
    pub replace_existing: bool,
}

impl ConversionOptions {
    pub fn new(resize: ResizeBound, quality: Option<u8>) -> Result<Self> {
        let quality = quality.unwrap_or(DEFAULT_QUALITY);
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            return Err(NormalizeError::InvalidQuality(quality));
        }

        Ok(Self {
            resize,
            quality,
            allow_oversized: false,
            retries: 0,
            replace_existing: false,
        })
    }

    pub fn allow_oversized(mut self, allow: bool) -> Self {
        self.allow_oversized = allow;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }
}

/// Process-wide settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub root: PathBuf,
    pub options: ConversionOptions,
    pub workers: usize,
    pub recursive: bool,
    pub settle: Duration,
}

impl PipelineConfig {
    pub fn new(root: PathBuf, options: ConversionOptions, workers: Option<usize>) -> Result<Self> {
        if !root.is_dir() {
            return Err(NormalizeError::RootNotFound(root));
        }
        let root = root
            .canonicalize()
            .map_err(|_| NormalizeError::RootNotFound(root.clone()))?;

        let workers = match workers {
            Some(0) => return Err(NormalizeError::InvalidWorkers),
            Some(n) => n,
            None => default_workers(),
        };

        Ok(Self {
            root,
            options,
            workers,
            recursive: true,
            settle: DEFAULT_SETTLE,
        })
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, DEFAULT_MAX_WORKERS)
}
