use std::time::Duration;

pub const DEFAULT_QUALITY: u8 = 82;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

/// Upper bound on worker threads picked when none is configured.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Decoder pixel ceiling applied unless oversized inputs are allowed (0x3FFF * 0x3FFF).
pub const DEFAULT_PIXEL_LIMIT: u64 = 0x3FFF * 0x3FFF;

/// Extension every conversion produces.
pub const TARGET_EXTENSION: &str = "webp";

/// Lowercased extensions accepted as conversion input.
pub const SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "avif"];

/// Prefix for in-progress output files. Hidden, so the watcher never sees them.
pub const TEMP_FILE_PREFIX: &str = ".img-normalize-";

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);
pub const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const RETRY_DELAY: Duration = Duration::from_millis(750);

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
