pub mod batch;
pub mod cli;
pub mod commit;
pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod inflight;
pub mod job;
pub mod logger;
pub mod transform;
pub mod utils;
pub mod watch;

pub use batch::{collect_candidates, BatchSummary, BatchWalker};
pub use commit::{commit, CommitReport, LocalStorage, Storage};
pub use config::{ConversionOptions, PipelineConfig, ResizeBound};
pub use error::{ErrorKind, NormalizeError, Result};
pub use filter::{is_eligible, output_path_for, CandidateFile, ConversionJob, SourceFormat};
pub use job::{ConversionResult, ConversionStats, JobRunner, Outcome, SkipReason};
pub use transform::{encode_webp, load_image, resize_image, transform, EncodedImage};
pub use watch::{subscribe, DirectoryWatcher, WatchReport};
