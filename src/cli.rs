use crate::config::{ConversionOptions, PipelineConfig, ResizeBound};
use crate::error::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "img-normalize",
    about = "Normalize raster images in a directory tree to WebP",
    long_about = "img-normalize converts JPEG, PNG, TIFF and AVIF images to lossy WebP in place. \
                  The original is removed only after the converted file is confirmed on disk. \
                  Run `batch` once to backfill existing assets, then `watch` to convert new ones as they arrive.",
    version,
    after_help = "EXAMPLES:\n  \
    img-normalize batch ./public/images --max-width 2560 -r\n  \
    img-normalize watch ./public/images --max-width 1920 -q 80\n  \
    img-normalize watch ./uploads --max-width none --allow-oversized"
)]
pub struct Args {
    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'Q',
        long,
        global = true,
        help = "Only log warnings and errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Watch a directory and convert new or modified images",
        long_about = "Observe the root recursively and convert every eligible image once it has \
                      stopped changing. Runs until interrupted; conversions already running finish \
                      before the process exits."
    )]
    Watch {
        #[command(flatten)]
        convert: ConvertArgs,

        #[arg(
            long,
            env = "IMG_NORMALIZE_SETTLE_MS",
            default_value_t = 500,
            help = "Quiet period before a changed file is converted (ms)"
        )]
        settle_ms: u64,
    },

    #[command(
        about = "Convert every eligible image under a directory once",
        long_about = "Walk the root, convert each eligible image and print a summary. \
                      Exits with a non-zero status if any conversion failed."
    )]
    Batch {
        #[command(flatten)]
        convert: ConvertArgs,

        #[arg(
            short = 'r',
            long,
            env = "IMG_NORMALIZE_RECURSIVE",
            help = "Process subdirectories recursively"
        )]
        recursive: bool,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ConvertArgs {
    #[arg(env = "IMG_NORMALIZE_ROOT", help = "Root directory")]
    pub root: PathBuf,

    #[arg(
        short = 'w',
        long,
        env = "IMG_NORMALIZE_MAX_WIDTH",
        help = "Maximum output width in pixels, or 'none'",
        long_help = "Images wider than this are scaled down to it, preserving aspect ratio. \
                     Narrower images keep their size. Pass 'none' to never resize."
    )]
    pub max_width: ResizeBound,

    #[arg(
        short = 'q',
        long,
        env = "IMG_NORMALIZE_QUALITY",
        help = "WebP quality (1-100, default: 82)"
    )]
    pub quality: Option<u8>,

    #[arg(
        short = 'j',
        long,
        env = "IMG_NORMALIZE_WORKERS",
        help = "Number of conversion workers (default: CPU count, at most 4)"
    )]
    pub workers: Option<usize>,

    #[arg(
        long,
        env = "IMG_NORMALIZE_ALLOW_OVERSIZED",
        help = "Accept images above the decoder pixel limit"
    )]
    pub allow_oversized: bool,

    #[arg(
        long,
        default_value_t = 0,
        help = "Retry decode/encode failures this many times"
    )]
    pub retries: u32,

    #[arg(
        long,
        help = "Convert even when the .webp output already exists, overwriting it"
    )]
    pub replace_existing: bool,
}

impl ConvertArgs {
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let options = ConversionOptions::new(self.max_width, self.quality)?
            .allow_oversized(self.allow_oversized)
            .retries(self.retries)
            .replace_existing(self.replace_existing);
        PipelineConfig::new(self.root.clone(), options, self.workers)
    }
}

impl Commands {
    pub fn to_config(&self) -> Result<PipelineConfig> {
        match self {
            Commands::Watch { convert, settle_ms } => Ok(convert
                .to_config()?
                .settle(Duration::from_millis(*settle_ms))),
            Commands::Batch { convert, recursive } => {
                Ok(convert.to_config()?.recursive(*recursive))
            }
        }
    }
}
