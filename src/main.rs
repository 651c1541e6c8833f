// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use dubsplice::app_config::{self, Config};
use dubsplice::app_controller::{Controller, RunOptions};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dub a job (or every *.job.json in a directory) and write the outputs
    Run(RunArgs),

    /// Print the ad splice plan of a job without processing audio
    Plan {
        /// Job manifest
        #[arg(value_name = "JOB")]
        job: PathBuf,
    },

    /// Generate shell completions for dubsplice
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Job manifest, or a directory of *.job.json manifests
    #[arg(value_name = "JOB")]
    job: PathBuf,

    /// Output directory (defaults to the manifest's output_dir)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Use test-tone synthesis and tagged translations instead of the job's files
    #[arg(long)]
    dry_run: bool,

    /// Do not read or write the artifact cache
    #[arg(long)]
    no_cache: bool,

    /// Maximum number of segments processed at once
    #[arg(long, env = "DUBSPLICE_CONCURRENCY")]
    concurrency: Option<usize>,
}

/// dubsplice - dub-timeline synthesis and ad splice engine
#[derive(Parser, Debug)]
#[command(name = "dubsplice")]
#[command(version)]
#[command(about = "Fit dubbed speech to a transcript timeline and splice out ads")]
#[command(long_about = "dubsplice places synthesized translated speech on the timeline of the original
audio, removes detected ad intervals and writes one dubbed track plus a video cut list.

EXAMPLES:
    dubsplice run episode.job.json              # Dub one job
    dubsplice run --dry-run episode.job.json    # Use test tones instead of clips
    dubsplice run -f jobs/                      # Dub every *.job.json under jobs/
    dubsplice plan episode.job.json             # Show the splice plan only
    dubsplice completions bash > dubsplice.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    // The logger accepts everything; log::max_level does the filtering
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(record.level()),
                now,
                Self::get_emoji_for_level(record.level()),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default; the level is
    // updated after loading the config
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "dubsplice", &mut std::io::stdout());
            Ok(())
        }
        Commands::Plan { job } => {
            let config = load_config(&cli.config_path, cli.log_level.as_ref())?;
            let controller = Controller::with_config(config)?;
            let cuts = controller.plan(&job).await?;
            println!("{}", serde_json::to_string_pretty(&cuts)?);
            println!("-vf \"{}\"", cuts.video_filter());
            println!("-af \"{}\"", cuts.audio_filter());
            Ok(())
        }
        Commands::Run(args) => {
            let mut config = load_config(&cli.config_path, cli.log_level.as_ref())?;
            if args.no_cache {
                config.pipeline.cache_enabled = false;
            }
            if let Some(concurrency) = args.concurrency {
                config.pipeline.concurrency = concurrency;
            }
            run_jobs(config, args).await
        }
    }
}

fn load_config(config_path: &str, cli_level: Option<&CliLogLevel>) -> Result<Config> {
    let mut config = Config::load_or_create(Path::new(config_path))?;

    // Command line log level wins over the config file
    match cli_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }
    Ok(config)
}

async fn run_jobs(config: Config, args: RunArgs) -> Result<()> {
    let controller = Controller::with_config(config)?;
    let options = RunOptions {
        force_overwrite: args.force_overwrite,
        dry_run: args.dry_run,
        output_dir: args.output_dir,
    };

    if args.job.is_file() {
        if let Some(outputs) = controller.run(&args.job, &options).await? {
            info!("Cut list: {:?}", outputs.cut_list);
        }
    } else if args.job.is_dir() {
        controller.run_folder(&args.job, &options).await?;
    } else {
        return Err(anyhow!("Job path does not exist: {:?}", args.job));
    }
    Ok(())
}
