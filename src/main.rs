use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dirguard::config::{
    get_logs_dir, ProtectorConfig, RecoveryActions, ScanErrorPolicy, DEFAULT_ARCHIVE_NAME,
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_PAYLOAD_NAME, DEFAULT_THRESHOLD,
};
use dirguard::error::ProtectorError;
use dirguard::events::EventBus;
use dirguard::logging::{init_logging, EventJournal};
use dirguard::protector::{snapshot_directory, DirectoryProtector, EXIT_RECOVERY_FAILED};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dirguard", about = "Directory integrity monitor", version)]
struct Cli {
    /// Directory for the application log and event journal (default ~/.dirguard/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and recover from backup when changes burst past the threshold
    Watch(WatchArgs),
    /// Print the fingerprint table of a directory as JSON
    Fingerprint {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Show the most recent journal events, newest first
    Events {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args)]
struct WatchArgs {
    /// Directory to monitor
    #[arg(long)]
    dir: PathBuf,

    /// Directory holding the recovery payload and system archive
    #[arg(long)]
    backup: PathBuf,

    /// File the recovery payload is copied over
    #[arg(long)]
    self_artifact: PathBuf,

    /// Modifications tolerated before recovery triggers
    #[arg(long, default_value_t = DEFAULT_THRESHOLD, value_parser = clap::value_parser!(u32).range(1..))]
    threshold: u32,

    /// Seconds between poll passes
    #[arg(long, default_value_t = DEFAULT_CHECK_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    #[arg(long, value_enum, default_value_t = RecoveryArg::Both)]
    recovery: RecoveryArg,

    /// Stop monitoring when a file cannot be hashed instead of skipping it
    #[arg(long)]
    strict: bool,

    #[arg(long, default_value = DEFAULT_PAYLOAD_NAME)]
    payload_name: String,

    #[arg(long, default_value = DEFAULT_ARCHIVE_NAME)]
    archive_name: String,

    /// Where the system archive is copied before extraction (default: OS temp dir)
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// Root the system archive is extracted over
    #[arg(long, default_value = "/")]
    restore_root: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum RecoveryArg {
    Both,
    Code,
    System,
}

impl From<RecoveryArg> for RecoveryActions {
    fn from(arg: RecoveryArg) -> Self {
        match arg {
            RecoveryArg::Both => RecoveryActions::Both,
            RecoveryArg::Code => RecoveryActions::CodeOnly,
            RecoveryArg::System => RecoveryActions::SystemOnly,
        }
    }
}

impl WatchArgs {
    fn into_config(self) -> ProtectorConfig {
        let mut config = ProtectorConfig::new(self.dir, self.backup, self.self_artifact)
            .with_threshold(self.threshold)
            .with_check_interval_secs(self.interval);
        config.payload_name = self.payload_name;
        config.archive_name = self.archive_name;
        if let Some(staging_dir) = self.staging_dir {
            config.staging_dir = staging_dir;
        }
        config.restore_root = self.restore_root;
        config.recovery_actions = self.recovery.into();
        config.scan_error_policy = if self.strict {
            ScanErrorPolicy::Abort
        } else {
            ScanErrorPolicy::Skip
        };
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("dirguard: {:#}", e);
            let recovery_failed = e
                .downcast_ref::<ProtectorError>()
                .is_some_and(ProtectorError::is_recovery_error);
            if recovery_failed {
                ExitCode::from(EXIT_RECOVERY_FAILED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let logs_dir = match cli.log_dir {
        Some(dir) => dir,
        None => get_logs_dir()?,
    };

    match cli.command {
        Commands::Watch(args) => {
            if let Err(e) = init_logging(&logs_dir) {
                eprintln!("Failed to initialize logging: {}", e);
            }

            let events = EventBus::default().with_journal(EventJournal::in_dir(&logs_dir));
            let mut protector = DirectoryProtector::new(args.into_config(), events)?;

            let exit = protector.run().await?;
            info!(code = exit.exit_code(), "Exiting for restart");
            Ok(ExitCode::from(exit.exit_code()))
        }
        Commands::Fingerprint { dir } => {
            let table = snapshot_directory(&dir)
                .with_context(|| format!("failed to fingerprint {}", dir.display()))?;
            println!("{}", serde_json::to_string_pretty(&table)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Events { limit } => {
            let journal = EventJournal::in_dir(&logs_dir);
            for event in journal.read(Some(limit))? {
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
