//! devportal CLI - back up and restore a developer portal

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use devportal::sync::{ApplyOptions, CaptureOptions, Synchronizer};
use devportal::{ArchiveReader, Config, DirPortal, Error};

#[derive(Parser)]
#[command(name = "devportal")]
#[command(about = "developer portal backup and restore")]
#[command(version)]
struct Cli {
    /// config file
    #[arg(short, long, env = "DEVPORTAL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// portal directory (overrides the config file)
    #[arg(short, long, env = "DEVPORTAL_PORTAL", global = true)]
    portal: Option<PathBuf>,

    /// enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize an empty portal directory
    Init {
        /// path to create the portal at
        path: PathBuf,
    },

    /// capture the portal into a new archive
    Capture {
        /// archive to write
        #[arg(short, long = "out")]
        out: PathBuf,

        /// overwrite an existing archive
        #[arg(short, long)]
        force: bool,
    },

    /// apply an archive to the portal
    Apply {
        /// archive to read
        #[arg(short, long = "in")]
        input: PathBuf,

        /// keep portal content that the archive does not contain
        #[arg(long)]
        no_delete: bool,
    },

    /// delete all content items and blobs from the portal
    Reset {
        /// confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// list the entries of an archive
    Ls {
        /// archive to list
        archive: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> devportal::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Init { path } => {
            DirPortal::init(&path)?;
            println!("initialized portal at {}", path.display());
        }

        Commands::Capture { out, force } => {
            let portal = open_portal(cli.portal.as_deref(), &config)?;
            let sync = Synchronizer::new(&portal, &portal);
            let report = sync.capture(&out, &CaptureOptions { overwrite: force })?;

            println!(
                "captured {} content items and {} blobs ({} bytes) to {}",
                report.items,
                report.blobs.ok,
                report.bytes,
                out.display()
            );
            println!("{} ok, {} errors", report.items + report.blobs.ok, report.errors());
        }

        Commands::Apply { input, no_delete } => {
            let portal = open_portal(cli.portal.as_deref(), &config)?;
            let sync = Synchronizer::new(&portal, &portal);
            let options = ApplyOptions {
                delete_extra: config.delete_extra && !no_delete,
            };
            let report = sync.apply(&input, &options)?;

            let written = &report.written;
            println!(
                "applied {} content items and {} blobs from {}",
                written.items.ok,
                written.blobs.ok,
                input.display()
            );
            if let Some(deleted) = report.reconciled {
                println!(
                    "deleted {} content items and {} blobs",
                    deleted.items.ok, deleted.blobs.ok
                );
            }
            if report.entries.blobs.skipped > 0 {
                println!("{} entries skipped", report.entries.blobs.skipped);
            }
            println!(
                "{} ok, {} errors",
                written.items.ok + written.blobs.ok,
                report.errors()
            );
        }

        Commands::Reset { yes } => {
            if !yes {
                return Err(Error::NotConfirmed("reset"));
            }
            let portal = open_portal(cli.portal.as_deref(), &config)?;
            let report = Synchronizer::new(&portal, &portal).reset()?;
            println!(
                "deleted {} content items and {} blobs",
                report.items.ok, report.blobs.ok
            );
            println!(
                "{} ok, {} errors",
                report.items.ok + report.blobs.ok,
                report.errors()
            );
        }

        Commands::Ls { archive } => {
            let mut reader = ArchiveReader::open(&archive)?;
            for entry in reader.entries()? {
                println!("{}", entry);
            }
            reader.close();
        }
    }

    Ok(())
}

/// open the portal named on the command line, falling back to the config file
fn open_portal(flag: Option<&Path>, config: &Config) -> devportal::Result<DirPortal> {
    let path = flag
        .map(Path::to_path_buf)
        .or_else(|| config.portal.clone())
        .ok_or(Error::PortalNotConfigured)?;
    Ok(DirPortal::open(&path)?.with_page_size(config.effective_page_size()))
}
