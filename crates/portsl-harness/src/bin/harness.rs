//! CLI entrypoint for the shared-library harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use portsl_abi::HostSharedLibraries;
use portsl_core::OpenFlags;
use portsl_harness::structured_log::{LogEmitter, LogEntry, LogLevel};
use portsl_harness::{SymbolSpec, inventory, probe_library};

/// Diagnostics for the portable shared-library layer.
#[derive(Debug, Parser)]
#[command(name = "portsl-harness")]
#[command(about = "Inspect and probe shared libraries through the portsl layer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List loaded libraries and their mapped ranges.
    Libraries {
        /// Emit the inventory as JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Stop after this many regions.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Open a library, resolve symbols and close it again.
    Open {
        /// Library name or path.
        name: String,
        /// Defer symbol binding.
        #[arg(long)]
        lazy: bool,
        /// Apply the platform prefix and suffix to the name.
        #[arg(long)]
        decorate: bool,
        /// Only succeed if the library is already loaded.
        #[arg(long)]
        no_load: bool,
        /// Open the running executable instead of `name`.
        #[arg(long)]
        executable: bool,
        /// Symbol to resolve, `NAME` or `NAME:SIGNATURE`. Repeatable.
        #[arg(long = "symbol")]
        symbols: Vec<SymbolSpec>,
        /// JSONL log path (if omitted, logs go to stderr).
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Print the configuration resolved from the environment.
    Config,
}

fn open_flags(lazy: bool, decorate: bool, no_load: bool, executable: bool) -> OpenFlags {
    let mut flags = OpenFlags::empty();
    for (set, flag) in [
        (lazy, OpenFlags::LAZY),
        (decorate, OpenFlags::DECORATE),
        (no_load, OpenFlags::NO_LOAD),
        (executable, OpenFlags::OPEN_EXECUTABLE),
    ] {
        if set {
            flags |= flag;
        }
    }
    flags
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let service = HostSharedLibraries::from_env();
    service.startup()?;

    match cli.command {
        Command::Libraries { json, limit } => {
            let inventory = inventory::collect(&service, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&inventory)?);
            } else {
                for lib in &inventory.libraries {
                    println!(
                        "{:#018x}-{:#018x} {:>4} {:>10}  {}",
                        lib.low, lib.high, lib.regions, lib.mapped_bytes, lib.path
                    );
                }
                eprintln!(
                    "{} libraries, {} regions",
                    inventory.libraries.len(),
                    inventory.total_regions
                );
            }
        }
        Command::Open {
            name,
            lazy,
            decorate,
            no_load,
            executable,
            symbols,
            log,
        } => {
            let flags = open_flags(lazy, decorate, no_load, executable);
            let report = match log {
                Some(path) => {
                    let mut emitter = LogEmitter::to_file(&path, "probe")?;
                    let report = probe_library(&service, &name, flags, &symbols, &mut emitter)?;
                    emitter.emit_entry(
                        LogEntry::new("", LogLevel::Info, "probe_done")
                            .with_library(&name)
                            .with_details(serde_json::to_value(&report)?),
                    )?;
                    emitter.flush()?;
                    report
                }
                None => {
                    let mut emitter = LogEmitter::new(std::io::stderr(), "probe");
                    probe_library(&service, &name, flags, &symbols, &mut emitter)?
                }
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.passed() {
                service.shutdown();
                std::process::exit(1);
            }
        }
        Command::Config => {
            let config = service.config();
            println!("transcoder: {:?}", config.transcoder);
            println!(
                "transcoder (resolved): {:?}",
                portsl_abi::transcode::resolve(config.transcoder)
            );
            println!("self_dir_fallback: {}", config.self_dir_fallback);
        }
    }

    service.shutdown();
    Ok(())
}
