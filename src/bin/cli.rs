//! slotkv CLI
//!
//! Inspect and edit a slot store file from the command line.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use slotkv::slot::DEFAULT_SLOT_SIZE;
use slotkv::{Config, Lookup, Removal, SlotStore, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// slotkv CLI
#[derive(Parser, Debug)]
#[command(name = "slotkv-cli")]
#[command(about = "CLI for slotkv slot-file key-value stores")]
#[command(version)]
struct Args {
    /// Store file
    #[arg(short, long, default_value = "./uota.kv")]
    file: PathBuf,

    /// Slot size in bytes
    #[arg(short, long, default_value_t = DEFAULT_SLOT_SIZE)]
    slot_size: usize,

    /// fsync after every write
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Delete every key starting with a prefix
    DelPrefix {
        /// The prefix to match
        prefix: String,
    },

    /// Remove every key
    Erase,

    /// Print the number of slots
    Count,

    /// List keys in file order
    Keys,

    /// Check every slot's checksum
    Verify,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,slotkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let sync_strategy = if args.sync {
        SyncStrategy::Always
    } else {
        SyncStrategy::Flush
    };
    let config = Config::builder()
        .path(&args.file)
        .slot_size(args.slot_size)
        .sync_strategy(sync_strategy)
        .build();

    let store = match SlotStore::open(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&store, args.command) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(store: &SlotStore, command: Commands) -> slotkv::Result<ExitCode> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Get { key } => match store.get(&key)? {
            Lookup::Found(value) => {
                out.write_all(&value)?;
                writeln!(out)?;
            }
            Lookup::NotFound => return Ok(ExitCode::from(2)),
        },
        Commands::Set { key, value } => store.set(&key, value.as_bytes())?,
        Commands::Del { key } => {
            if store.delete(&key)? == Removal::NotFound {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::DelPrefix { prefix } => {
            let removed = store.delete_prefix(&prefix)?;
            writeln!(out, "{}", removed)?;
        }
        Commands::Erase => store.erase_all()?,
        Commands::Count => writeln!(out, "{}", store.slot_count()?)?,
        Commands::Keys => {
            for key in store.keys()? {
                writeln!(out, "{}", key)?;
            }
        }
        Commands::Verify => {
            let report = store.verify()?;
            writeln!(
                out,
                "slots={} valid={} checksum_failures={} corrupt={} duplicates={}",
                report.total_slots,
                report.valid_slots,
                report.checksum_failures,
                report.corrupt_slots,
                report.duplicate_keys.len()
            )?;
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
