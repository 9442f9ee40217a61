//! Prism CLI - run one object-store operation against a configured destination.
//!
//! # Usage
//!
//! ```text
//! prism-cli <destination> head <key>
//! prism-cli <destination> get <key> [file]
//! prism-cli <destination> put <key> <file>
//! prism-cli <destination> delete <key>
//! ```
//!
//! `get` without a file writes the object to stdout. The response status and
//! metadata are reported on stderr. `prism-cli --help` lists every argument.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PRISM_PROFILES_PATH` | `awsprofiles.json` | Access profiles and destinations |
//! | `PRISM_ENDPOINT` | *(unset)* | Path-style endpoint, e.g. `http://localhost:9000` |
//! | `PRISM_CONNECT_TIMEOUT_MS` | `10000` | Connect timeout |
//! | `PRISM_IO_TIMEOUT_MS` | `60000` | Read/write timeout |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prism_core::PrismConfig;
use prism_store::{ObjectStoreClient, ObjectStoreRequest, load_profiles};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Run one object-store operation against a configured destination.
#[derive(Parser, Debug)]
#[command(
    name = "prism-cli",
    version,
    about = "Run one object-store operation against a configured destination",
    long_about = None
)]
struct Cli {
    /// Destination name from the profiles file.
    destination: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Fetch an object's metadata.
    Head {
        /// Object key, relative to the destination prefix.
        key: String,
    },
    /// Download an object to a file, or to stdout when no file is given.
    Get {
        /// Object key, relative to the destination prefix.
        key: String,
        /// Output file.
        file: Option<PathBuf>,
    },
    /// Upload a file.
    Put {
        /// Object key, relative to the destination prefix.
        key: String,
        /// Input file.
        file: PathBuf,
    },
    /// Delete an object.
    Delete {
        /// Object key, relative to the destination prefix.
        key: String,
    },
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

fn execute(request: &mut ObjectStoreRequest, command: &Command) -> Result<()> {
    match command {
        Command::Head { key } => request.head(key)?,
        Command::Delete { key } => request.delete(key)?,
        Command::Put { key, file } => {
            let body =
                std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
            request.put_with_content_type(key, &body, content_type_for(file))?;
        }
        Command::Get { key, file } => {
            let mut body = Vec::new();
            request.get(key, &mut body)?;
            match file {
                Some(path) => std::fs::write(path, &body)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => std::io::stdout().lock().write_all(&body)?,
            }
        }
    }
    Ok(())
}

fn report(request: &ObjectStoreRequest) {
    let state = request.state();
    match request.response() {
        Some(response) => {
            eprintln!("state: {state:?}");
            eprintln!("status: {}", response.status);
            if let Some(len) = response.content_length {
                eprintln!("content-length: {len}");
            }
            if let Some(content_type) = &response.content_type {
                eprintln!("content-type: {content_type}");
            }
            if let Some(etag) = &response.etag {
                eprintln!("etag: {etag}");
            }
        }
        None => eprintln!("state: {state:?}"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = PrismConfig::from_env();
    init_tracing(&config.log_level)?;
    config.validate()?;

    let client = ObjectStoreClient::new(&config);
    let registered = load_profiles(&config.profiles_path, &client).with_context(|| {
        format!(
            "cannot load profiles from {}",
            config.profiles_path.display()
        )
    })?;
    info!(registered, destination = %cli.destination, "loaded profiles");

    let mut request = client.create_request(&cli.destination)?;
    let result = execute(&mut request, &cli.command);
    report(&request);
    client.free_request(request);

    result
}
