//! objfile CLI
//!
//! Inspect and transfer virtual files stored in a local object-store directory

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use objfile::config::{DEFAULT_LOG_LEVEL, ENV_LOG_LEVEL};
use objfile::{Driver, DriverConfig, LocalStore, OpenMode, SeekAnchor};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "objfile")]
#[command(version, about = "Read and write virtual files over object storage")]
struct Args {
    /// Directory holding one sub-directory per bucket
    #[arg(short = 'r', long, default_value = ".")]
    root: PathBuf,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Bucket used when a URI leaves the bucket empty
    #[arg(short = 'b', long)]
    bucket: Option<String>,

    /// URI scheme, overrides configuration and environment
    #[arg(short = 's', long)]
    scheme: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the logical size of a virtual file (-1 if unavailable)
    Size { uri: String },

    /// Print whether a virtual file exists
    Exists { uri: String },

    /// Write a virtual file, or a range of it, to stdout
    Cat {
        uri: String,

        /// Logical offset to start at
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Maximum number of bytes to print
        #[arg(long)]
        length: Option<u64>,
    },

    /// Download a virtual file to a local path
    Get { uri: String, dest: PathBuf },

    /// Upload a local file to a new object
    Put { source: PathBuf, uri: String },

    /// Delete one object
    Rm { uri: String },
}

fn load_config(args: &Args) -> anyhow::Result<DriverConfig> {
    let mut config = match &args.config {
        Some(path) => DriverConfig::from_toml_file(path)
            .with_context(|| format!("loading configuration from {:?}", path))?,
        None => DriverConfig::default(),
    }
    .with_env_overrides()
    .context("applying OBJFILE_* environment variables")?;

    if let Some(scheme) = &args.scheme {
        config = config.with_scheme(scheme.clone());
    }
    if let Some(bucket) = &args.bucket {
        config = config.with_default_bucket(bucket.clone());
    }
    config.validate().context("invalid command-line options")?;
    Ok(config)
}

fn cat(driver: &Driver, uri: &str, offset: u64, length: Option<u64>) -> anyhow::Result<u64> {
    let mut file = driver
        .open(uri, OpenMode::Read)
        .with_context(|| format!("opening {}", uri))?;
    let offset = i64::try_from(offset).context("offset too large")?;
    file.seek(offset, SeekAnchor::Start)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut buf = vec![0u8; driver.preferred_buffer_size()];
    let mut remaining = length.unwrap_or(u64::MAX);
    let mut written = 0u64;

    while remaining > 0 {
        let want = (buf.len() as u64).min(remaining) as usize;
        let n = file.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        remaining -= n as u64;
        written += n as u64;
    }
    out.flush()?;
    file.close()?;
    Ok(written)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Installed before the configuration loads so its debug output shows up.
    // RUST_LOG wins over the configured level.
    let (initial, pinned) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => {
            let level =
                std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
            (EnvFilter::new(level), false)
        }
    };
    let (filter, filter_handle) = reload::Layer::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;
    if !pinned {
        filter_handle
            .reload(EnvFilter::new(config.log_level.as_str()))
            .context("applying configured log level")?;
    }
    debug!("Effective configuration: {:?}", config);

    let store = LocalStore::new(&args.root)
        .with_context(|| format!("opening store root {:?}", args.root))?;
    info!("Store root: {:?}", store.root());

    let driver = Driver::new(config);
    driver.connect(Arc::new(store));

    match args.command {
        Command::Size { uri } => {
            println!("{}", driver.size(&uri));
        }
        Command::Exists { uri } => {
            println!("{}", driver.exists(&uri));
        }
        Command::Cat {
            uri,
            offset,
            length,
        } => {
            let written = cat(&driver, &uri, offset, length)?;
            info!("{} bytes written", written);
        }
        Command::Get { uri, dest } => {
            let copied = driver
                .copy_to_local(&uri, &dest)
                .with_context(|| format!("downloading {} to {:?}", uri, dest))?;
            info!("Downloaded {} bytes", copied);
        }
        Command::Put { source, uri } => {
            if !source.is_file() {
                bail!("{:?} is not a regular file", source);
            }
            let copied = driver
                .copy_from_local(&source, &uri)
                .with_context(|| format!("uploading {:?} to {}", source, uri))?;
            info!("Uploaded {} bytes", copied);
        }
        Command::Rm { uri } => {
            driver
                .remove(&uri)
                .with_context(|| format!("removing {}", uri))?;
        }
    }

    driver.disconnect();
    Ok(())
}
