use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bitemporal_encoders::dumps;
use bitemporal_encoders::error::{EncoderError, Result};
use bitemporal_encoders::registry;
use bitemporal_encoders::settings::Settings;
use bitemporal_encoders::storage::Backend;
use bitemporal_encoders::storage::columnar::ColumnarBackend;
use bitemporal_encoders::storage::sqlite::SqliteBackend;

const USAGE: &str = "usage: bitemporal_encoders [--config <file>] show <path[@cutoff]>";

fn show(settings: &Settings, path: &str) -> Result<()> {
    let value = match &settings.sqlite_path {
        Some(db) => SqliteBackend::open(db)?.read(path)?,
        None => ColumnarBackend::with_root(&settings.store_root).read(path)?,
    };
    match value {
        Some(value) => println!("{}", dumps(&value)?),
        None => info!(path, "nothing stored"),
    }
    Ok(())
}

fn run(args: &[String]) -> Result<()> {
    let (config, rest) = match args {
        [flag, file, rest @ ..] if flag == "--config" => (Some(file.as_str()), rest),
        rest => (None, rest),
    };
    let settings = Settings::load(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .with_target(false)
        .init();
    registry::configure_global(|r| r.set_legacy_lookup(settings.legacy_lookup))?;
    match rest {
        [command, path] if command == "show" => show(&settings, path),
        _ => Err(EncoderError::InvalidArgument {
            callable: "main".to_string(),
            message: USAGE.to_string(),
        }),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "failed");
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
