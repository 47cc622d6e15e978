// config lets you read a separate config file
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;

pub const DEFAULT_FILE: &str = "encoders";
pub const ENV_PREFIX: &str = "ENCODERS";

// ------------- Settings -------------
/// Defaults, overridden by an optional settings file (`encoders.toml`,
/// `encoders.json`, ...), overridden by `ENCODERS_*` environment variables.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Settings {
    /// relative table file paths are taken under this directory
    pub store_root: String,
    /// documents go to this SQLite file when set
    pub sqlite_path: Option<String>,
    /// resolve unknown reconstruction tags by their trailing dotted name
    pub legacy_lookup: bool,
    pub log_filter: String,
}

impl Settings {
    pub fn load(file: Option<&str>) -> Result<Self> {
        let settings = Config::builder()
            .set_default("store_root", ".")?
            .set_default("legacy_lookup", true)?
            .set_default("log_filter", "info")?
            .add_source(File::with_name(file.unwrap_or(DEFAULT_FILE)).required(file.is_some()))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
