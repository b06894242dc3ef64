//! Operator configuration.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use noisecase_core::lifecycle::LifecycleConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
  /// Path to the SQLite database. A leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub lifecycle:  LifecycleConfig,
}

fn default_store_path() -> PathBuf { PathBuf::from("noisecase.db") }

impl Settings {
  /// Layer the optional TOML file under `NOISECASE_*` environment variables.
  ///
  /// Nested keys use `__`, e.g. `NOISECASE_LIFECYCLE__AUTO_ASSIGN=false`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("NOISECASE")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?;

    let mut settings: Settings = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
