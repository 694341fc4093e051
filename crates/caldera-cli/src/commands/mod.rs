pub mod characterize;
pub mod combine;
pub mod config;
pub mod info;
pub mod masters;
pub mod profiles;
pub mod scan;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use caldera_core::config::CalderaConfig;
use caldera_core::frame::FrameKind;
use caldera_core::source::DirectoryFrameSource;
use caldera_core::store::CalibrationStore;
use clap::ValueEnum;
use tracing::debug;

/// Config file picked up from the project root when `--config` is absent.
const PROJECT_CONFIG: &str = "caldera.toml";

/// Project root plus the configuration that applies to it.
pub struct Context {
    pub project: PathBuf,
    pub config: CalderaConfig,
}

impl Context {
    pub fn load(project: &Path, config_path: Option<&Path>) -> Result<Self> {
        let fallback = project.join(PROJECT_CONFIG);
        let path = match config_path {
            Some(p) => Some(p.to_path_buf()),
            None if fallback.is_file() => Some(fallback),
            None => None,
        };

        let config = match path {
            Some(ref p) => CalderaConfig::load(p)
                .with_context(|| format!("Failed to load config {}", p.display()))?,
            None => CalderaConfig::default(),
        };
        debug!(
            project = %project.display(),
            config = ?path,
            "Configuration loaded"
        );
        Ok(Self {
            project: project.to_path_buf(),
            config,
        })
    }

    pub fn store(&self) -> CalibrationStore {
        CalibrationStore::new(self.config.layout(&self.project))
    }

    pub fn source(&self) -> DirectoryFrameSource {
        DirectoryFrameSource::new(self.config.layout(&self.project))
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Bias,
    Dark,
    Flat,
}

impl From<KindArg> for FrameKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Bias => FrameKind::Bias,
            KindArg::Dark => FrameKind::Dark,
            KindArg::Flat => FrameKind::Flat,
        }
    }
}

pub(crate) fn format_exposure(exposure: Option<f64>) -> String {
    exposure.map_or_else(|| "-".into(), |t| format!("{t}s"))
}

pub(crate) fn format_gain(gain: Option<i32>) -> String {
    gain.map_or_else(|| "-".into(), |g| g.to_string())
}
