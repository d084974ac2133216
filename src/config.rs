use anyhow::Context;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Configuration file contents (YAML).
///
/// `template_name` doubles as the output namespace: digests and the watermark
/// for this feed land under `<output_folder>/<template_name>/`.
#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    pub templates_folder: PathBuf,
    pub template_name: String,
    pub output_folder: PathBuf,
    pub contacts: PathBuf,
    pub sender: String,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// Backend credentials. All fields are optional here; the binary checks for
/// the ones the selected backend actually needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    /// Client secret file for the Gmail backend.
    pub file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub login: Option<String>,
    pub password: Option<String>,
}

impl DigestConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("cannot open config file {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("cannot parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Output namespace directory for this template.
    pub fn namespace_dir(&self) -> PathBuf {
        self.output_folder.join(&self.template_name)
    }
}
