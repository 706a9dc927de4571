use std::{fs, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use super::roles::{RoleCaps, RoleCatalog, RoleOption};

pub const DEFAULT_WEB_PORT: u16 = 28010;

/// Json struct for service settings
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    pub web_port: Option<u16>,
    pub backend: BackendSettings,

    /// Shared code unlocking the directory
    pub access_code: String,

    #[serde(default)]
    pub role_caps: RoleCaps,

    /// Replaces the built-in role catalog
    pub roles: Option<Vec<RoleOption>>,

    /// File holding the local unlock flag
    pub local_storage: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendSettings {
    Sqlite {
        database: PathBuf,
        bucket_dir: PathBuf,
        /// Base URL under which `bucket_dir` is served
        public_url: String,
    },
    Rest {
        url: String,
        api_key: String,
    },
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = serde_json::from_str(&fs::read_to_string(path)?)?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn web_port(&self) -> u16 {
        self.web_port.unwrap_or(DEFAULT_WEB_PORT)
    }

    pub fn role_catalog(&self) -> RoleCatalog {
        match &self.roles {
            Some(roles) => RoleCatalog::new(roles.clone()),
            None => RoleCatalog::default(),
        }
    }

    pub fn local_storage_path(&self) -> PathBuf {
        self.local_storage
            .clone()
            .unwrap_or_else(|| PathBuf::from("local_storage.json"))
    }
}
