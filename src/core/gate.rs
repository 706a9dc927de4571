use std::{collections::BTreeMap, fs, path::PathBuf};

/// Local storage key holding the unlocked flag
pub const ACCESS_FLAG: &str = "ls_access_authorized";

/// A small persistent key/value store kept in a JSON file
#[derive(Debug)]
pub struct LocalStorage {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl LocalStorage {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let values = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(LocalStorage { path, values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.values)?)?;
        Ok(())
    }
}

/// Shared-secret check in front of the application
#[derive(Debug, Clone)]
pub struct AccessGate {
    code: String,
}

impl AccessGate {
    pub fn new(code: &str) -> Self {
        AccessGate {
            code: code.trim().to_lowercase(),
        }
    }

    /// Case-insensitive comparison after trimming. Empty input never matches.
    pub fn verify(&self, input: &str) -> bool {
        let input = input.trim().to_lowercase();
        !input.is_empty() && input == self.code
    }

    /// Verifies `input` and records the unlock on success.
    pub fn unlock(&self, input: &str, storage: &mut LocalStorage) -> anyhow::Result<bool> {
        if !self.verify(input) {
            if !input.trim().is_empty() {
                log::warn!("Rejected access code");
            }
            return Ok(false);
        }

        storage.set(ACCESS_FLAG, "true")?;
        log::info!("Access granted");
        Ok(true)
    }

    pub fn is_authorized(storage: &LocalStorage) -> bool {
        storage.get(ACCESS_FLAG) == Some("true")
    }
}
