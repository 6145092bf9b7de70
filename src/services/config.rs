use crate::models::config::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "plate-reader";
const CONFIG_FILE: &str = "config.json";

/// Reads and writes the JSON config file.
///
/// The file lives at `<platform config dir>/plate-reader/config.json`
/// unless an explicit path is given. A missing file means defaults.
pub struct ConfigManager {
    path: PathBuf,
}

/// Result of writing a default config file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyExists,
}

impl ConfigManager {
    /// Manager for the platform config file
    pub fn new() -> Result<Self, String> {
        let dir = dirs::config_dir().ok_or("Failed to determine config directory")?;
        Ok(Self::from_path(dir.join(APP_DIR).join(CONFIG_FILE)))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `explicit` if given, the platform location otherwise
    pub fn locate(explicit: Option<&Path>) -> Result<Self, String> {
        match explicit {
            Some(path) => Ok(Self::from_path(path)),
            None => Self::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Parent directory of the file; a bare file name resolves to `.`
    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }

    /// Load and validate. Defaults when the file is absent.
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.exists() {
            return Ok(AppConfig::default());
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| format!("Failed to read {}: {}", self.path.display(), e))?;
        let config: AppConfig = serde_json::from_str(&raw)
            .map_err(|e| format!("Failed to parse {}: {}", self.path.display(), e))?;

        config
            .validate()
            .map_err(|e| format!("Invalid config {}: {}", self.path.display(), e))?;
        Ok(config)
    }

    /// Validate, then write pretty-printed JSON, creating the directory
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        config.validate()?;

        fs::create_dir_all(self.dir())
            .map_err(|e| format!("Failed to create {}: {}", self.dir().display(), e))?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(&self.path, json).map_err(|e| format!("Failed to write {}: {}", self.path.display(), e))
    }

    /// Write the default config unless a file is already there
    pub fn init_default(&self) -> Result<InitOutcome, String> {
        if self.exists() {
            return Ok(InitOutcome::AlreadyExists);
        }
        self.save(&AppConfig::default())?;
        Ok(InitOutcome::Created)
    }
}
