use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DirscopeError, Result};

/// Root application configuration, loaded from `~/.config/dirscope/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub core: CoreConfig,
    pub dedup: DedupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub library_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Pairs scoring strictly above this are grouped.
    pub similarity_threshold: f64,
    /// Action pre-selected on freshly built groups: `merge`, `variant` or `keep`.
    pub default_action: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("dirscope");

        Self {
            library_path: data_dir.to_string_lossy().to_string(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            default_action: "merge".to_string(),
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/dirscope/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DIRSCOPE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dirscope")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file missing, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.dedup.similarity_threshold) {
            return Err(DirscopeError::ConfigError(format!(
                "dedup.similarity_threshold must be within [0, 1], got {}",
                self.dedup.similarity_threshold
            )));
        }
        if !matches!(
            self.dedup.default_action.as_str(),
            "merge" | "variant" | "keep"
        ) {
            return Err(DirscopeError::ConfigError(format!(
                "unknown dedup.default_action: {}",
                self.dedup.default_action
            )));
        }
        Ok(())
    }

    pub fn set_library_path(&mut self, path: PathBuf) {
        self.core.library_path = path.to_string_lossy().to_string();
    }

    // ─── Derived paths ─────────────────────────────────────

    pub fn library_path(&self) -> PathBuf {
        PathBuf::from(&self.core.library_path)
    }

    /// Path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.library_path().join("dirscope.db")
    }
}
