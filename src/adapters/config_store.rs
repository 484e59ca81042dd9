use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::domain::{AppConfig, ClientState, DomainError};
use crate::ports::ConfigStore;

/// TOML-based configuration store with OS-specific paths.
///
/// Holds two files: `config.toml` (operator-editable settings) and
/// `state.toml` (the one durable client flag).
pub struct TomlConfigStore {
    data_dir: PathBuf,
}

impl TomlConfigStore {
    /// Create a new TomlConfigStore.
    /// Uses OS-specific application data directories.
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = Self::get_data_dir()?;

        fs::create_dir_all(&data_dir)?;

        info!(data_dir = ?data_dir, "ConfigStore initialized");

        Ok(Self { data_dir })
    }

    #[cfg(test)]
    pub fn at(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Get the OS-specific application data directory.
    /// - macOS: ~/Library/Application Support/WildWatch/
    /// - Windows: %APPDATA%\WildWatch\
    /// - Linux: ~/.config/WildWatch/
    fn get_data_dir() -> Result<PathBuf, DomainError> {
        #[cfg(target_os = "macos")]
        {
            dirs::data_dir()
                .map(|p| p.join("WildWatch"))
                .ok_or_else(|| {
                    DomainError::Config("Could not find application data directory".to_string())
                })
        }

        #[cfg(not(target_os = "macos"))]
        {
            dirs::config_dir()
                .map(|p| p.join("WildWatch"))
                .ok_or_else(|| {
                    DomainError::Config("Could not find application data directory".to_string())
                })
        }
    }

    /// Get the OS-specific log directory.
    fn get_logs_dir(&self) -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            dirs::data_dir()
                .map(|p| p.join("WildWatch").join("logs"))
                .unwrap_or_else(|| self.data_dir.join("logs"))
        }

        #[cfg(not(target_os = "linux"))]
        {
            self.data_dir.join("logs")
        }
    }

    fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.toml")
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let config_path = self.config_path();

        if config_path.exists() {
            debug!(path = ?config_path, "Loading configuration");
            let content = fs::read_to_string(&config_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            info!(path = ?config_path, "Configuration loaded");
            Ok(config)
        } else {
            info!(path = ?config_path, "Configuration file not found, creating default");
            let config = AppConfig::new();
            self.save(&config)?;
            Ok(config)
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
        let config_path = self.config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&config_path, content)?;

        info!(path = ?config_path, "Configuration saved");
        Ok(())
    }

    fn load_state(&self) -> Result<ClientState, DomainError> {
        let state_path = self.state_path();

        if state_path.exists() {
            let content = fs::read_to_string(&state_path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(ClientState::default())
        }
    }

    fn save_state(&self, state: &ClientState) -> Result<(), DomainError> {
        let state_path = self.state_path();

        if let Some(parent) = state_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(state)?;
        fs::write(&state_path, content)?;

        debug!(path = ?state_path, "Client state saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.get_logs_dir()
    }

    fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }
}
