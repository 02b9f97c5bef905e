use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    // Base URL of the parse service
    #[serde(default = "AppSettings::default_backend_url")]
    pub backend_url: String,
    // Upper bound on one parse request; large models take minutes
    #[serde(default = "AppSettings::default_parse_timeout")]
    pub parse_timeout_secs: u64,
    // Ask the backend to run the cost pipeline alongside parsing
    #[serde(default = "AppSettings::default_calculate_costs")]
    pub calculate_costs: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend_url: Self::default_backend_url(),
            parse_timeout_secs: Self::default_parse_timeout(),
            calculate_costs: true,
        }
    }
}

impl AppSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/IFC-Scope
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("IFC-Scope");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\IFC-Scope
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("IFC-Scope");
            }
            return PathBuf::from("IFC-Scope");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/IFC-Scope or ~/.config/IFC-Scope
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("IFC-Scope");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("IFC-Scope");
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_dir().join("settings.json");
        if path.exists() {
            let mut f = std::fs::File::open(path)?;
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            let v: Self = serde_json::from_str(&s)?;
            return Ok(v);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join("settings.json");
        let s = serde_json::to_string_pretty(self)?;
        let mut f = std::fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Return the directory where the settings file (settings.json) is stored.
    /// This is OS-specific and resolves to a per-user configuration directory.
    pub fn settings_dir() -> PathBuf {
        Self::config_dir()
    }

    /// Full endpoint for one parse request, honoring the cost toggle.
    pub fn parse_url(&self) -> String {
        format!(
            "{}/api/ifc/parse?calculate_costs={}",
            self.backend_url.trim_end_matches('/'),
            self.calculate_costs
        )
    }

    pub(crate) fn default_backend_url() -> String { "http://localhost:8000".to_string() }
    pub(crate) fn default_parse_timeout() -> u64 { 300 }
    pub(crate) fn default_calculate_costs() -> bool { true }
}
