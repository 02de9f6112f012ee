use std::{fs, io::ErrorKind, path::Path};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::NodeKind;

pub const CONFIG_FILE: &str = "node_sim.toml";
const ENV_PREFIX: &str = "NODE_SIM__";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind_addr: String,
    pub role: NodeKind,
    /// Ambient reading reported by `/sensors` while the heater is off.
    pub temperature: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            role: NodeKind::Mechanical,
            temperature: 25.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    bind_addr: Option<String>,
    role: Option<String>,
    temperature: Option<f64>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

/// File values override defaults; `NODE_SIM__*` variables override the file.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
            if let Some(v) = file_cfg.bind_addr {
                settings.bind_addr = v;
            }
            if let Some(v) = file_cfg.role {
                settings.role = v.parse()?;
            }
            if let Some(v) = file_cfg.temperature {
                settings.temperature = v;
            }
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    if let Some(v) = env(&format!("{ENV_PREFIX}BIND_ADDR")) {
        settings.bind_addr = v;
    }
    if let Some(v) = env(&format!("{ENV_PREFIX}ROLE")) {
        settings.role = v.parse()?;
    }
    if let Some(v) = env(&format!("{ENV_PREFIX}TEMPERATURE")) {
        settings.temperature = v
            .trim()
            .parse()
            .with_context(|| format!("{ENV_PREFIX}TEMPERATURE is not a number: '{v}'"))?;
    }

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
