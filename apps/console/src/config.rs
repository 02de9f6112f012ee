use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context};
use clap::ValueEnum;
use console_core::{
    device::{DEFAULT_MECHANICAL_URL, DEFAULT_MIXER_URL, MAX_REQUEST_TIMEOUT},
    session::DEFAULT_POLL_INTERVAL,
    Credential, Endpoints, SessionOptions,
};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "console.toml";
const ENV_PREFIX: &str = "CONSOLE__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON over HTTP to the two controller nodes.
    Http,
    /// In-process simulated machine.
    Fake,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Backend::Http),
            "fake" => Ok(Backend::Fake),
            other => bail!("unknown backend '{other}' (expected http or fake)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend: Backend,
    pub mechanical_url: String,
    pub mixer_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub database_url: String,
    pub operators: Vec<Credential>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Http,
            mechanical_url: DEFAULT_MECHANICAL_URL.into(),
            mixer_url: DEFAULT_MIXER_URL.into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            request_timeout_ms: MAX_REQUEST_TIMEOUT.as_millis() as u64,
            database_url: "sqlite://./data/console.db".into(),
            operators: vec![Credential::bench_operator()],
        }
    }
}

impl Settings {
    pub fn session_options(&self) -> anyhow::Result<SessionOptions> {
        let endpoints = Endpoints::parse(&self.mechanical_url, &self.mixer_url)
            .context("invalid controller node url")?;
        Ok(SessionOptions::new(endpoints)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_request_timeout(self.request_timeout()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms).min(MAX_REQUEST_TIMEOUT)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    backend: Option<Backend>,
    mechanical_url: Option<String>,
    mixer_url: Option<String>,
    poll_interval_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    database_url: Option<String>,
    operators: Option<Vec<Credential>>,
}

pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = path.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf);
    load_settings_from(&path, |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file if present, then `CONSOLE__*` variables.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
            if let Some(v) = file_cfg.backend {
                settings.backend = v;
            }
            if let Some(v) = file_cfg.mechanical_url {
                settings.mechanical_url = v;
            }
            if let Some(v) = file_cfg.mixer_url {
                settings.mixer_url = v;
            }
            if let Some(v) = file_cfg.poll_interval_ms {
                settings.poll_interval_ms = v;
            }
            if let Some(v) = file_cfg.request_timeout_ms {
                settings.request_timeout_ms = v;
            }
            if let Some(v) = file_cfg.database_url {
                settings.database_url = v;
            }
            if let Some(v) = file_cfg.operators {
                settings.operators = v;
            }
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    let var = |name: &str| env(&format!("{ENV_PREFIX}{name}"));
    if let Some(v) = var("BACKEND") {
        settings.backend = v.parse()?;
    }
    if let Some(v) = var("MECHANICAL_URL") {
        settings.mechanical_url = v;
    }
    if let Some(v) = var("MIXER_URL") {
        settings.mixer_url = v;
    }
    if let Some(v) = var("POLL_INTERVAL_MS") {
        settings.poll_interval_ms = parse_millis("POLL_INTERVAL_MS", &v)?;
    }
    if let Some(v) = var("REQUEST_TIMEOUT_MS") {
        settings.request_timeout_ms = parse_millis("REQUEST_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }

    if settings.poll_interval_ms == 0 {
        bail!("poll_interval_ms must be greater than zero");
    }
    if settings.request_timeout_ms == 0 {
        bail!("request_timeout_ms must be greater than zero");
    }
    settings.request_timeout_ms = settings
        .request_timeout_ms
        .min(MAX_REQUEST_TIMEOUT.as_millis() as u64);

    Ok(settings)
}

fn parse_millis(name: &str, raw: &str) -> anyhow::Result<u64> {
    raw.trim()
        .parse()
        .with_context(|| format!("{ENV_PREFIX}{name} is not a whole number of milliseconds: '{raw}'"))
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite:{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
