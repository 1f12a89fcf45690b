use crate::error::AppError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SERVICE_NAME: &str = "cloud-meter";
pub const TOKEN_ENV: &str = "CLOUD_METER_LOOKUP_TOKEN";
const TOKEN_ACCOUNT: &str = "lookup:catalog";
const CACHE_FILE_NAME: &str = "instance_types_cache.json";

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("CLOUD_METER_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("com", "cloudmeter", SERVICE_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    let cwd = std::env::current_dir()?;
    Ok(cwd.join(".cloud-meter"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub lookup: LookupSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub architecture: String,
    pub cache_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".into(),
            lookup: LookupSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: None,
            architecture: "x86_64".into(),
            cache_file: None,
        }
    }
}

pub fn config_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("config"))
}

pub fn data_dir() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join("data"))
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn cache_path(config: &AppConfig) -> Result<PathBuf, AppError> {
    match &config.lookup.cache_file {
        Some(path) => Ok(path.clone()),
        None => Ok(data_dir()?.join(CACHE_FILE_NAME)),
    }
}

pub fn ensure_dirs() -> Result<(), AppError> {
    fs::create_dir_all(config_dir()?)?;
    fs::create_dir_all(data_dir()?)?;
    Ok(())
}

fn normalize_optional(value: &mut Option<String>, lowercase: bool) -> bool {
    let Some(current) = value.as_ref() else {
        return false;
    };
    let mut normalized = current.trim().to_string();
    if lowercase {
        normalized = normalized.to_ascii_lowercase();
    }
    let next = (!normalized.is_empty()).then_some(normalized);
    if next != *value {
        *value = next;
        return true;
    }
    false
}

fn normalize_config(config: &mut AppConfig) -> bool {
    let mut changed = false;

    changed |= normalize_optional(&mut config.lookup.endpoint, false);
    changed |= normalize_optional(&mut config.lookup.region, true);

    let arch = config.lookup.architecture.trim().to_ascii_lowercase();
    let arch = if arch.is_empty() {
        LookupSettings::default().architecture
    } else {
        arch
    };
    if arch != config.lookup.architecture {
        config.lookup.architecture = arch;
        changed = true;
    }

    let level = config.log_level.trim().to_ascii_lowercase();
    if level != config.log_level {
        config.log_level = level;
        changed = true;
    }

    changed
}

pub fn load_config() -> Result<AppConfig, AppError> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw_str = fs::read_to_string(&path)?;
    let mut parsed: AppConfig = toml::from_str(&raw_str)?;

    // Persist normalized values so the file matches what the run used.
    if normalize_config(&mut parsed) {
        save_config(&parsed)?;
    }

    Ok(parsed)
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    ensure_dirs()?;
    let path = config_path()?;
    let raw = toml::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

pub fn set_lookup_token(token: &str) -> Result<(), AppError> {
    let entry = keyring::Entry::new(SERVICE_NAME, TOKEN_ACCOUNT)?;
    entry.set_password(token)?;
    Ok(())
}

pub fn delete_lookup_token() -> Result<(), AppError> {
    let entry = keyring::Entry::new(SERVICE_NAME, TOKEN_ACCOUNT)?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(AppError::Keyring(e)),
    }
}

// keyring first, then the environment
pub fn get_lookup_token() -> Result<Option<String>, AppError> {
    let entry = keyring::Entry::new(SERVICE_NAME, TOKEN_ACCOUNT)?;
    match entry.get_password() {
        Ok(value) if !value.is_empty() => return Ok(Some(value)),
        Ok(_) | Err(keyring::Error::NoEntry) => {}
        Err(e) => return Err(AppError::Keyring(e)),
    }

    match std::env::var(TOKEN_ENV) {
        Ok(value) if !value.is_empty() => Ok(Some(value)),
        _ => Ok(None),
    }
}

pub fn ensure_initialized() -> Result<(), AppError> {
    ensure_dirs()?;
    let cfg_path = config_path()?;
    if !Path::new(&cfg_path).exists() {
        save_config(&AppConfig::default())?;
    }
    Ok(())
}
