use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::accounts::{AccountSettings, DEFAULT_MAX_CHECKS, DEFAULT_TOKEN_TTL};
use crate::monitoring::scheduler::DEFAULT_SWEEP_INTERVAL;
use crate::notify::SmsSettings;

/// One year.
const MAX_TOKEN_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config: {0}")]
    ReadFailed(#[source] io::Error),
    #[error("Failed to write config: {0}")]
    WriteFailed(#[source] io::Error),
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("Neither XDG_CONFIG_HOME nor a home directory is available")]
    ConfigPathUnavailable,
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub store: Store,
    pub scheduler: Scheduler,
    pub accounts: Accounts,
    pub logging: Logging,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms: Option<SmsSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Store {
    pub data_dir: path::PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub interval_seconds: u64,
    pub dedupe_in_flight: bool,
}

/// Settings for the account operations. The worker itself does not serve
/// them; they are handed to `Accounts` by an embedding request layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Accounts {
    pub max_checks: usize,
    pub hashing_secret: String,
    pub token_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// `compact` or `json`
    pub format: String,
}

impl Default for Store {
    fn default() -> Self {
        Self { data_dir: path::PathBuf::from(".data") }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { interval_seconds: DEFAULT_SWEEP_INTERVAL.as_secs(), dedupe_in_flight: true }
    }
}

impl Default for Accounts {
    fn default() -> Self {
        Self {
            max_checks: DEFAULT_MAX_CHECKS,
            hashing_secret: "thisIsASecret".into(),
            token_ttl_seconds: DEFAULT_TOKEN_TTL.as_secs(),
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self { format: "compact".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/checks.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/checks.toml"))
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "********" }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Environment")?;
        write_1(f, "Name", &self.environment)?;
        write_title_1(f, "Store")?;
        write_1(f, "Data Directory", &self.store.data_dir.display())?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Interval (s)", &self.scheduler.interval_seconds)?;
        write_1(f, "Dedupe In-Flight", &self.scheduler.dedupe_in_flight)?;
        write_title_1(f, "Accounts")?;
        write_1(f, "Max Checks", &self.accounts.max_checks)?;
        write_1(f, "Hashing Secret", &mask(&self.accounts.hashing_secret))?;
        write_1(f, "Token TTL (s)", &self.accounts.token_ttl_seconds)?;
        write_title_1(f, "Logging")?;
        write_1(f, "Format", &self.logging.format)?;
        write_title_1(f, "SMS")?;
        match &self.sms {
            Some(sms) => {
                write_1(f, "Account SID", &sms.account_sid)?;
                write_1(f, "Auth Token", &mask(&sms.auth_token))?;
                write_1(f, "From", &sms.from_phone)?;
            }
            None => write_1(f, "Delivery", &"log only")?,
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/checks.toml
    ///  or the specified path, with the name checks.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        std::fs::write(path, config_str).map_err(Error::WriteFailed)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.scheduler.interval_seconds == 0 {
            return Err(Error::Invalid("scheduler.interval_seconds must be positive".into()));
        }
        if self.accounts.hashing_secret.is_empty() {
            return Err(Error::Invalid("accounts.hashing_secret must not be empty".into()));
        }
        if !(1..=MAX_TOKEN_TTL_SECONDS).contains(&self.accounts.token_ttl_seconds) {
            return Err(Error::Invalid(format!(
                "accounts.token_ttl_seconds must be between 1 and {MAX_TOKEN_TTL_SECONDS}"
            )));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_seconds)
    }

    pub fn account_settings(&self) -> AccountSettings {
        AccountSettings {
            max_checks: self.accounts.max_checks,
            token_ttl: Duration::from_secs(self.accounts.token_ttl_seconds),
        }
    }
}
