//! Relay configuration: `.env`, optional TOML file, then environment overrides.

use crate::address::AddressNormalizer;
use crate::backend::AuthStore;
use crate::dispatch::MAX_MEDIA_BYTES;
use crate::error::config::ConfigError;
use crate::{
    DEFAULT_ADDRESS_DOMAIN, DEFAULT_BRIDGE_URL, DEFAULT_CLIENT_ID, DEFAULT_COUNTRY_CODE,
    DEFAULT_HTTP_PORT,
};

use common::{ErrorLocation, RedactedToken};

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{LevelFilter, debug, info, warn};
use serde::Deserialize;
use url::Url;

pub const CONFIG_FILE_NAME: &str = "relay.toml";
const CONFIG_PATH_ENV: &str = "RELAY_CONFIG";
const CONFIG_APP_DIR: &str = "wa-relay";

const PORT_ENV: &str = "PORT";
const HOST_ENV: &str = "HOST";
const BRIDGE_URL_ENV: &str = "BRIDGE_URL";
const BRIDGE_TOKEN_ENV: &str = "BRIDGE_TOKEN";
const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";
const SESSION_DIR_ENV: &str = "SESSION_DIR";
const CLIENT_ID_ENV: &str = "CLIENT_ID";
const LOG_DIR_ENV: &str = "LOG_DIR";
const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Room for multipart boundaries, part headers and the text fields around a
/// file at the media size limit.
pub const MULTIPART_HEADROOM_BYTES: u64 = 64 * 1024;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Keep uploaded attachments after the send attempt.
    pub retain_uploads: bool,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: DEFAULT_HTTP_PORT,
            upload_dir: PathBuf::from("uploads"),
            retain_uploads: false,
            max_upload_bytes: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub client_id: String,
    pub data_dir: PathBuf,
    pub headless: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_id: String::from(DEFAULT_CLIENT_ID),
            data_dir: PathBuf::from("sessions"),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    pub country_code: String,
    pub domain: String,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            country_code: String::from(DEFAULT_COUNTRY_CODE),
            domain: String::from(DEFAULT_ADDRESS_DOMAIN),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub url: String,
    pub token: Option<RedactedToken>,
    pub request_timeout_secs: u64,
    pub startup_timeout_secs: u64,
    /// Launch the bridge ourselves with this command; `None` means it runs elsewhere.
    pub command: Option<String>,
    pub args: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: String::from(DEFAULT_BRIDGE_URL),
            token: None,
            request_timeout_secs: 30,
            startup_timeout_secs: 20,
            command: None,
            args: Vec::new(),
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            level: String::from("info"),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.level).unwrap_or(LevelFilter::Info)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub address: AddressConfig,
    pub bridge: BridgeConfig,
    pub logging: LoggingConfig,
}

// ============================================
// IMPLEMENTATION
// ============================================

impl RelayConfig {
    /// Load the full configuration for this process.
    ///
    /// Order: `.env` (optional), TOML file (optional), environment overrides,
    /// then validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file exists but cannot be read or
    /// parsed, an override has the wrong type, or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        try_load_dotenv();

        let mut config = match resolve_config_path() {
            Some(path) => Self::load_from_path(&path)?,
            None => {
                info!("No {CONFIG_FILE_NAME} found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML file without env overrides or validation.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: RelayConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// Apply `PORT`, `HOST`, `BRIDGE_URL` and friends on top of the file values.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = env_value(PORT_ENV) {
            self.server.port = port.parse().map_err(|e| ConfigError::EnvError {
                location: ErrorLocation::from(Location::caller()),
                variable: PORT_ENV.to_string(),
                reason: format!("'{port}' is not a valid port: {e}"),
            })?;
        }

        if let Some(host) = env_value(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(url) = env_value(BRIDGE_URL_ENV) {
            self.bridge.url = url;
        }
        if let Some(token) = env_value(BRIDGE_TOKEN_ENV) {
            self.bridge.token = Some(RedactedToken::new(token));
        }
        if let Some(dir) = env_value(UPLOAD_DIR_ENV) {
            self.server.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_value(SESSION_DIR_ENV) {
            self.session.data_dir = PathBuf::from(dir);
        }
        if let Some(client_id) = env_value(CLIENT_ID_ENV) {
            self.session.client_id = client_id;
        }
        if let Some(dir) = env_value(LOG_DIR_ENV) {
            self.logging.dir = PathBuf::from(dir);
        }
        if let Some(level) = env_value(LOG_LEVEL_ENV) {
            self.logging.level = level;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(validation_error("Server port must be non-zero"));
        }

        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(validation_error(format!(
                "Server host '{}' is not an IP address",
                self.server.host
            )));
        }

        let country_code = &self.address.country_code;
        if country_code.is_empty() || !country_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(validation_error(format!(
                "Country code '{country_code}' must be a non-empty digit string"
            )));
        }

        // A digit in the domain would be swallowed on re-normalization.
        let domain = &self.address.domain;
        if domain.is_empty() || domain.chars().any(|c| c.is_ascii_digit()) {
            return Err(validation_error(format!(
                "Address domain '{domain}' must be non-empty and contain no digits"
            )));
        }

        let min_upload_bytes = MAX_MEDIA_BYTES + MULTIPART_HEADROOM_BYTES;
        if (self.server.max_upload_bytes as u64) < min_upload_bytes {
            return Err(validation_error(format!(
                "Server max_upload_bytes {} must be at least {min_upload_bytes} (media limit plus multipart headroom)",
                self.server.max_upload_bytes
            )));
        }

        if self.session.client_id.trim().is_empty() {
            return Err(validation_error("Session client id cannot be empty"));
        }

        let bridge_url = Url::parse(&self.bridge.url).map_err(|e| {
            validation_error(format!("Bridge URL '{}' is invalid: {e}", self.bridge.url))
        })?;
        if !matches!(bridge_url.scheme(), "http" | "https") {
            return Err(validation_error(format!(
                "Bridge URL '{}' must use http or https",
                self.bridge.url
            )));
        }

        if self.bridge.request_timeout_secs == 0 || self.bridge.startup_timeout_secs == 0 {
            return Err(validation_error("Bridge timeouts must be non-zero"));
        }

        if LevelFilter::from_str(&self.logging.level).is_err() {
            return Err(validation_error(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Address the HTTP server binds to. Call after [`validate`](Self::validate).
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = self
            .server
            .host
            .parse::<IpAddr>()
            .unwrap_or(IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.server.port)
    }

    pub fn auth_store(&self) -> AuthStore {
        AuthStore {
            client_id: self.session.client_id.clone(),
            data_path: self.session.data_dir.clone(),
            headless: self.session.headless,
        }
    }

    pub fn normalizer(&self) -> AddressNormalizer {
        AddressNormalizer::new(&self.address.country_code, &self.address.domain)
    }
}

#[track_caller]
fn validation_error(reason: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: reason.into(),
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// `RELAY_CONFIG`, then `./relay.toml`, then the user config dir.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(path) = env_value(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if !path.exists() {
            warn!(
                "{CONFIG_PATH_ENV} points at missing file {}",
                path.display()
            );
        }
        return Some(path);
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_APP_DIR).join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Load `.env` from the working directory, else next to the executable. Missing is fine.
fn try_load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {}", path.display());
        return;
    }

    let Some(exe_dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    else {
        return;
    };

    let env_path = exe_dir.join(".env");
    if !env_path.exists() {
        debug!("No .env file found - using process environment only");
        return;
    }

    match dotenvy::from_path(&env_path) {
        Ok(()) => info!("Loaded .env from: {}", env_path.display()),
        Err(e) => warn!("Failed to parse .env at {}: {e}", env_path.display()),
    }
}
