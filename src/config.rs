//! Configuration management for the roombook console

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Result, RoombookError};
use crate::notify::{NotificationPermission, PermissionSource};
use crate::scheduler::DEFAULT_POLL_INTERVAL;
use crate::ui::UI;
use crate::ConfigCommand;

const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

/// User preferences persisted in `config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub endpoint: String,
    pub timeout: u64,
    pub storage_dir: PathBuf,
    /// Upper bound between reminder scans
    pub poll_interval_secs: u64,
    /// How long a terminal reminder banner stays up
    pub banner_secs: u64,
    pub notification_permission: NotificationPermission,
    pub notifier_path: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: 30,
            storage_dir: default_storage_dir(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            banner_secs: 4,
            notification_permission: NotificationPermission::Default,
            notifier_path: None,
        }
    }
}

impl ConsoleConfig {
    /// Load the config file, writing defaults when it is missing or unreadable.
    pub async fn load(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path).await.map_err(|e| {
                RoombookError::io_from_error(
                    format!("Failed to read {}", config_path.display()),
                    e,
                )
            })?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    warn!("Replacing unreadable config {}: {}", config_path.display(), e);
                    let config = Self::default();
                    config.save(config_path).await?;
                    Ok(config)
                }
            }
        } else {
            let config = Self::default();
            config.save(config_path).await?;
            Ok(config)
        }
    }

    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content).await?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn banner_duration(&self) -> Duration {
        Duration::from_secs(self.banner_secs.max(1))
    }

    /// HTTP client settings. An optional `client.toml` next to the config
    /// file, then `ROOMBOOK_*` environment variables, override the values
    /// stored here.
    pub fn to_client_config(&self) -> Result<ClientConfig> {
        let use_proxy = !self.endpoint.contains("localhost") && !self.endpoint.contains("127.0.0.1");

        ClientConfigBuilder::new()
            .base_url(&self.endpoint)
            .timeout(self.timeout)
            .use_proxy(use_proxy)
            .config_file(default_config_dir().join("client.toml"))
            .build()
    }
}

/// Reads the permission decision back from `config.json`
///
/// Runs on the scheduler's thread between scans, so it reads synchronously
/// and never rewrites the file.
#[derive(Debug, Clone)]
pub struct ConfigPermission {
    config_path: PathBuf,
}

impl ConfigPermission {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }
}

impl PermissionSource for ConfigPermission {
    fn current(&self) -> Option<NotificationPermission> {
        let content = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(e) => {
                debug!("Could not re-read {}: {}", self.config_path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<ConsoleConfig>(&content) {
            Ok(config) => Some(config.notification_permission),
            Err(e) => {
                debug!("Ignoring unreadable {}: {}", self.config_path.display(), e);
                None
            }
        }
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roombook")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roombook")
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,
}

fn default_timeout() -> u64 {
    30
}

fn default_use_proxy() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENDPOINT.to_string(),
            timeout: default_timeout(),
            use_proxy: default_use_proxy(),
        }
    }
}

/// Builder for ClientConfig
///
/// Values given here are defaults: an optional config file and then
/// `ROOMBOOK_*` environment variables are layered on top.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Option<u64>,
    use_proxy: Option<bool>,
    config_file: Option<PathBuf>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn use_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = Some(use_proxy);
        self
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let defaults = ClientConfig::default();
        let mut builder = Config::builder()
            .set_default("base_url", self.base_url.unwrap_or(defaults.base_url))?
            .set_default("timeout", self.timeout.unwrap_or(defaults.timeout))?
            .set_default("use_proxy", self.use_proxy.unwrap_or(defaults.use_proxy))?;

        if let Some(config_path) = &self.config_file {
            if config_path.exists() {
                builder = builder.add_source(File::from(config_path.as_path()));
            }
        }
        builder = builder.add_source(Environment::with_prefix("ROOMBOOK").try_parsing(true));

        let config: ClientConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(RoombookError::invalid_endpoint(
                "API base URL is empty. Set it with 'roombook config set-endpoint <URL>' or ROOMBOOK_BASE_URL.",
            ));
        }
        Ok(())
    }

    /// Join the base URL and an API path such as `/api/salas`.
    pub fn endpoint_url(&self, path: &str) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        let base = self.base_url.trim().trim_end_matches('/');
        let base = if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("https://{}", base)
        };

        format!("{}/{}", base, path)
    }
}

/// Handles the `config` subcommand
pub struct ConfigService {
    config: ConsoleConfig,
    config_path: PathBuf,
    ui: UI,
}

impl ConfigService {
    pub fn new(config: ConsoleConfig, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            ui: UI::new(),
        }
    }

    pub async fn handle_config(&mut self, command: ConfigCommand) -> Result<()> {
        match command {
            ConfigCommand::Show => {
                self.show();
                Ok(())
            }
            ConfigCommand::SetEndpoint { url } => {
                let trimmed = url.trim().trim_end_matches('/').to_string();
                if trimmed.is_empty() {
                    return Err(RoombookError::invalid_endpoint("Endpoint cannot be empty"));
                }
                self.config.endpoint = trimmed;
                self.save_and_report("Endpoint updated").await
            }
            ConfigCommand::SetInterval { seconds } => {
                if seconds == 0 {
                    return Err(RoombookError::validation_field(
                        "Interval must be at least one second",
                        "seconds",
                    ));
                }
                self.config.poll_interval_secs = seconds;
                self.save_and_report("Reminder poll interval updated").await
            }
            ConfigCommand::SetTimeout { seconds } => {
                self.config.timeout = seconds;
                self.save_and_report("Request timeout updated").await
            }
            ConfigCommand::SetPermission { permission } => {
                self.config.notification_permission = permission;
                self.save_and_report("Notification permission updated").await
            }
            ConfigCommand::Reset => {
                self.config = ConsoleConfig::default();
                self.save_and_report("Configuration reset to defaults").await
            }
        }
    }

    fn show(&self) {
        let config = &self.config;
        self.ui.card(
            "Configuration",
            vec![
                ("Endpoint", config.endpoint.clone()),
                ("Timeout", format!("{}s", config.timeout)),
                ("Storage", config.storage_dir.display().to_string()),
                ("Reminder scan", format!("every {}s", config.poll_interval_secs)),
                ("Banner", format!("{}s", config.banner_secs)),
                ("Notifications", config.notification_permission.to_string()),
                (
                    "Notifier",
                    self.ui.format_user_field(
                        config
                            .notifier_path
                            .as_ref()
                            .map(|path| path.display().to_string()),
                    ),
                ),
                ("Config file", self.config_path.display().to_string()),
            ],
        );
    }

    async fn save_and_report(&self, message: &str) -> Result<()> {
        self.config.save(&self.config_path).await?;
        self.ui.success(message);
        Ok(())
    }
}
