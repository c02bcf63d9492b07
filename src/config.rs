use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub tokens: TokenConfig,

    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// `text` or `json`
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/helpdesk.db".to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on auth and session cookies.
    /// Off by default so the service works over plain HTTP during development.
    pub secure_cookies: bool,

    /// Whether a `?token=` query parameter or `token` form field is accepted
    /// as a credential source.
    /// WARNING: tokens in URLs can leak via browser history, logs, and referrers.
    pub allow_token_in_query: bool,

    /// Native session inactivity expiry.
    pub session_inactivity_minutes: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
            secure_cookies: false,
            allow_token_in_query: true,
            session_inactivity_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime of a freshly issued or refreshed token.
    pub lifetime_days: u32,

    /// Tokens unused for this many days are removed by the idle sweep.
    pub idle_days: u32,

    /// Revoke every earlier token of a user when they log in again.
    pub single_session: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            lifetime_days: 7,
            idle_days: 30,
            single_session: true,
        }
    }
}

impl TokenConfig {
    #[must_use]
    pub fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.lifetime_days))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    pub login_throttle: ThrottleConfig,

    pub signup_throttle: ThrottleConfig,

    /// Proxy addresses allowed to supply `X-Forwarded-For`.
    ///
    /// When empty, forwarded headers are ignored for rate-limiting identity and
    /// the socket peer address is used.
    pub trusted_proxy_ips: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            login_throttle: ThrottleConfig {
                max_attempts: 5,
                window_seconds: 15 * 60,
            },
            signup_throttle: ThrottleConfig {
                max_attempts: 3,
                window_seconds: 30 * 60,
            },
            trusted_proxy_ips: Vec::new(),
        }
    }
}

impl SecurityConfig {
    /// Parsed trusted proxy list. Entries that fail to parse are skipped;
    /// `Config::validate` rejects them up front.
    #[must_use]
    pub fn trusted_proxies(&self) -> Vec<IpAddr> {
        self.trusted_proxy_ips
            .iter()
            .filter_map(|ip| ip.trim().parse().ok())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Failed attempts tolerated inside the window before requests are refused.
    pub max_attempts: u32,

    /// Sliding window; every failure pushes the expiry out again.
    pub window_seconds: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("helpdesk").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".helpdesk").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tokens.lifetime_days == 0 {
            anyhow::bail!("tokens.lifetime_days must be > 0");
        }

        for (name, throttle) in [
            ("login_throttle", &self.security.login_throttle),
            ("signup_throttle", &self.security.signup_throttle),
        ] {
            if throttle.max_attempts == 0 {
                anyhow::bail!("security.{name}.max_attempts must be > 0");
            }
            if throttle.window_seconds == 0 {
                anyhow::bail!("security.{name}.window_seconds must be > 0");
            }
        }

        for ip in &self.security.trusted_proxy_ips {
            ip.trim()
                .parse::<IpAddr>()
                .with_context(|| format!("Invalid trusted proxy IP: {ip}"))?;
        }

        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            anyhow::bail!(
                "general.log_format must be 'text' or 'json', got '{}'",
                self.general.log_format
            );
        }

        Ok(())
    }
}
