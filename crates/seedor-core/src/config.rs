use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use seedor_api::SeedorError;
use serde::{Deserialize, Serialize};

/// Fallback signing secret for local development. Never deploy with it.
pub const DEFAULT_SESSION_SECRET: &str = "local-dev-session-secret-change-me";
pub const DEFAULT_COOKIE_NAME: &str = "seedor_session";
pub const DEFAULT_SESSION_MAX_AGE_SECONDS: u64 = 60 * 60 * 24 * 7;
/// 400 days, the longest `Max-Age` browsers honour.
pub const MAX_SESSION_MAX_AGE_SECONDS: u64 = 60 * 60 * 24 * 400;

const CONFIG_FILE: &str = "seedor.toml";

/// The HMAC key used to sign session tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret(String);

impl SessionSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = SeedorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(SeedorError::Validation(format!(
                "unknown environment {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub session_secret: SessionSecret,
    pub cookie_name: String,
    pub session_max_age_seconds: u64,
    pub environment: Environment,
    /// Where unauthenticated page requests are sent.
    pub login_path: String,
    /// Where authenticated page requests lacking the required role are sent.
    pub home_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: SessionSecret::new(DEFAULT_SESSION_SECRET),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            session_max_age_seconds: DEFAULT_SESSION_MAX_AGE_SECONDS,
            environment: Environment::Development,
            login_path: "/login".to_string(),
            home_path: "/dashboard".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfigFile {
    #[serde(default)]
    auth: RawAuth,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuth {
    session_secret: Option<String>,
    cookie_name: Option<String>,
    session_max_age_seconds: Option<u64>,
    environment: Option<Environment>,
    login_path: Option<String>,
    home_path: Option<String>,
}

/// True if `name` can be sent as a cookie name in a `Set-Cookie` header.
pub fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, ';' | ',' | '='))
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("seedor"))
        .unwrap_or_else(|| PathBuf::from(".seedor"))
}

impl AuthConfig {
    /// Defaults, then `seedor.toml` in `dir` if present, then the process environment.
    pub fn load(dir: &Path) -> Result<Self, SeedorError> {
        let cfg = Self::from_dir(dir)?.with_overrides(|key| std::env::var(key).ok())?;
        if cfg.is_production_like() && cfg.uses_default_secret() {
            tracing::warn!(
                environment = cfg.environment.as_str(),
                "SESSION_SECRET is not set; session tokens are signed with the development fallback"
            );
        }
        Ok(cfg)
    }

    /// Defaults, then `seedor.toml` in `dir` if present. The environment is not consulted.
    pub fn from_dir(dir: &Path) -> Result<Self, SeedorError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| {
            SeedorError::NotFound(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            SeedorError::Validation(msg) => {
                SeedorError::Validation(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SeedorError> {
        let raw: RawConfigFile = toml::from_str(content)
            .map_err(|e| SeedorError::Validation(format!("invalid TOML: {e}")))?;
        let auth = raw.auth;
        let defaults = Self::default();

        let cfg = Self {
            session_secret: auth
                .session_secret
                .map_or(defaults.session_secret, SessionSecret::new),
            cookie_name: auth.cookie_name.unwrap_or(defaults.cookie_name),
            session_max_age_seconds: auth
                .session_max_age_seconds
                .unwrap_or(defaults.session_max_age_seconds),
            environment: auth.environment.unwrap_or(defaults.environment),
            login_path: auth.login_path.unwrap_or(defaults.login_path),
            home_path: auth.home_path.unwrap_or(defaults.home_path),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `SESSION_SECRET`, `SEEDOR_COOKIE_NAME`, `SEEDOR_SESSION_MAX_AGE` and `SEEDOR_ENV`.
    ///
    /// Empty values are ignored so an exported-but-blank variable falls back like an unset one.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, SeedorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(secret) = get("SESSION_SECRET") {
            self.session_secret = SessionSecret::new(secret);
        }
        if let Some(name) = get("SEEDOR_COOKIE_NAME") {
            self.cookie_name = name.trim().to_string();
        }
        if let Some(max_age) = get("SEEDOR_SESSION_MAX_AGE") {
            self.session_max_age_seconds = max_age.trim().parse().map_err(|_| {
                SeedorError::Validation(format!("SEEDOR_SESSION_MAX_AGE is not a number: {max_age}"))
            })?;
        }
        if let Some(env) = get("SEEDOR_ENV") {
            self.environment = env.parse()?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SeedorError> {
        if self.session_secret.is_empty() {
            return Err(SeedorError::Validation(
                "session_secret must not be empty".to_string(),
            ));
        }
        if !is_valid_cookie_name(&self.cookie_name) {
            return Err(SeedorError::Validation(format!(
                "invalid cookie name {:?}",
                self.cookie_name
            )));
        }
        if self.session_max_age_seconds == 0 {
            return Err(SeedorError::Validation(
                "session_max_age_seconds must be positive".to_string(),
            ));
        }
        if self.session_max_age_seconds > MAX_SESSION_MAX_AGE_SECONDS {
            return Err(SeedorError::Validation(format!(
                "session_max_age_seconds must be at most {MAX_SESSION_MAX_AGE_SECONDS}, got {}",
                self.session_max_age_seconds
            )));
        }
        for (key, path) in [("login_path", &self.login_path), ("home_path", &self.home_path)] {
            if !path.starts_with('/') {
                return Err(SeedorError::Validation(format!(
                    "{key} must be an absolute path, got {path}"
                )));
            }
        }
        Ok(())
    }

    pub fn is_production_like(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn uses_default_secret(&self) -> bool {
        self.session_secret.expose() == DEFAULT_SESSION_SECRET
    }

    pub fn session_max_age_ms(&self) -> i64 {
        i64::try_from(self.session_max_age_seconds)
            .unwrap_or(i64::MAX / 1000)
            .saturating_mul(1000)
    }
}
