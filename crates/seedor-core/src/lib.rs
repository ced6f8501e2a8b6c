mod config;
mod memory;

pub use config::{
    AuthConfig, DEFAULT_COOKIE_NAME, DEFAULT_SESSION_MAX_AGE_SECONDS, DEFAULT_SESSION_SECRET,
    Environment, MAX_SESSION_MAX_AGE_SECONDS, SessionSecret, default_config_dir,
    is_valid_cookie_name,
};
pub use memory::{MemoryStore, load_users_from_file, parse_users_toml};
