mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use seedor_api::{Role, SystemClock};
use seedor_auth::TokenCodec;
use seedor_core::{AuthConfig, default_config_dir};
use tracing_subscriber::EnvFilter;

use crate::commands::{password, session, token};

#[derive(Debug, Parser)]
#[command(name = "seedor", about = "Seedor session tooling: passwords, tokens, cookies")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding seedor.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Hash a password into the stored `salt:hash` form
    HashPassword {
        /// Read from the terminal when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Check a password against a stored hash
    VerifyPassword {
        #[arg(long)]
        hash: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign a session token
    IssueToken {
        #[arg(long = "user")]
        user_id: String,
        #[arg(long = "tenant")]
        tenant_id: String,
        #[arg(long)]
        role: Role,
        /// Lifetime (e.g. "30m", "12h", "7d"). Default: configured session max age
        #[arg(long)]
        ttl: Option<String>,
    },
    /// Verify a token and print its claims
    InspectToken { token: String },
    /// Log in against a users.toml fixture and print the session cookie
    Login {
        #[arg(long)]
        users: PathBuf,
        #[arg(long)]
        email: String,
        #[arg(long = "tenant")]
        tenant_id: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Resolve a token against a users.toml fixture
    Resolve {
        #[arg(long)]
        users: PathBuf,
        token: String,
    },
    /// Show the effective configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    let cfg = AuthConfig::load(&cfg_dir)?;
    tracing::debug!(
        config_dir = %cfg_dir.display(),
        environment = cfg.environment.as_str(),
        "configuration loaded"
    );

    match cli.command {
        Commands::HashPassword { password: given } => {
            password::cmd_hash_password(given, cli.json)?;
        }
        Commands::VerifyPassword { hash, password: given } => {
            password::cmd_verify_password(&hash, given, cli.json)?;
        }
        Commands::IssueToken {
            user_id,
            tenant_id,
            role,
            ttl,
        } => {
            let ttl_secs = match ttl {
                Some(t) => token::parse_ttl(&t)?,
                None => cfg.session_max_age_seconds,
            };
            let codec = TokenCodec::new(&cfg.session_secret, Arc::new(SystemClock))?;
            token::cmd_issue_token(&codec, user_id, tenant_id, role, ttl_secs, cli.json)?;
        }
        Commands::InspectToken { token: raw } => {
            let codec = TokenCodec::new(&cfg.session_secret, Arc::new(SystemClock))?;
            token::cmd_inspect_token(&codec, &raw, cli.json)?;
        }
        Commands::Login {
            users,
            email,
            tenant_id,
            password: given,
        } => {
            let pw = password::read_password(given, "Password: ")?;
            session::cmd_login(&cfg, &users, email, pw, tenant_id, cli.json).await?;
        }
        Commands::Resolve { users, token: raw } => {
            session::cmd_resolve(&cfg, &users, &raw, cli.json).await?;
        }
        Commands::Config => {
            let value = serde_json::json!({
                "config_dir": cfg_dir,
                "cookie_name": cfg.cookie_name,
                "session_max_age_seconds": cfg.session_max_age_seconds,
                "environment": cfg.environment,
                "login_path": cfg.login_path,
                "home_path": cfg.home_path,
                "session_secret": if cfg.uses_default_secret() { "<development default>" } else { "<set>" },
            });
            let text = format!(
                "environment={} cookie={} max_age={}s secret={}",
                cfg.environment.as_str(),
                cfg.cookie_name,
                cfg.session_max_age_seconds,
                if cfg.uses_default_secret() { "development default" } else { "set" },
            );
            pout(cli.json, value, &text)?;
        }
    }

    Ok(())
}

pub fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}
