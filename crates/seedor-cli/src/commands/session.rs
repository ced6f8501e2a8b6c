use std::path::Path;
use std::sync::Arc;

use anyhow::bail;
use seedor_api::SystemClock;
use seedor_auth::{Authenticator, LoginError, LoginRequest, SessionResolver};
use seedor_core::{AuthConfig, load_users_from_file};

use crate::pout;

pub async fn cmd_login(
    cfg: &AuthConfig,
    users: &Path,
    email: String,
    password: String,
    tenant_id: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let store = Arc::new(load_users_from_file(users)?);
    let auth = Authenticator::from_config(store, cfg, Arc::new(SystemClock))?;

    let outcome = match auth
        .login(LoginRequest {
            email,
            password,
            tenant_id,
        })
        .await
    {
        Ok(o) => o,
        Err(LoginError::TenantSelectionRequired(ids)) => {
            bail!(
                "User belongs to several tenants; pass --tenant with one of: {}",
                ids.join(", ")
            )
        }
        Err(e) => bail!("Login failed ({}): {e}", e.status_code()),
    };

    pout(
        json,
        serde_json::json!({
            "session": outcome.session,
            "token": outcome.token,
            "expires_at": outcome.expires_at,
            "set_cookie": outcome.set_cookie,
        }),
        &format!("Set-Cookie: {}", outcome.set_cookie),
    )
}

pub async fn cmd_resolve(cfg: &AuthConfig, users: &Path, token: &str, json: bool) -> anyhow::Result<()> {
    let store = Arc::new(load_users_from_file(users)?);
    let resolver = SessionResolver::from_config(store, cfg, Arc::new(SystemClock))?;

    match resolver.resolve(Some(token)).await? {
        Some(session) => pout(
            json,
            serde_json::json!({ "authenticated": true, "session": session }),
            &format!(
                "{} {} <{}> tenant={} role={}",
                session.first_name, session.last_name, session.email, session.tenant_id, session.role
            ),
        ),
        None => {
            pout(json, serde_json::json!({ "authenticated": false }), "Not authenticated")?;
            bail!("no session")
        }
    }
}
