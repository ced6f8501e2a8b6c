use anyhow::{Context, bail};
use seedor_auth::{hash_password, verify_password};

use crate::pout;

/// Use `--password` when given, otherwise prompt without echo.
pub fn read_password(given: Option<String>, prompt: &str) -> anyhow::Result<String> {
    match given {
        Some(p) => Ok(p),
        None => rpassword::prompt_password(prompt).context("failed to read password"),
    }
}

pub fn cmd_hash_password(password: Option<String>, json: bool) -> anyhow::Result<()> {
    let password = read_password(password, "Password: ")?;
    if password.trim().is_empty() {
        bail!("Password must not be empty.");
    }
    let stored = hash_password(password.trim())?;
    pout(json, serde_json::json!({ "hash": stored }), &stored)
}

pub fn cmd_verify_password(hash: &str, password: Option<String>, json: bool) -> anyhow::Result<()> {
    let password = read_password(password, "Password: ")?;
    let ok = verify_password(password.trim(), hash);
    pout(
        json,
        serde_json::json!({ "match": ok }),
        if ok { "Password matches" } else { "Password does not match" },
    )?;
    if !ok {
        bail!("verification failed");
    }
    Ok(())
}
