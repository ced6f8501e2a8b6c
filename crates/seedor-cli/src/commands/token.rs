use anyhow::{anyhow, bail};
use seedor_api::Role;
use seedor_auth::{SessionTokenPayload, TokenCodec};

use crate::pout;

/// Parse a TTL such as `90s`, `30m`, `12h` or `7d` into seconds.
pub fn parse_ttl(ttl: &str) -> anyhow::Result<u64> {
    let s = ttl.trim().to_lowercase();
    let Some(unit) = s.chars().last() else {
        bail!("Invalid TTL: {ttl}");
    };
    let digits = &s[..s.len() - unit.len_utf8()];
    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86_400,
        _ => bail!("Invalid TTL format: {ttl}. Use e.g. '30m', '12h', '7d'"),
    };
    let n: u64 = digits.parse().map_err(|_| anyhow!("Invalid TTL: {ttl}"))?;
    if n == 0 {
        bail!("TTL must be positive: {ttl}");
    }
    n.checked_mul(scale).ok_or_else(|| anyhow!("TTL too large: {ttl}"))
}

pub fn cmd_issue_token(
    codec: &TokenCodec,
    user_id: String,
    tenant_id: String,
    role: Role,
    ttl_secs: u64,
    json: bool,
) -> anyhow::Result<()> {
    let now = codec.now_ms();
    let ttl_ms = i64::try_from(ttl_secs)?.saturating_mul(1000);
    let payload = SessionTokenPayload {
        user_id,
        tenant_id,
        role,
        exp: now.saturating_add(ttl_ms),
        iat: Some(now),
    };
    let token = codec.issue(&payload)?;
    pout(
        json,
        serde_json::json!({ "token": token, "payload": payload }),
        &token,
    )
}

pub fn cmd_inspect_token(codec: &TokenCodec, token: &str, json: bool) -> anyhow::Result<()> {
    let Some(payload) = codec.verify(Some(token)) else {
        bail!("Token is invalid or expired.");
    };
    let remaining_secs = (payload.exp - codec.now_ms()) / 1000;
    pout(
        json,
        serde_json::json!({ "valid": true, "payload": payload, "remaining_secs": remaining_secs }),
        &format!(
            "user={} tenant={} role={} expires_in={}s",
            payload.user_id, payload.tenant_id, payload.role, remaining_secs
        ),
    )
}
