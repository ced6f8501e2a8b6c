//! Cookie helpers.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use httpdate::fmt_http_date;
use seedor_api::CookieSource;
use seedor_core::{AuthConfig, MAX_SESSION_MAX_AGE_SECONDS, is_valid_cookie_name};

use crate::{Error, Result};

/// SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// SameSite=Strict
    Strict,
    /// SameSite=Lax
    Lax,
    /// SameSite=None
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Options used to build the session cookie.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    /// Cookie name.
    pub name: String,

    /// Cookie path.
    pub path: String,

    /// Optional cookie domain.
    pub domain: Option<String>,

    /// Send on HTTPS only.
    pub secure: bool,

    /// Not accessible to JS.
    pub http_only: bool,

    /// SameSite attribute.
    pub same_site: SameSite,

    /// Max-Age in seconds.
    pub max_age_seconds: Option<u64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self::session(&AuthConfig::default())
    }
}

impl CookieOptions {
    /// The session cookie: HttpOnly, SameSite=Lax, `Path=/`, fixed Max-Age, and
    /// Secure only outside development.
    pub fn session(cfg: &AuthConfig) -> Self {
        Self {
            name: cfg.cookie_name.clone(),
            path: "/".to_string(),
            domain: None,
            secure: cfg.is_production_like(),
            http_only: true,
            same_site: SameSite::Lax,
            max_age_seconds: Some(cfg.session_max_age_seconds),
        }
    }
}

// 9999-12-31T23:59:59Z, the last instant an HTTP date can express.
const LAST_HTTP_DATE_SECS: u64 = 253_402_300_799;

fn check_name(name: &str) -> Result<()> {
    if !is_valid_cookie_name(name) {
        return Err(Error::Cookie(format!("bad cookie name {name:?}")));
    }
    Ok(())
}

fn check_value(value: &str) -> Result<()> {
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, ';' | ',' | '"' | '\\'))
    {
        return Err(Error::Cookie("cookie value contains a reserved character".to_string()));
    }
    Ok(())
}

fn attributes(parts: &mut Vec<String>, opts: &CookieOptions) {
    parts.push(format!("Path={}", opts.path));

    if let Some(domain) = &opts.domain {
        parts.push(format!("Domain={domain}"));
    }

    if opts.secure {
        parts.push("Secure".to_string());
    }
    if opts.http_only {
        parts.push("HttpOnly".to_string());
    }

    parts.push(format!("SameSite={}", opts.same_site.as_str()));
}

/// Build a `Set-Cookie` header value.
///
/// `now_ms` anchors `Expires`; pass the same clock reading used for the token's `exp`.
pub fn build_set_cookie(value: &str, opts: &CookieOptions, now_ms: i64) -> Result<String> {
    check_name(&opts.name)?;
    check_value(value)?;

    let mut parts: Vec<String> = vec![format!("{}={value}", opts.name)];
    attributes(&mut parts, opts);

    if let Some(max_age) = opts.max_age_seconds {
        if max_age > MAX_SESSION_MAX_AGE_SECONDS {
            return Err(Error::Cookie(format!(
                "Max-Age {max_age} exceeds {MAX_SESSION_MAX_AGE_SECONDS}"
            )));
        }
        parts.push(format!("Max-Age={max_age}"));
        // Expires for older clients.
        let expires = expires_at(now_ms, max_age)?;
        parts.push(format!("Expires={}", fmt_http_date(expires)));
    }

    Ok(parts.join("; "))
}

fn expires_at(now_ms: i64, max_age: u64) -> Result<SystemTime> {
    let secs = u64::try_from(now_ms)
        .ok()
        .and_then(|ms| (ms / 1000).checked_add(max_age))
        .filter(|secs| *secs <= LAST_HTTP_DATE_SECS)
        .ok_or_else(|| Error::Cookie(format!("no HTTP date for {now_ms} ms + {max_age} s")))?;
    Ok(UNIX_EPOCH + Duration::from_secs(secs))
}

/// Build a `Set-Cookie` header value that clears the cookie.
pub fn build_clear_cookie(opts: &CookieOptions) -> Result<String> {
    check_name(&opts.name)?;

    let mut parts: Vec<String> = vec![format!("{}=", opts.name)];
    attributes(&mut parts, opts);
    parts.push("Max-Age=0".to_string());
    parts.push(format!("Expires={}", fmt_http_date(UNIX_EPOCH)));

    Ok(parts.join("; "))
}

/// Cookies parsed from a request's `Cookie` header.
///
/// When a name repeats, the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieHeader {
    cookies: BTreeMap<String, String>,
}

impl CookieHeader {
    /// Parse `name=value; name2=value2`. Pairs without `=` are skipped.
    pub fn parse(header: &str) -> Self {
        let mut cookies = BTreeMap::new();
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            cookies
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
        Self { cookies }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

impl CookieSource for CookieHeader {
    fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}
