//! Turning a cookie into a tenant-scoped identity.

use std::sync::Arc;

use seedor_api::{Clock, CookieSource, Role, TenantId, UserId, UserRecord, UserStore};
use seedor_core::AuthConfig;
use serde::Serialize;

use crate::Result;
use crate::token::{SessionTokenPayload, TokenCodec};

/// The trusted identity of a page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// The trusted identity of an API request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAuthSession {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
}

impl From<AuthSession> for ApiAuthSession {
    fn from(s: AuthSession) -> Self {
        Self {
            user_id: s.user_id,
            tenant_id: s.tenant_id,
            role: s.role,
        }
    }
}

/// Resolves session cookies against live user and membership state.
///
/// Nothing is cached: every call re-reads the user, so deactivation, membership
/// removal, role changes and revocation apply to the very next request.
#[derive(Debug)]
pub struct SessionResolver<S> {
    store: Arc<S>,
    codec: TokenCodec,
    cookie_name: String,
    pub(crate) login_path: String,
    pub(crate) home_path: String,
}

impl<S: UserStore> SessionResolver<S> {
    pub fn new(store: Arc<S>, codec: TokenCodec) -> Self {
        let defaults = AuthConfig::default();
        Self {
            store,
            codec,
            cookie_name: defaults.cookie_name,
            login_path: defaults.login_path,
            home_path: defaults.home_path,
        }
    }

    pub fn from_config(store: Arc<S>, cfg: &AuthConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let codec = TokenCodec::new(&cfg.session_secret, clock)?;
        Ok(Self {
            store,
            codec,
            cookie_name: cfg.cookie_name.clone(),
            login_path: cfg.login_path.clone(),
            home_path: cfg.home_path.clone(),
        })
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_redirects(mut self, login_path: impl Into<String>, home_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self.home_path = home_path.into();
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Resolve a raw token. `Ok(None)` means "not authenticated"; `Err` only on store failure.
    pub async fn resolve(&self, raw_token: Option<&str>) -> Result<Option<AuthSession>> {
        let Some(payload) = self.codec.verify(raw_token) else {
            tracing::debug!(reason = "token", "session rejected");
            return Ok(None);
        };

        let Some(user) = self.store.find_user_by_id(&payload.user_id).await? else {
            tracing::debug!(reason = "unknown_user", "session rejected");
            return Ok(None);
        };

        Ok(authorize(&payload, &user))
    }

    /// Page-rendering variant: reads the session cookie from the request's cookie jar.
    pub async fn session<C>(&self, cookies: &C) -> Result<Option<AuthSession>>
    where
        C: CookieSource + Sync + ?Sized,
    {
        self.resolve(cookies.get_cookie(&self.cookie_name)).await
    }

    /// API variant. Same checks as [`Self::session`], narrower result.
    pub async fn api_session<C>(&self, cookies: &C) -> Result<Option<ApiAuthSession>>
    where
        C: CookieSource + Sync + ?Sized,
    {
        Ok(self.session(cookies).await?.map(ApiAuthSession::from))
    }
}

fn authorize(payload: &SessionTokenPayload, user: &UserRecord) -> Option<AuthSession> {
    if !user.is_active() {
        tracing::debug!(reason = "inactive", user_id = %user.id, "session rejected");
        return None;
    }

    let Some(membership) = user.membership_for(&payload.tenant_id) else {
        tracing::debug!(reason = "membership", user_id = %user.id, "session rejected");
        return None;
    };

    if let Some(cutoff) = user.sessions_valid_after {
        if payload.iat.is_none_or(|iat| iat < cutoff) {
            tracing::debug!(reason = "revoked", user_id = %user.id, "session rejected");
            return None;
        }
    }

    // Role comes from the live record; the token's role claim is not trusted.
    Some(AuthSession {
        user_id: user.id.clone(),
        tenant_id: membership.tenant_id.clone(),
        role: user.role,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
    })
}
