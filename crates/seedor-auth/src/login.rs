//! Email + password login that ends in a signed session cookie.

use std::sync::Arc;

use seedor_api::{Clock, SeedorError, TenantId, UserRecord, UserStore};
use seedor_core::AuthConfig;
use thiserror::Error;

use crate::cookie::{CookieOptions, build_clear_cookie, build_set_cookie};
use crate::password::{decoy_hash, verify_password};
use crate::resolver::AuthSession;
use crate::token::{SessionTokenPayload, TokenCodec};

/// Login input as received from the client.
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Required when the user belongs to more than one tenant.
    pub tenant_id: Option<TenantId>,
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub set_cookie: String,
    pub expires_at: i64,
    pub session: AuthSession,
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("email and password are required")]
    MissingCredentials,

    /// Unknown email or wrong password; the two are not told apart.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user is not active")]
    Inactive,

    #[error("user has no tenant")]
    NoTenant,

    /// The user belongs to several tenants and none was chosen.
    #[error("tenant selection required")]
    TenantSelectionRequired(Vec<TenantId>),

    #[error("user is not a member of the requested tenant")]
    UnknownTenant,

    #[error(transparent)]
    Internal(#[from] crate::Error),
}

impl From<SeedorError> for LoginError {
    fn from(e: SeedorError) -> Self {
        LoginError::Internal(crate::Error::Store(e))
    }
}

impl LoginError {
    pub fn status_code(&self) -> u16 {
        match self {
            LoginError::MissingCredentials => 400,
            LoginError::InvalidCredentials => 401,
            LoginError::Inactive | LoginError::NoTenant | LoginError::UnknownTenant => 403,
            LoginError::TenantSelectionRequired(_) => 409,
            LoginError::Internal(_) => 500,
        }
    }
}

/// Checks credentials and issues session tokens.
#[derive(Debug)]
pub struct Authenticator<S> {
    store: Arc<S>,
    codec: TokenCodec,
    cookie: CookieOptions,
    max_age_ms: i64,
}

impl<S: UserStore> Authenticator<S> {
    pub fn new(store: Arc<S>, codec: TokenCodec, cookie: CookieOptions) -> Self {
        let max_age_ms = cookie
            .max_age_seconds
            .and_then(|s| i64::try_from(s).ok())
            .map_or(AuthConfig::default().session_max_age_ms(), |s| s.saturating_mul(1000));
        Self {
            store,
            codec,
            cookie,
            max_age_ms,
        }
    }

    pub fn from_config(store: Arc<S>, cfg: &AuthConfig, clock: Arc<dyn Clock>) -> crate::Result<Self> {
        let codec = TokenCodec::new(&cfg.session_secret, clock)?;
        Ok(Self::new(store, codec, CookieOptions::session(cfg)))
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, LoginError> {
        let email = req.email.trim().to_lowercase();
        let password = req.password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let user = self.store.find_user_by_email(&email).await?;
        // Unknown emails still pay for one KDF run.
        let stored = match &user {
            Some(u) => u.password_hash.as_str(),
            None => decoy_hash(),
        };
        let password_ok = verify_password(password, stored);

        let user = match user {
            Some(u) if password_ok => u,
            _ => {
                tracing::warn!("failed login attempt");
                return Err(LoginError::InvalidCredentials);
            }
        };

        if !user.is_active() {
            return Err(LoginError::Inactive);
        }

        let tenant_id = select_tenant(&user, req.tenant_id.as_deref())?;
        let now = self.codec.now_ms();
        let expires_at = now.saturating_add(self.max_age_ms);

        let token = self.codec.issue(&SessionTokenPayload {
            user_id: user.id.clone(),
            tenant_id: tenant_id.clone(),
            role: user.role,
            exp: expires_at,
            iat: Some(now),
        })?;
        let set_cookie = build_set_cookie(&token, &self.cookie, now)?;

        self.store.touch_last_access(&user.id, now).await?;
        tracing::info!(user_id = %user.id, tenant_id = %tenant_id, "user logged in");

        Ok(LoginOutcome {
            token,
            set_cookie,
            expires_at,
            session: AuthSession {
                user_id: user.id,
                tenant_id,
                role: user.role,
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email,
            },
        })
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn logout_cookie(&self) -> crate::Result<String> {
        build_clear_cookie(&self.cookie)
    }
}

fn select_tenant(user: &UserRecord, requested: Option<&str>) -> Result<TenantId, LoginError> {
    if user.memberships.is_empty() {
        return Err(LoginError::NoTenant);
    }

    match requested {
        Some(tenant_id) => user
            .membership_for(tenant_id)
            .map(|m| m.tenant_id.clone())
            .ok_or(LoginError::UnknownTenant),
        None => match user.memberships.as_slice() {
            [only] => Ok(only.tenant_id.clone()),
            _ => Err(LoginError::TenantSelectionRequired(user.tenant_ids())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hash_password;
    use crate::resolver::tests::{NOW, user};
    use seedor_api::{ManualClock, UserStatus};
    use seedor_core::{MemoryStore, SessionSecret};

    fn authenticator(users: Vec<UserRecord>) -> (Arc<MemoryStore>, Authenticator<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_users(users));
        let codec = TokenCodec::new(
            &SessionSecret::new("login-secret"),
            Arc::new(ManualClock::new(NOW)),
        )
        .unwrap();
        let auth = Authenticator::new(store.clone(), codec, CookieOptions::default());
        (store, auth)
    }

    fn with_password(mut u: UserRecord, password: &str) -> UserRecord {
        u.password_hash = hash_password(password).unwrap();
        u
    }

    fn request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            tenant_id: None,
        }
    }

    #[tokio::test]
    async fn single_tenant_login_issues_cookie() {
        let (store, auth) = authenticator(vec![with_password(user("u1", &["t1"]), "secret123")]);

        let out = auth
            .login(request("  U1@Example.com ", " secret123 "))
            .await
            .unwrap();
        assert_eq!(out.session.tenant_id, "t1");
        assert_eq!(out.expires_at, NOW + 604_800_000);
        assert!(out.set_cookie.starts_with(&format!("seedor_session={}", out.token)));
        // Cookie expiry follows the injected clock, same as the token.
        assert!(out.set_cookie.contains("Expires=Tue, 21 Nov 2023 22:13:20 GMT"));
        assert_eq!(store.last_access("u1"), Some(NOW));

        let claims = auth.codec().verify(Some(&out.token)).unwrap();
        assert_eq!(claims.iat, Some(NOW));
        assert_eq!(claims.user_id, "u1");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_alike() {
        let (_, auth) = authenticator(vec![with_password(user("u1", &["t1"]), "secret123")]);

        let wrong = auth.login(request("u1@example.com", "nope")).await.unwrap_err();
        let unknown = auth.login(request("ghost@example.com", "secret123")).await.unwrap_err();
        assert!(matches!(wrong, LoginError::InvalidCredentials));
        assert!(matches!(unknown, LoginError::InvalidCredentials));
        assert_eq!(wrong.status_code(), unknown.status_code());
    }

    #[tokio::test]
    async fn blank_fields_are_rejected_before_lookup() {
        let (_, auth) = authenticator(vec![]);
        let err = auth.login(request(" ", "x")).await.unwrap_err();
        assert!(matches!(err, LoginError::MissingCredentials));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn inactive_user_cannot_log_in() {
        let mut u = with_password(user("u1", &["t1"]), "secret123");
        u.status = UserStatus::Inactive;
        let (_, auth) = authenticator(vec![u]);
        let err = auth.login(request("u1@example.com", "secret123")).await.unwrap_err();
        assert!(matches!(err, LoginError::Inactive));
    }

    #[tokio::test]
    async fn tenantless_user_cannot_log_in() {
        let (_, auth) = authenticator(vec![with_password(user("u1", &[]), "secret123")]);
        let err = auth.login(request("u1@example.com", "secret123")).await.unwrap_err();
        assert!(matches!(err, LoginError::NoTenant));
    }

    #[tokio::test]
    async fn several_tenants_require_a_choice() {
        let (_, auth) = authenticator(vec![with_password(user("u1", &["A", "B"]), "secret123")]);

        let err = auth.login(request("u1@example.com", "secret123")).await.unwrap_err();
        match err {
            LoginError::TenantSelectionRequired(ids) => assert_eq!(ids, vec!["A", "B"]),
            other => panic!("unexpected {other:?}"),
        }

        let mut req = request("u1@example.com", "secret123");
        req.tenant_id = Some("B".to_string());
        assert_eq!(auth.login(req).await.unwrap().session.tenant_id, "B");

        let mut req = request("u1@example.com", "secret123");
        req.tenant_id = Some("C".to_string());
        assert!(matches!(auth.login(req).await, Err(LoginError::UnknownTenant)));
    }

    #[test]
    fn logout_cookie_expires_immediately() {
        let (_, auth) = authenticator(vec![]);
        assert!(auth.logout_cookie().unwrap().contains("Max-Age=0"));
    }
}
