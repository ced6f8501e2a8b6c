//! Role checks and the redirecting / rejecting wrappers built on them.

use seedor_api::{CookieSource, Role, UserStore};
use thiserror::Error;

use crate::Error;
use crate::resolver::{ApiAuthSession, AuthSession, SessionResolver};

/// Anything carrying a resolved role.
pub trait HasRole {
    fn role(&self) -> Role;
}

impl HasRole for AuthSession {
    fn role(&self) -> Role {
        self.role
    }
}

impl HasRole for ApiAuthSession {
    fn role(&self) -> Role {
        self.role
    }
}

/// True if the session's role is one of `allowed`.
pub fn allows<S: HasRole + ?Sized>(session: &S, allowed: &[Role]) -> bool {
    allowed.contains(&session.role())
}

/// Why a guarded request did not get a session.
#[derive(Debug, Error)]
pub enum Rejection {
    /// Page request: send the browser elsewhere.
    #[error("redirect to {0}")]
    Redirect(String),

    /// API request without a valid session.
    #[error("not authenticated")]
    Unauthorized,

    /// API request whose role is not allowed.
    #[error("insufficient role")]
    Forbidden,

    /// Resolution could not complete.
    #[error(transparent)]
    Internal(#[from] Error),
}

impl Rejection {
    /// HTTP status the framework layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Rejection::Redirect(_) => 307,
            Rejection::Unauthorized => 401,
            Rejection::Forbidden => 403,
            Rejection::Internal(_) => 500,
        }
    }

    /// `Location` target for redirects.
    pub fn location(&self) -> Option<&str> {
        match self {
            Rejection::Redirect(to) => Some(to.as_str()),
            _ => None,
        }
    }
}

impl<S: UserStore> SessionResolver<S> {
    /// Page guard: redirect to the login path when no session resolves.
    pub async fn require_session<C>(&self, cookies: &C) -> Result<AuthSession, Rejection>
    where
        C: CookieSource + Sync + ?Sized,
    {
        self.session(cookies)
            .await?
            .ok_or_else(|| Rejection::Redirect(self.login_path.clone()))
    }

    /// Page guard: as [`Self::require_session`], then redirect to the home path when
    /// the role is not allowed.
    pub async fn require_role<C>(&self, cookies: &C, allowed: &[Role]) -> Result<AuthSession, Rejection>
    where
        C: CookieSource + Sync + ?Sized,
    {
        let session = self.require_session(cookies).await?;
        if !allows(&session, allowed) {
            tracing::debug!(user_id = %session.user_id, role = %session.role, "role not allowed");
            return Err(Rejection::Redirect(self.home_path.clone()));
        }
        Ok(session)
    }

    /// API guard: 401 when no session resolves.
    pub async fn require_api_session<C>(&self, cookies: &C) -> Result<ApiAuthSession, Rejection>
    where
        C: CookieSource + Sync + ?Sized,
    {
        self.api_session(cookies).await?.ok_or(Rejection::Unauthorized)
    }

    /// API guard: 401 when no session resolves, 403 when the role is not allowed.
    pub async fn require_api_role<C>(
        &self,
        cookies: &C,
        allowed: &[Role],
    ) -> Result<ApiAuthSession, Rejection>
    where
        C: CookieSource + Sync + ?Sized,
    {
        let session = self.require_api_session(cookies).await?;
        if !allows(&session, allowed) {
            return Err(Rejection::Forbidden);
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::{NOW, user};
    use crate::token::{SessionTokenPayload, TokenCodec};
    use seedor_api::{ManualClock, UserStatus};
    use seedor_core::{MemoryStore, SessionSecret};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn resolver_with(role: Role) -> (Arc<MemoryStore>, SessionResolver<MemoryStore>, HashMap<String, String>) {
        let mut u = user("u1", &["t1"]);
        u.role = role;
        let store = Arc::new(MemoryStore::with_users([u]));
        let codec = TokenCodec::new(
            &SessionSecret::new("guard-secret"),
            Arc::new(ManualClock::new(NOW)),
        )
        .unwrap();
        let resolver = SessionResolver::new(store.clone(), codec);
        let token = resolver
            .codec()
            .issue(&SessionTokenPayload {
                user_id: "u1".into(),
                tenant_id: "t1".into(),
                role,
                exp: NOW + 60_000,
                iat: Some(NOW),
            })
            .unwrap();
        let jar = HashMap::from([("seedor_session".to_string(), token)]);
        (store, resolver, jar)
    }

    #[test]
    fn allows_is_membership() {
        let session = ApiAuthSession {
            user_id: "u1".into(),
            tenant_id: "t1".into(),
            role: Role::Supervisor,
        };
        assert!(allows(&session, &[Role::Admin, Role::Supervisor]));
        assert!(!allows(&session, &[Role::Admin]));
        assert!(!allows(&session, &[]));
    }

    #[tokio::test]
    async fn page_guard_redirects_to_login() {
        let (_, resolver, _) = resolver_with(Role::Admin);
        let empty: HashMap<String, String> = HashMap::new();
        let err = resolver.require_session(&empty).await.unwrap_err();
        assert_eq!(err.location(), Some("/login"));
        assert_eq!(err.status_code(), 307);
    }

    #[tokio::test]
    async fn page_role_guard_redirects_home() {
        let (_, resolver, jar) = resolver_with(Role::Supervisor);
        let resolver = resolver.with_redirects("/ingresar", "/inicio");

        let err = resolver.require_role(&jar, &[Role::Admin]).await.unwrap_err();
        assert_eq!(err.location(), Some("/inicio"));

        let ok = resolver
            .require_role(&jar, &[Role::Admin, Role::Supervisor])
            .await
            .unwrap();
        assert_eq!(ok.tenant_id, "t1");
    }

    #[tokio::test]
    async fn api_guards_use_status_codes() {
        let (store, resolver, jar) = resolver_with(Role::Supervisor);

        let err = resolver.require_api_role(&jar, &[Role::Admin]).await.unwrap_err();
        assert!(matches!(err, Rejection::Forbidden));
        assert_eq!(err.status_code(), 403);

        assert!(resolver.require_api_role(&jar, &[Role::Supervisor]).await.is_ok());

        store.set_status("u1", UserStatus::Inactive).unwrap();
        let err = resolver.require_api_session(&jar).await.unwrap_err();
        assert!(matches!(err, Rejection::Unauthorized));
        assert_eq!(err.status_code(), 401);
    }
}
