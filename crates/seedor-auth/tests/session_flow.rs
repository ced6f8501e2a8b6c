use std::sync::Arc;

use seedor_api::{Clock, ManualClock, MembershipRecord, Role, UserRecord, UserStatus};
use seedor_auth::{
    Authenticator, CookieHeader, LoginRequest, Rejection, SessionResolver, hash_password,
};
use seedor_core::{AuthConfig, MemoryStore};

const NOW: i64 = 1_700_000_000_000;

fn supervisor() -> UserRecord {
    UserRecord {
        id: "u-sup".to_string(),
        email: "sup@campo.test".to_string(),
        first_name: "Sol".to_string(),
        last_name: "Ruiz".to_string(),
        role: Role::Supervisor,
        status: UserStatus::Active,
        password_hash: hash_password("cosecha2024").unwrap(),
        memberships: vec![MembershipRecord {
            tenant_id: "finca-norte".to_string(),
        }],
        sessions_valid_after: None,
    }
}

#[tokio::test]
async fn login_cookie_resolves_until_expiry() {
    let cfg = AuthConfig {
        session_max_age_seconds: 600,
        ..AuthConfig::default()
    };
    let store = Arc::new(MemoryStore::with_users([supervisor()]));
    let clock = Arc::new(ManualClock::new(NOW));

    let auth = Authenticator::from_config(store.clone(), &cfg, clock.clone()).unwrap();
    let resolver = SessionResolver::from_config(store.clone(), &cfg, clock.clone()).unwrap();

    let out = auth
        .login(LoginRequest {
            email: "sup@campo.test".to_string(),
            password: "cosecha2024".to_string(),
            tenant_id: None,
        })
        .await
        .unwrap();

    // What the browser sends back.
    let pair = out.set_cookie.split(';').next().unwrap();
    let jar = CookieHeader::parse(&format!("theme=dark; {pair}"));

    let session = resolver.require_session(&jar).await.unwrap();
    assert_eq!(session.user_id, "u-sup");
    assert_eq!(session.tenant_id, "finca-norte");

    let err = resolver.require_role(&jar, &[Role::Admin]).await.unwrap_err();
    assert_eq!(err.location(), Some("/dashboard"));

    let api = resolver
        .require_api_role(&jar, &[Role::Admin, Role::Supervisor])
        .await
        .unwrap();
    assert_eq!(api.role, Role::Supervisor);

    clock.advance(600_000);
    let err = resolver.require_session(&jar).await.unwrap_err();
    assert_eq!(err.location(), Some("/login"));
}

#[tokio::test]
async fn logout_everywhere_invalidates_issued_cookies() {
    let cfg = AuthConfig::default();
    let store = Arc::new(MemoryStore::with_users([supervisor()]));
    let clock = Arc::new(ManualClock::new(NOW));
    let auth = Authenticator::from_config(store.clone(), &cfg, clock.clone()).unwrap();
    let resolver = SessionResolver::from_config(store.clone(), &cfg, clock.clone()).unwrap();

    let login = || LoginRequest {
        email: "sup@campo.test".to_string(),
        password: "cosecha2024".to_string(),
        tenant_id: None,
    };
    let first = auth.login(login()).await.unwrap();

    clock.advance(1_000);
    store.revoke_sessions("u-sup", clock.now_ms()).unwrap();
    assert!(resolver.resolve(Some(&first.token)).await.unwrap().is_none());

    clock.advance(1);
    let second = auth.login(login()).await.unwrap();
    assert!(resolver.resolve(Some(&second.token)).await.unwrap().is_some());

    let err = resolver
        .require_api_session(&CookieHeader::parse(""))
        .await
        .unwrap_err();
    assert!(matches!(err, Rejection::Unauthorized));
}
