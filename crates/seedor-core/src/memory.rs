use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use seedor_api::{
    MembershipRecord, Role, SeedorError, UserId, UserRecord, UserStatus, UserStore,
};
use serde::Deserialize;

/// In-process `UserStore`, used by tests and by the CLI against a `users.toml` fixture.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<BTreeMap<UserId, UserRecord>>,
    last_access: RwLock<BTreeMap<UserId, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let users: BTreeMap<UserId, UserRecord> = users
            .into_iter()
            .map(|mut user| {
                user.email = normalize_email(&user.email);
                (user.id.clone(), user)
            })
            .collect();
        Self {
            users: RwLock::new(users),
            last_access: RwLock::default(),
        }
    }

    /// Add or replace a user.
    pub fn insert(&self, mut user: UserRecord) -> Result<(), SeedorError> {
        user.email = normalize_email(&user.email);
        let mut users = self
            .users
            .write()
            .map_err(|_| SeedorError::Internal("user table poisoned".to_string()))?;
        users.insert(user.id.clone(), user);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_status(&self, user_id: &str, status: UserStatus) -> Result<(), SeedorError> {
        self.update(user_id, |u| u.status = status)
    }

    pub fn set_role(&self, user_id: &str, role: Role) -> Result<(), SeedorError> {
        self.update(user_id, |u| u.role = role)
    }

    pub fn remove_membership(&self, user_id: &str, tenant_id: &str) -> Result<(), SeedorError> {
        self.update(user_id, |u| u.memberships.retain(|m| m.tenant_id != tenant_id))
    }

    /// Invalidate every token issued to `user_id` before `at_ms`.
    pub fn revoke_sessions(&self, user_id: &str, at_ms: i64) -> Result<(), SeedorError> {
        self.update(user_id, |u| u.sessions_valid_after = Some(at_ms))
    }

    pub fn last_access(&self, user_id: &str) -> Option<i64> {
        self.last_access.read().ok()?.get(user_id).copied()
    }

    fn update<F>(&self, user_id: &str, f: F) -> Result<(), SeedorError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut users = self
            .users
            .write()
            .map_err(|_| SeedorError::Internal("user table poisoned".to_string()))?;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| SeedorError::NotFound(format!("user {user_id}")))?;
        f(user);
        Ok(())
    }
}

impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, SeedorError> {
        let users = self
            .users
            .read()
            .map_err(|_| SeedorError::Store("user table poisoned".to_string()))?;
        Ok(users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, SeedorError> {
        let email = normalize_email(email);
        let users = self
            .users
            .read()
            .map_err(|_| SeedorError::Store("user table poisoned".to_string()))?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn touch_last_access(&self, id: &str, at_ms: i64) -> Result<(), SeedorError> {
        let mut seen = self
            .last_access
            .write()
            .map_err(|_| SeedorError::Store("access table poisoned".to_string()))?;
        seen.insert(id.to_string(), at_ms);
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Deserialize)]
struct RawUsers {
    #[serde(default)]
    users: Vec<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    role: Role,
    #[serde(default = "default_status")]
    status: UserStatus,
    password_hash: String,
    #[serde(default)]
    tenants: Vec<String>,
    sessions_valid_after: Option<i64>,
}

fn default_status() -> UserStatus {
    UserStatus::Active
}

pub fn parse_users_toml(content: &str) -> Result<MemoryStore, SeedorError> {
    let raw: RawUsers = toml::from_str(content)
        .map_err(|e| SeedorError::Validation(format!("invalid users TOML: {e}")))?;

    let mut users: BTreeMap<UserId, UserRecord> = BTreeMap::new();
    for u in raw.users {
        if users.contains_key(&u.id) {
            return Err(SeedorError::Validation(format!("duplicate user id {}", u.id)));
        }
        users.insert(
            u.id.clone(),
            UserRecord {
                id: u.id,
                email: u.email,
                first_name: u.first_name,
                last_name: u.last_name,
                role: u.role,
                status: u.status,
                password_hash: u.password_hash,
                memberships: u
                    .tenants
                    .into_iter()
                    .map(|tenant_id| MembershipRecord { tenant_id })
                    .collect(),
                sessions_valid_after: u.sessions_valid_after,
            },
        );
    }
    Ok(MemoryStore::with_users(users.into_values()))
}

pub fn load_users_from_file(path: &Path) -> Result<MemoryStore, SeedorError> {
    let content = fs::read_to_string(path)
        .map_err(|e| SeedorError::NotFound(format!("failed to read {}: {e}", path.display())))?;
    let store = parse_users_toml(&content).map_err(|e| match e {
        SeedorError::Validation(msg) => {
            SeedorError::Validation(format!("{}: {msg}", path.display()))
        }
        other => other,
    })?;
    tracing::debug!(users = store.len(), path = %path.display(), "loaded user fixture");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        [[users]]
        id = "u1"
        email = "Ana@Example.com "
        first_name = "Ana"
        last_name = "Diaz"
        role = "ADMIN"
        password_hash = "00:11"
        tenants = ["t1", "t2"]

        [[users]]
        id = "u2"
        email = "bo@example.com"
        role = "SUPERVISOR"
        status = "INVITED"
        password_hash = "00:11"
    "#;

    #[tokio::test]
    async fn fixture_loads_with_memberships() {
        let store = parse_users_toml(FIXTURE).unwrap();
        assert_eq!(store.len(), 2);

        let ana = store.find_user_by_id("u1").await.unwrap().unwrap();
        assert_eq!(ana.tenant_ids(), vec!["t1".to_string(), "t2".to_string()]);
        assert!(ana.is_active());

        let bo = store.find_user_by_id("u2").await.unwrap().unwrap();
        assert_eq!(bo.status, UserStatus::Invited);
        assert!(bo.memberships.is_empty());
    }

    #[tokio::test]
    async fn email_lookup_is_normalized() {
        let store = parse_users_toml(FIXTURE).unwrap();
        let found = store.find_user_by_email("  ANA@example.COM").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
        assert!(store.find_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let doubled = format!("{FIXTURE}\n[[users]]\nid = \"u1\"\nemail = \"x@y.z\"\nrole = \"ADMIN\"\npassword_hash = \"a:b\"\n");
        assert!(matches!(
            parse_users_toml(&doubled),
            Err(SeedorError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn insert_replaces_and_normalizes() {
        let store = MemoryStore::new();
        let raw = parse_users_toml(FIXTURE).unwrap();
        let mut ana = raw.find_user_by_id("u1").await.unwrap().unwrap();
        ana.email = " NEW@Example.com".to_string();

        store.insert(ana.clone()).unwrap();
        store.insert(ana).unwrap();
        assert_eq!(store.len(), 1);
        let found = store.find_user_by_email("new@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
    }

    #[test]
    fn insert_reports_poisoned_table() {
        let store = MemoryStore::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.users.write().unwrap();
            panic!("poison the user table");
        }));
        let raw = parse_users_toml(FIXTURE).unwrap();
        let user = raw.users.read().unwrap().get("u1").cloned().unwrap();
        assert!(matches!(store.insert(user), Err(SeedorError::Internal(_))));
    }

    #[tokio::test]
    async fn mutations_are_visible_to_lookups() {
        let store = parse_users_toml(FIXTURE).unwrap();
        store.set_status("u1", UserStatus::Inactive).unwrap();
        store.remove_membership("u1", "t2").unwrap();
        store.revoke_sessions("u1", 42).unwrap();
        store.touch_last_access("u1", 7).await.unwrap();

        let ana = store.find_user_by_id("u1").await.unwrap().unwrap();
        assert!(!ana.is_active());
        assert!(ana.membership_for("t2").is_none());
        assert_eq!(ana.sessions_valid_after, Some(42));
        assert_eq!(store.last_access("u1"), Some(7));

        assert!(matches!(
            store.set_role("ghost", Role::Admin),
            Err(SeedorError::NotFound(_))
        ));
    }
}
