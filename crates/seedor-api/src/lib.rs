use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type TenantId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Supervisor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Supervisor => "SUPERVISOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SeedorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "SUPERVISOR" => Ok(Role::Supervisor),
            other => Err(SeedorError::Validation(format!("unknown role {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
    Invited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub tenant_id: TenantId,
}

/// A user as the store returns it, memberships included.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub password_hash: String,
    #[serde(default)]
    pub memberships: Vec<MembershipRecord>,
    /// Tokens issued before this instant (epoch ms) are no longer honoured.
    #[serde(default)]
    pub sessions_valid_after: Option<i64>,
}

impl UserRecord {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn membership_for(&self, tenant_id: &str) -> Option<&MembershipRecord> {
        self.memberships.iter().find(|m| m.tenant_id == tenant_id)
    }

    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.memberships.iter().map(|m| m.tenant_id.clone()).collect()
    }
}

// The stored hash stays out of debug output.
impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("status", &self.status)
            .field("memberships", &self.memberships)
            .field("sessions_valid_after", &self.sessions_valid_after)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SeedorError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub trait UserStore: Send + Sync {
    fn find_user_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, SeedorError>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, SeedorError>> + Send;

    fn touch_last_access(
        &self,
        id: &str,
        at_ms: i64,
    ) -> impl Future<Output = Result<(), SeedorError>> + Send;
}

pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        i64::try_from(ms).unwrap_or(i64::MAX)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Read access to the cookies of one incoming request.
pub trait CookieSource {
    fn get_cookie(&self, name: &str) -> Option<&str>;
}

impl CookieSource for HashMap<String, String> {
    fn get_cookie(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl CookieSource for BTreeMap<String, String> {
    fn get_cookie(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<T: CookieSource + ?Sized> CookieSource for &T {
    fn get_cookie(&self, name: &str) -> Option<&str> {
        (**self).get_cookie(name)
    }
}
