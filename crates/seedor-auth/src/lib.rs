//! seedor-auth
//!
//! Session and authentication core for the Seedor dashboard. It covers:
//!
//! - **Password hashing** with salted scrypt (`salt:hash`, hex encoded)
//! - **Session tokens**: a self-contained, expiring payload signed with HMAC-SHA256
//! - **Session resolution**: token + live user/membership lookup → tenant-scoped identity
//! - **Role guards** for page routes (redirects) and API routes (401/403)
//! - **Cookies**: building the session `Set-Cookie` and reading `Cookie` headers
//! - **Login**: email + password → signed session cookie
//!
//! Negative outcomes (bad password, forged or expired token, inactive user, removed
//! membership) are values, not errors. Only store failures surface as `Err`.
//!
//! ## Quick start
//! ```no_run
//! use std::sync::Arc;
//!
//! use seedor_api::SystemClock;
//! use seedor_auth::{CookieHeader, SessionResolver};
//! use seedor_core::{AuthConfig, MemoryStore};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = AuthConfig::default();
//! let store = Arc::new(MemoryStore::new());
//! let resolver = SessionResolver::from_config(store, &cfg, Arc::new(SystemClock))?;
//!
//! let cookies = CookieHeader::parse("seedor_session=eyJ...");
//! match resolver.session(&cookies).await? {
//!     Some(session) => println!("tenant={} role={}", session.tenant_id, session.role),
//!     None => println!("not authenticated"),
//! }
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod cookie;
mod error;
mod guard;
mod login;
mod password;
mod resolver;
mod token;

pub use cookie::{CookieHeader, CookieOptions, SameSite, build_clear_cookie, build_set_cookie};
pub use error::{Error, Result};
pub use guard::{HasRole, Rejection, allows};
pub use login::{Authenticator, LoginError, LoginOutcome, LoginRequest};
pub use password::{hash_password, verify_password};
pub use resolver::{ApiAuthSession, AuthSession, SessionResolver};
pub use token::{SessionTokenPayload, TokenCodec};
