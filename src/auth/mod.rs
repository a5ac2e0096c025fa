//! Authentication and authorization

pub mod clock;
pub mod cookie;
pub mod jwt;
pub mod loader;
pub mod middleware;
pub mod models;
pub mod password;
pub mod postgres;
pub mod recovery;
pub mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cookie::TokenCookie;
pub use jwt::{Claims, TokenCodec, TokenError};
pub use loader::{InMemoryUserStore, PrincipalLoader, UserStore};
pub use middleware::{authenticate, authorize, AuthService, CurrentUser};
pub use models::{Authentication, Principal, Role, UserInfo};
pub use password::PasswordHasher;
pub use postgres::PostgresUserStore;
pub use recovery::RecoveryManager;
pub use rules::{Access, Decision, PathPattern, Rule, RuleTable};
