//! Authentication and authorization module

pub mod cookies;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{JwtService, ResetClaims, SessionClaims, TokenError, TokenKind, TokenPair, TokenSettings};
pub use middleware::{extract_token, jwt_auth_middleware, AuthContext};
pub use password::PasswordHasher;
