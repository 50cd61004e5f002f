//! Token Issuer (component B): registration, login, JWT issue/verify, and
//! the consistent-hash-sharded verification cache that keeps per-request
//! auth overhead low during a flash-sale burst.

mod error;
mod hash_ring;
mod jwt;
mod token_cache;

pub use error::AuthError;
pub use hash_ring::HashRing;
pub use jwt::{AuthResponse, Claims, TokenIssuer};
pub use token_cache::TokenVerifyCache;
