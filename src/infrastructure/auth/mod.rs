//! Session token infrastructure

mod jwt;

pub use jwt::{JwtClaims, JwtConfig, JwtGenerator, JwtService};
