//! Authentication gateway: password hashing, JWT issue/verify, Google
//! sign-in and the `AuthUser` extractor.

mod extractor;
mod google;
mod password;
mod tokens;

pub use extractor::AuthUser;
pub use google::{candidate_usernames, username_base, GoogleError, GoogleVerifier};
pub use password::{hash_password, verify_password};
pub use tokens::{TokenPair, TokenService};

#[cfg(test)]
pub use tokens::TokenType;
