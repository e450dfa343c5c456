//! src/authentication/mod.rs

mod basic;
mod password;

pub use basic::basic_authentication;
pub use password::{validate_credentials, Credentials, CredentialsError};
