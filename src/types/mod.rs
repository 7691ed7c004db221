//! Types
//!
//! Configuration and credential types shared across the client.

pub mod config;
pub mod token;

pub use config::{
    ClientCredentials, CentralConfig, QueryParams, DEFAULT_BASE_URL, DEFAULT_MAX_RESPONSE_SIZE,
    DEFAULT_TIMEOUT, DEFAULT_TOKEN_ENDPOINT, DEFAULT_TOKEN_REFRESH_BUFFER,
};
pub use token::{Credential, TokenResponse};
