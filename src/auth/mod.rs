//! Authentication
//!
//! OAuth2 client credentials exchange and the shared token cache.

pub mod authenticator;
pub mod client_credentials;

pub use authenticator::Authenticator;
pub use client_credentials::ClientCredentialsFlow;
