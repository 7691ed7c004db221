//! Core Components
//!
//! HTTP plumbing shared by the authenticator and the resilient client.

pub mod transport;

pub use transport::*;
