//! Rotation-aware database sessions.
//!
//! A [`sessions::RotationAwareSession`] keeps one live connection to a protected
//! resource valid across credential rotation: it fetches a credential from a
//! [`infra::secrets::CredentialSource`], opens a session through a
//! [`database::ConnectionFactory`], and rotates exactly once when the resource
//! rejects the credential. The [`driver::Driver`] runs a probe against it on a
//! fixed cadence.

pub mod cli;
pub mod config;
pub mod database;
pub mod driver;
pub mod infra;
pub mod logging;
pub mod sessions;
