//! # Rolegate Core
//!
//! Configuration, validation, and shared types for Rolegate.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Input validation and NFKC normalisation of identifiers
//! - Secret wrappers that keep passwords out of logs
//! - Id newtypes shared by the gateway and CLI

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod secrets;
pub mod types;
pub mod validation;

pub use config::{AuthConfig, Config, ConfigError, IgnoredOverride, LogFormat, PasswordPolicy};
pub use secrets::{Password, scrub_secrets};
pub use types::{AccountId, Collection, RoleId};
pub use validation::ValidationError;

