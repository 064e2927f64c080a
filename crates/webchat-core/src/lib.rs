//! # webchat-core
//!
//! Core crate for the webchat presence service. Contains configuration
//! schemas, validated nickname and room name types, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other webchat crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
