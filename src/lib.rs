//! courier - email provider abstraction and account registry
//!
//! This crate provides the account core of the courier desktop client:
//! a uniform contract over Gmail, Outlook and SMTP backends, an encrypted
//! account registry, and the provider manager the application shell calls.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;

pub use services::{AccountError, ProviderManager};
