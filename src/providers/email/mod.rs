//! Email provider implementations.
//!
//! This module contains the [`EmailProvider`] trait and implementations for
//! different email backends:
//!
//! - [`GmailProvider`] - Gmail API with OAuth 2.0
//! - [`OutlookProvider`] - Microsoft Graph with a bearer token
//! - [`SmtpProvider`] - Send-only SMTP
//!
//! # Architecture
//!
//! Every backend is reached through the same four capabilities: connect,
//! disconnect, fetch a page of messages and send a message. Backends that
//! lack a capability report [`ProviderError::UnsupportedOperation`] instead
//! of failing in a backend-specific way.
//!
//! # Example
//!
//! ```ignore
//! use courier::domain::{OutlookConfig, ProviderConfig};
//! use courier::providers::email::{DefaultProviderFactory, ProviderFactory};
//!
//! async fn list_inbox(token: String) -> courier::providers::email::Result<()> {
//!     let factory = DefaultProviderFactory::default();
//!     let mut provider = factory.create(ProviderConfig::Outlook(OutlookConfig::new(token)))?;
//!     provider.connect().await?;
//!
//!     for message in provider.fetch_messages().await? {
//!         println!("{}: {}", message.from.unwrap_or_default(), message.subject.unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```

mod factory;
mod gmail;
mod mime;
mod outlook;
mod smtp;
mod traits;

pub use factory::DefaultProviderFactory;
pub use gmail::{GmailEndpoints, GmailProvider, GMAIL_SCOPES};
pub use outlook::OutlookProvider;
pub use smtp::SmtpProvider;
pub use traits::{AccountProfile, EmailProvider, ProviderError, ProviderFactory, Result};
