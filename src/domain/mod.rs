//! Domain layer types for the courier account core.
//!
//! This module contains the account, provider configuration and message
//! types shared by the providers, storage and services layers.

mod account;
mod message;
mod types;

pub use account::{
    Account, GmailConfig, OutlookConfig, ProviderConfig, ProviderType, SmtpConfig,
    UnknownProviderType,
};
pub use message::{sort_most_recent_first, MessageSummary, OutgoingAttachment, OutgoingMessage};
pub use types::AccountId;
