//! External service providers.
//!
//! - [`email`] - Email providers (Gmail API, Microsoft Graph, SMTP)

pub mod email;
