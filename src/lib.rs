//! News Relay - announce new feed articles on a chat webhook
//!
//! This crate polls a single RSS/Atom feed on a fixed interval and posts each
//! article it has not announced before to a Discord-style webhook. Announced
//! ids are kept in a JSON file so restarts do not repeat announcements, and a
//! sliding-window limit caps how fast posts go out.

pub mod article;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod notifier;
pub mod rate_limit;
pub mod relay;
pub mod scheduler;
pub mod store;

pub use article::Article;
pub use error::{RelayError, Result};
