//! Push feed entries to a Telegram chat through the Bot API.

pub mod config;
pub mod delivery;
pub mod entry;
pub mod error;
pub mod format;
pub mod push;
pub mod transport;

pub use config::{Config, Settings, TelegramConfig};
pub use entry::Entry;
pub use error::{PushError, Stage};
pub use push::{push_entry, push_entry_with};
