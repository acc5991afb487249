//! dmcp: browser-automation access to the Discord web client.
//!
//! The official API cannot reach servers the operator does not administer, so
//! this crate drives an authenticated browser session instead. One
//! [`Supervisor`] owns the session, serializes all operations against it, and
//! recycles it whenever it becomes untrustworthy.
//!
//! ```ignore
//! use dmcp::{Config, Supervisor};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> dmcp::Result<()> {
//!     let supervisor = Supervisor::new(Config::from_env()?);
//!
//!     for server in supervisor.list_servers().await? {
//!         println!("{} {}", server.id, server.name);
//!     }
//!
//!     let messages = supervisor
//!         .read_messages(None, "1234567890", Duration::from_secs(24 * 3600), 100)
//!         .await?;
//!     for message in messages {
//!         println!("[{}] {}: {}", message.timestamp, message.author_name, message.content);
//!     }
//!
//!     supervisor.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
mod dom;
pub mod error;
pub mod extract;
mod session;
pub mod supervisor;
pub mod types;

pub use config::Config;
pub use discovery::{ChannelMatch, DiscoveryCache, compile_pattern, match_keywords};
pub use error::{Error, Result};
pub use extract::{ChannelView, collect_window};
pub use supervisor::{SendResult, Supervisor};
pub use types::{Channel, ChannelKind, Message, Server, snowflake_cmp};
