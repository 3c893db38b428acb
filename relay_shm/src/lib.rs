//! # Relay Shared-Memory Channel
//!
//! A named, fixed-capacity ring of [`Message`] records in POSIX shared memory,
//! shared by any number of cooperating processes on one host. Two named
//! semaphores act as cross-process mutexes: one serializes writers, the other
//! serializes ring scans.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  publish   ┌──────────────────────────┐   scan    ┌──────────────┐
//! │ ShmChannel   ├───────────►│ /<name>                  ├──────────►│ ShmChannel   │
//! │ (alice)      │ <name>_    │ [Message; 64]            │ <name>_   │ (bob)        │
//! │              │ write      │ write_cursor read_cursor │ read      │ poller ──► cb│
//! └──────────────┘            └──────────────────────────┘           └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use relay_shm::{ChannelConfig, ShmChannel};
//!
//! # fn main() -> Result<(), relay_shm::ShmError> {
//! let config = ChannelConfig::default();
//! let bob = ShmChannel::join("lobby", "bob", &config, |msg| {
//!     println!("[{}] {}: {}", msg.timestamp, msg.sender, msg.body);
//! })?;
//!
//! let alice = ShmChannel::join("lobby", "alice", &config, |_| {})?;
//! alice.send("hello bob")?;
//!
//! alice.leave();
//! bob.leave();
//! ShmChannel::unlink("lobby")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Delivery Semantics
//!
//! - A participant only sees records written after it joined.
//! - A participant never sees its own records (matched by sender name).
//! - Writers never block on readers; a slow reader loses overwritten records.
//! - Leaving never removes the channel; [`ShmChannel::unlink`] does.

pub mod channel;
pub mod config;
pub mod error;
pub mod region;
pub mod semaphore;

pub use channel::{ShmChannel, read_sem_name, write_sem_name};
pub use config::ChannelConfig;
pub use error::{ShmError, ShmResult};
pub use region::{OBJECT_MODE, REGION_SIZE, SharedRegion};
pub use relay_common::message::Message;
pub use semaphore::NamedSemaphore;
