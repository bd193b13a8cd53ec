//! Connection management for the single serial link
//!
//! This module handles:
//! - The connection state machine and its listener notifications
//! - One connector worker per outbound attempt, with a single fallback open
//! - One session worker per established connection (reads and writes)
//! - Supersession: a later `connect` cancels whatever came before it

mod cancel;
mod connector;
mod listener;
mod manager;
mod session;

pub use listener::{ChannelListener, ConnectionEvent, LinkListener};
pub use manager::SerialLink;
