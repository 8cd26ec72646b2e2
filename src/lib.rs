//! Backchannel: a Telegram feedback relay.
//!
//! Each end-user talking to the bot privately gets a dedicated forum topic in
//! one staff group. User messages are forwarded into the topic, staff replies
//! are delivered back, and edits and deletions are propagated using the
//! recorded id correspondence. Profile changes are kept in an append-only
//! log and announced in the topic.
//!
//! See `DESIGN.md` for the architecture.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod model;
pub mod store;
pub mod transport;

pub mod relay;
pub mod telegram;
