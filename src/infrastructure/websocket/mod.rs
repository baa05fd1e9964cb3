//! Market data stream client and its wire envelopes.

pub mod client;
pub mod dto;

pub use client::{ConnectionSupervisor, Reconnect, ReconnectPolicy, StreamClient, StreamEvent, StreamStatus};
pub use dto::{ControlMessage, MessageKind, StreamMessage};
