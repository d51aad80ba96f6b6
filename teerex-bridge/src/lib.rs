//! The Enclave Bridge (spec §4.4): moves bytes between an untrusted host TCP
//! port and the enclave's isolated channel, preserving message boundaries
//! with length-prefixed framing since the channel may be datagram-oriented
//! even though both ends it connects are plain byte streams.

pub mod channel;
pub mod config;
pub mod forward;
pub mod framing;
pub mod server;
