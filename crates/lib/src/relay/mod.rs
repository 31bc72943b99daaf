//! Relay: HTTP + WebSocket server for interview questions.
//!
//! One WebSocket per client at `/ws/interview`. Each text frame is a question (JSON or raw text);
//! each answered question gets exactly one text frame back. The transcript is saved when the connection ends.

mod protocol;
mod server;
mod session;

pub use protocol::{parse_inbound, InboundMessage, Question};
pub use server::{run_relay, serve, shutdown_signal, RelayEvent, RelayState};
pub use session::RelaySession;
