//! WebSocket infrastructure for live job streams.
//!
//! Provides connection management, heartbeat monitoring, and the HTTP
//! upgrade handler that attaches a connection to a job's event stream.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::job_stream;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
