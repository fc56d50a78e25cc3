//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured address
//!     → listener.rs (parse, bind, report local address)
//!     → tls.rs (optional certificate loading for the public listener)
//!     → Hand off to the HTTP layer (data plane or control API)
//! ```
//!
//! # Design Decisions
//! - Both listeners are bound before either starts serving, so a port
//!   conflict aborts startup cleanly
//! - TLS is optional and only ever applies to the public listener

pub mod listener;
pub mod tls;

pub use listener::{bind, ListenerError};
pub use tls::{load_tls_config, TlsError};
