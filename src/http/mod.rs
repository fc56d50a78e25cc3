//! Data plane: HTTP and WebSocket forwarding.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, resolve route, touch activity)
//!     → request.rs (upstream path, hop-by-hop stripping, X-Forwarded-*)
//!     → forward.rs (plain HTTP, streamed both ways)
//!       or websocket.rs (upgrade, frame relay)
//!     → response.rs (502 / 404 on failure)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use server::{ProxyServer, ProxyState};
