//! Client for the route proxy's control API.

mod client;

pub use client::{ClientError, ControlClient, RouteInfo};
