//! Frank Camper server — library crate for the HTTP/WebSocket front end.
//!
//! Exposes the router and state so the binary (`main.rs`) and
//! `fc-e2e-tests` can build the same application.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
