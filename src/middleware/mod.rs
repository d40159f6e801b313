//! Middleware for the OrderPulse HTTP server
//!
//! - Bearer token extractors (`RequireSubject`, `OptionalSubject`)
//! - Secure response headers

pub mod auth;
pub mod headers;
