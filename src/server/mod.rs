//! Server module for OrderPulse
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Startup configuration checks
//! - `producers`: Producer task startup
//! - `init`: Hub construction, router and the run loop

pub mod config;
mod init;
mod loader;
mod producers;
mod validation;

pub use init::run;
pub use loader::load_config;
