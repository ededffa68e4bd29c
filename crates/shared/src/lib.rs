//! Shared library for the event-action evaluation core and task manager
//!
//! This crate provides common functionality used by both binary crates:
//! - Database connection pooling and utilities
//! - Data model for events, conditions, actions, operations, escalations and tasks
//! - Error handling types
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod db;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use db::DbPool;
pub use error::{Error, Result};

/// Initialize tracing subscriber for structured logging
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shared=debug,event_processor=debug,task_manager=debug,info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
