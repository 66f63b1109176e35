// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides common database and user creation helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `dispatch_auth`
//!
//! Common setup functions to reduce duplication across integration tests.

use anyhow::Result;
use dispatch_auth::{
    database_plugins::{factory::Database, DatabaseProvider},
    models::User,
};
use std::sync::Once;
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN, // Default to WARN for quiet tests
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test database setup
pub async fn create_test_database() -> Result<Database> {
    init_test_logging();
    let database = Database::new("sqlite::memory:").await?;
    database.migrate().await?;
    Ok(database)
}

/// Create a user with a unique username
pub async fn create_test_user(database: &Database) -> Result<User> {
    let suffix = Uuid::new_v4().simple().to_string();
    let user = User::new(
        format!("user_{suffix}"),
        Some(format!("user_{suffix}@example.com")),
        "api_key",
    );
    database.create_user(&user).await
}
