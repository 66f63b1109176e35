// ABOUTME: Main library entry point for the dispatch authentication core
// ABOUTME: Provides API key, OAuth, session, JWT, and user registry services
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

#![deny(unsafe_code)]

//! # Dispatch Auth
//!
//! The authentication and session core of the dispatch platform. Four
//! credential strategies share one user registry:
//!
//! - **API keys**: opaque bearer secrets hashed with Argon2id, shown once
//!   at generation
//! - **`OAuth2`**: authorization-code flow against GitHub and Google with
//!   single-use CSRF state tokens
//! - **Sessions**: rolling 30-day browser sessions carried in an
//!   `HttpOnly` cookie
//! - **Legacy JWT**: stateless HS256 tokens on a shared secret
//!
//! The HTTP transport is deliberately out of scope: every operation here
//! takes and returns plain values, and the cookie contract is exposed as a
//! builder the transport layer renders.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use dispatch_auth::database_plugins::{factory::Database, DatabaseProvider};
//! use dispatch_auth::api_keys::ApiKeyManager;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let database = Database::new("sqlite:dispatch_auth.db").await?;
//!     database.migrate().await?;
//!
//!     let api_keys = ApiKeyManager::new(database);
//!     let generated = api_keys.generate(Uuid::new_v4(), "ci-deploy").await?;
//!     println!("store this key now, it will not be shown again: {}", generated.key);
//!
//!     Ok(())
//! }
//! ```

pub mod api_keys;
pub mod auth;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod database_plugins;
pub mod errors;
pub mod logging;
pub mod models;
pub mod oauth;
pub mod sessions;
pub mod users;
