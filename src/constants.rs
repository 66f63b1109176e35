// ABOUTME: Centralized constants for the authentication and session core
// ABOUTME: Groups limits, time conversions, environment variable names, and cookie contract values
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! # Constants
//!
//! All tunable values of the auth core live here so that lifetimes, TTLs,
//! and size limits are defined exactly once.

/// Size and lifetime limits
pub mod limits {
    /// Browser sessions live for 30 days from creation or last refresh
    pub const SESSION_EXPIRY_DAYS: i64 = 30;

    /// A session within this window of its expiry is flagged for refresh
    pub const SESSION_REFRESH_THRESHOLD_HOURS: i64 = 24;

    /// OAuth CSRF state tokens are single-use and expire after 10 minutes
    pub const STATE_TOKEN_EXPIRY_MINUTES: i64 = 10;

    /// API key labels are user-facing display strings
    pub const API_KEY_LABEL_MAX_CHARS: usize = 100;

    /// Random bytes drawn for an API key plaintext secret (256-bit)
    pub const API_KEY_SECRET_BYTES: usize = 32;

    /// Random bytes drawn for a session identifier (256-bit)
    pub const SESSION_ID_BYTES: usize = 32;

    /// Random bytes drawn for an OAuth state token (256-bit)
    pub const STATE_TOKEN_BYTES: usize = 32;

    /// Default expiry for legacy JWT tokens
    pub const JWT_EXPIRY_HOURS: i64 = 24;

    /// Outbound OAuth provider calls fail closed after this many seconds
    pub const OAUTH_HTTP_TIMEOUT_SECS: u64 = 10;

    /// How often the background sweep deletes expired sessions
    pub const SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

    /// Argon2id memory cost in KiB, tuned with the time cost below so a
    /// single hash takes roughly 100-150ms on commodity hardware
    pub const API_KEY_HASH_MEMORY_KIB: u32 = 65536;

    /// Argon2id time cost (iterations)
    pub const API_KEY_HASH_ITERATIONS: u32 = 2;

    /// Argon2id lane count
    pub const API_KEY_HASH_PARALLELISM: u32 = 1;
}

/// Time conversion constants
pub mod time_constants {
    /// Seconds per hour
    pub const SECONDS_PER_HOUR: u32 = 3600;

    /// Seconds per day
    pub const SECONDS_PER_DAY: u32 = 86_400;
}

/// Environment variable names
pub mod env_config {
    /// Database connection string
    pub const DATABASE_URL: &str = "DATABASE_URL";

    /// Base64-encoded shared secret for the legacy JWT auth method
    pub const JWT_SECRET: &str = "DISPATCH_JWT_SECRET";

    /// Base64-encoded 32-byte master key for secret encryption at rest
    pub const MASTER_ENCRYPTION_KEY: &str = "DISPATCH_MASTER_ENCRYPTION_KEY";

    /// Deployment environment: development, production, testing
    pub const ENVIRONMENT: &str = "DISPATCH_ENV";

    /// GitHub OAuth application credentials
    pub const GITHUB_CLIENT_ID: &str = "GITHUB_CLIENT_ID";
    pub const GITHUB_CLIENT_SECRET: &str = "GITHUB_CLIENT_SECRET";

    /// Google OAuth application credentials
    pub const GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
    pub const GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";

    /// Public base URL used to build OAuth redirect URIs
    pub const BASE_URL: &str = "DISPATCH_BASE_URL";
}

/// Session cookie contract consumed by the HTTP transport layer
pub mod cookies {
    /// Cookie name carrying the session id
    pub const SESSION_COOKIE_NAME: &str = "dispatch_session";

    /// Cookie path attribute
    pub const COOKIE_PATH: &str = "/";

    /// SameSite attribute value
    pub const SAME_SITE: &str = "Lax";
}
