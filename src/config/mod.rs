// ABOUTME: Configuration module for the auth core
// ABOUTME: Environment-driven settings with development fallbacks and production strictness

pub mod environment;

pub use environment::{AuthConfig, Environment, OAuthAppConfig};
