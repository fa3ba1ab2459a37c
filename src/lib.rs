//! Rewardgate - server-side verification and crediting for rewarded-ad
//! callbacks
//!
//! Rewardgate is built on top of Axum and Tokio. It receives the
//! server-to-server callbacks an ad network fires when a player finishes a
//! rewarded ad, verifies the ECDSA signature against the network's rotating
//! key directory, and credits the reward at most once even though callbacks
//! are delivered at least once.
//!
//! # Features
//!
//! - **Key directory cache**: single-flight fetch of rotating verification
//!   keys with TTL expiry
//! - **Canonical verification**: ECDSA P-256 / SHA-256 over the canonical
//!   signed message, reconstructed from the raw query
//! - **Idempotent crediting**: uniquely-keyed transaction ledger, at-most-once
//!   reward application under concurrent redelivery
//! - **Pluggable storage**: the ledger and the player store enter through
//!   async traits
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rewardgate::{AppContext, Config, MemoryGameStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize logging
//!     rewardgate::init_tracing();
//!
//!     let store = Arc::new(MemoryGameStore::new());
//!     let context = AppContext::builder()
//!         .with_config(Config::default())
//!         .with_ledger(store.clone())
//!         .with_players(store)
//!         .build()
//!         .unwrap();
//!
//!     let app = rewardgate::http::router(context);
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod app;
pub mod callback;
mod config;
mod error;
pub mod http;
pub mod keys;
pub mod ledger;
pub mod players;
pub mod ssv;

// Re-exports for public API
pub use app::{AppContext, AppContextBuilder};
pub use callback::{CallbackOutcome, CallbackProcessor, RewardRegistry, SsvCallback, ValidatedReward};
pub use config::{Config, ConfigBuilder, KeyDirectoryConfig, LoggingConfig, ServerConfig};
pub use error::{ErrorResponse, Result, RewardgateError};
pub use http::CallbackResponse;
pub use keys::{CachedKeySet, KeyDirectoryCache, KeySource};
pub use ledger::{
    BalanceMutation, CommitOutcome, MemoryGameStore, TransactionLedger, VerificationTransaction,
};
pub use players::PlayerStore;
pub use ssv::{CallbackVerifier, EcdsaCallbackVerifier, canonical_message};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main()
/// before building the AppContext.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "rewardgate=debug")
/// - `REWARDGATE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("REWARDGATE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
