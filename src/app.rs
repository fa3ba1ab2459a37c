use std::sync::Arc;

use crate::callback::{CallbackProcessor, RewardRegistry};
use crate::config::Config;
use crate::error::{Result, RewardgateError};
use crate::keys::KeyDirectoryCache;
use crate::ledger::TransactionLedger;
use crate::players::PlayerStore;
use crate::ssv::{CallbackVerifier, EcdsaCallbackVerifier};

/// Application context for dependency injection and shared state
///
/// Holds the assembled callback pipeline plus the key cache (exposed for
/// operational force-refresh). Cheap to clone; handlers receive it as axum
/// state.
#[derive(Clone)]
pub struct AppContext {
    pub keys: Arc<KeyDirectoryCache>,
    pub processor: Arc<CallbackProcessor>,
}

impl AppContext {
    /// Builder pattern for constructing AppContext
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }
}

/// Builder for [`AppContext`]
///
/// The ledger and player store have no default: they are the seams to the
/// game's persistence and must be provided. The verifier defaults to ECDSA
/// over the key directory cache; tests may substitute their own.
pub struct AppContextBuilder {
    config: Config,
    ledger: Option<Arc<dyn TransactionLedger>>,
    players: Option<Arc<dyn PlayerStore>>,
    rewards: RewardRegistry,
    verifier: Option<Arc<dyn CallbackVerifier>>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            ledger: None,
            players: None,
            rewards: RewardRegistry::default(),
            verifier: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn TransactionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_players(mut self, players: Arc<dyn PlayerStore>) -> Self {
        self.players = Some(players);
        self
    }

    pub fn with_rewards(mut self, rewards: RewardRegistry) -> Self {
        self.rewards = rewards;
        self
    }

    /// Override the signature verifier (testing)
    pub fn with_verifier(mut self, verifier: Arc<dyn CallbackVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn build(self) -> Result<AppContext> {
        let ledger = self
            .ledger
            .ok_or_else(|| RewardgateError::internal("Transaction ledger not configured"))?;
        let players = self
            .players
            .ok_or_else(|| RewardgateError::internal("Player store not configured"))?;

        let keys = Arc::new(KeyDirectoryCache::new(&self.config.key_directory)?);
        let verifier = self
            .verifier
            .unwrap_or_else(|| Arc::new(EcdsaCallbackVerifier::new(keys.clone())));
        let processor = Arc::new(CallbackProcessor::new(
            verifier,
            ledger,
            players,
            self.rewards,
        ));

        Ok(AppContext { keys, processor })
    }
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryGameStore;

    #[test]
    fn test_build_requires_ledger_and_players() {
        let result = AppContext::builder().build();
        assert!(result.is_err());

        let store = Arc::new(MemoryGameStore::new());
        let result = AppContext::builder().with_ledger(store).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_with_stores() {
        let store = Arc::new(MemoryGameStore::new());
        let context = AppContext::builder()
            .with_ledger(store.clone())
            .with_players(store)
            .build()
            .unwrap();

        // Context is clonable shared state.
        let _clone = context.clone();
    }
}
