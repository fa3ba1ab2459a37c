use std::collections::HashMap;

/// Registry of reward handlers
///
/// Maps the network's `reward_item` name (as configured on the ad unit) to
/// the named player balance it credits. Lookup is case-insensitive because
/// ad-unit configuration is hand-typed. An unrecognized name resolves to no
/// handler: the transaction is still recorded, so a new ad-unit
/// configuration can ship before its handler does.
#[derive(Debug, Clone)]
pub struct RewardRegistry {
    handlers: HashMap<String, String>,
}

impl RewardRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the stock handlers: `GoldBars` credits the GoldBars
    /// balance, `Score` credits CurrentScore
    pub fn with_defaults() -> Self {
        Self::new()
            .register("GoldBars", "GoldBars")
            .register("Score", "CurrentScore")
    }

    /// Register a handler crediting `balance` when `reward_item` arrives
    pub fn register(mut self, reward_item: impl Into<String>, balance: impl Into<String>) -> Self {
        self.handlers
            .insert(reward_item.into().to_lowercase(), balance.into());
        self
    }

    /// Resolve the balance credited by `reward_item`, if a handler exists
    pub fn resolve(&self, reward_item: &str) -> Option<&str> {
        self.handlers
            .get(&reward_item.to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for RewardRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
