//! Collaborator seam to the external player store.
//!
//! The gateway never owns player records; it only checks that a callback's
//! player exists and reads/updates specific named balances through this
//! trait. Balances are decimal text because idle-game values routinely
//! outgrow fixed-width integers.

use async_trait::async_trait;

use crate::error::Result;

/// Read/update access to player records in the external game store
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Look up a player by id, returning whether the record exists
    async fn lookup_player(&self, player_id: i64) -> Result<bool>;

    /// Read a named decimal-text balance from a player record
    ///
    /// `None` means the player has no such balance yet (treated as zero by
    /// reward application).
    async fn get_balance(&self, player_id: i64, balance: &str) -> Result<Option<String>>;

    /// Replace a named decimal-text balance on a player record
    async fn set_balance(&self, player_id: i64, balance: &str, value: String) -> Result<()>;
}
