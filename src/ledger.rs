//! Transaction ledger: the append-only, uniquely-keyed record of processed
//! callbacks that makes redelivery safe.
//!
//! The dedup pre-check in the intake pipeline is an optimization; the
//! uniqueness constraint enforced by [`TransactionLedger::commit`] is the
//! actual idempotency guarantee. Implementations must claim the row under
//! that constraint before touching any balance, so the losing side of a
//! redelivery race never half-applies a reward.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{Result, RewardgateError};
use crate::players::PlayerStore;

/// One processed callback, immutable once persisted
///
/// `transaction_id` is the idempotency key; no two persisted rows share one.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationTransaction {
    pub transaction_id: String,
    /// Player id as declared by the callback; kept for audit even when the
    /// player could not be resolved
    pub player_id: Option<i64>,
    pub reward_item: String,
    pub reward_amount: Decimal,
    /// Completion time reported by the ad network
    pub ad_completion_timestamp: DateTime<Utc>,
    /// When this gateway processed the callback
    pub processed_at: DateTime<Utc>,
}

/// A pending credit to one named player balance
///
/// Carries the delta, not the result: the addition
/// `new = parse(current) + amount` happens inside the ledger commit so it
/// cannot run before the row is claimed.
#[derive(Debug, Clone)]
pub struct BalanceMutation {
    pub player_id: i64,
    /// Name of the balance on the player record, e.g. `GoldBars`
    pub balance: String,
    pub amount: Decimal,
}

/// Result of committing a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The row (and any balance mutation) was persisted
    Committed,
    /// A row with this transaction id already existed. No balance was
    /// touched; the redelivery is answered with success.
    AlreadyRecorded,
}

/// Persistence seam for the transaction ledger
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Idempotency pre-check. Advisory only: `commit` still enforces
    /// uniqueness, because two redeliveries can race past this check.
    async fn is_recorded(&self, transaction_id: &str) -> Result<bool>;

    /// Persist the transaction row and the optional balance mutation as a
    /// single unit of work
    ///
    /// The row must be claimed under the uniqueness constraint before the
    /// balance changes; a conflict yields [`CommitOutcome::AlreadyRecorded`]
    /// with balances untouched. When `mutation` is `None` only the row is
    /// written - the audit trail survives even when no reward can be
    /// granted.
    async fn commit(
        &self,
        transaction: &VerificationTransaction,
        mutation: Option<&BalanceMutation>,
    ) -> Result<CommitOutcome>;
}

/// In-memory ledger and player store (for development/testing)
///
/// In production, back both traits with the game database so the ledger row
/// and the balance mutation share one database transaction. Here a single
/// `RwLock` over the whole state gives the commit the same atomicity.
pub struct MemoryGameStore {
    state: RwLock<GameState>,
}

#[derive(Default)]
struct GameState {
    transactions: HashMap<String, VerificationTransaction>,
    /// player id -> balance name -> decimal text
    players: HashMap<i64, HashMap<String, String>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GameState::default()),
        }
    }

    /// Seed a player record with named balances
    pub async fn insert_player(&self, player_id: i64, balances: &[(&str, &str)]) {
        let mut state = self.state.write().await;
        let record = state.players.entry(player_id).or_default();
        for (name, value) in balances {
            record.insert((*name).to_string(), (*value).to_string());
        }
    }

    /// Fetch a persisted transaction by id
    pub async fn transaction(&self, transaction_id: &str) -> Option<VerificationTransaction> {
        self.state
            .read()
            .await
            .transactions
            .get(transaction_id)
            .cloned()
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_mutation(state: &mut GameState, mutation: &BalanceMutation) {
    let Some(record) = state.players.get_mut(&mutation.player_id) else {
        tracing::error!(
            player_id = mutation.player_id,
            "player disappeared before commit, reward not granted"
        );
        return;
    };

    // A balance the player has never held starts at zero.
    let current = record
        .get(&mutation.balance)
        .cloned()
        .unwrap_or_else(|| "0".to_string());

    match current.parse::<Decimal>() {
        Ok(value) => {
            let updated = (value + mutation.amount).to_string();
            tracing::info!(
                player_id = mutation.player_id,
                balance = %mutation.balance,
                new_value = %updated,
                "credited reward"
            );
            record.insert(mutation.balance.clone(), updated);
        }
        Err(_) => {
            // The row is still recorded; only the credit is skipped.
            tracing::error!(
                player_id = mutation.player_id,
                balance = %mutation.balance,
                "stored balance is not decimal text, reward not granted"
            );
        }
    }
}

#[async_trait]
impl TransactionLedger for MemoryGameStore {
    async fn is_recorded(&self, transaction_id: &str) -> Result<bool> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .contains_key(transaction_id))
    }

    async fn commit(
        &self,
        transaction: &VerificationTransaction,
        mutation: Option<&BalanceMutation>,
    ) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;

        // Claim the row first; a duplicate must not reach the mutation.
        if state
            .transactions
            .contains_key(&transaction.transaction_id)
        {
            return Ok(CommitOutcome::AlreadyRecorded);
        }
        state
            .transactions
            .insert(transaction.transaction_id.clone(), transaction.clone());

        if let Some(mutation) = mutation {
            apply_mutation(&mut state, mutation);
        }

        Ok(CommitOutcome::Committed)
    }
}

#[async_trait]
impl PlayerStore for MemoryGameStore {
    async fn lookup_player(&self, player_id: i64) -> Result<bool> {
        Ok(self.state.read().await.players.contains_key(&player_id))
    }

    async fn get_balance(&self, player_id: i64, balance: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .read()
            .await
            .players
            .get(&player_id)
            .and_then(|record| record.get(balance).cloned()))
    }

    async fn set_balance(&self, player_id: i64, balance: &str, value: String) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.players.get_mut(&player_id).ok_or_else(|| {
            RewardgateError::persistence(format!("player {} not found", player_id))
        })?;
        record.insert(balance.to_string(), value);
        Ok(())
    }
}
