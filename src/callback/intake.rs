use std::sync::Arc;

use chrono::Utc;

use super::params::{SsvCallback, ValidatedReward};
use super::rewards::RewardRegistry;
use crate::error::{Result, RewardgateError};
use crate::ledger::{BalanceMutation, CommitOutcome, TransactionLedger, VerificationTransaction};
use crate::players::PlayerStore;
use crate::ssv::CallbackVerifier;

/// Outcome of one processed callback
///
/// Every variant is a success response to the network; redelivery of a
/// processed transaction is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Transaction recorded and a player balance credited
    Rewarded {
        transaction_id: String,
        player_id: i64,
    },
    /// Transaction recorded without a balance change (no player resolved,
    /// or no handler for the reward item)
    Recorded { transaction_id: String },
    /// The transaction was already in the ledger; nothing was reapplied
    Duplicate { transaction_id: String },
}

/// One-shot verification and crediting pipeline
///
/// Each callback runs the same sequence: verify the signature, validate the
/// declared fields, dedup against the ledger, resolve the player, and commit
/// the transaction row together with any balance mutation as one unit of
/// work. The ledger's uniqueness constraint on the transaction id - not the
/// dedup pre-check - is what makes redelivery safe under concurrency.
pub struct CallbackProcessor {
    verifier: Arc<dyn CallbackVerifier>,
    ledger: Arc<dyn TransactionLedger>,
    players: Arc<dyn PlayerStore>,
    rewards: RewardRegistry,
}

impl CallbackProcessor {
    pub fn new(
        verifier: Arc<dyn CallbackVerifier>,
        ledger: Arc<dyn TransactionLedger>,
        players: Arc<dyn PlayerStore>,
        rewards: RewardRegistry,
    ) -> Self {
        Self {
            verifier,
            ledger,
            players,
            rewards,
        }
    }

    /// Process one callback
    ///
    /// `raw_query` is the query string exactly as received, in its original
    /// parameter order; `callback` holds the same parameters parsed into
    /// fields.
    pub async fn process(
        &self,
        raw_query: &str,
        callback: &SsvCallback,
    ) -> Result<CallbackOutcome> {
        let signature = callback.signature.as_deref().unwrap_or_default();
        let key_id = callback.key_id.as_deref().unwrap_or_default();

        if !self.verifier.verify(raw_query, signature, key_id).await {
            tracing::warn!(
                transaction_id = callback.transaction_id.as_deref().unwrap_or(""),
                key_id,
                "rejected callback: signature verification failed"
            );
            return Err(RewardgateError::SignatureInvalid);
        }

        let reward = match callback.validate() {
            Ok(reward) => reward,
            Err(err) => {
                // The signature checked out, so the network itself sent an
                // unusable payload. That warrants more than a client-error log.
                tracing::error!(
                    transaction_id = callback.transaction_id.as_deref().unwrap_or(""),
                    error = %err,
                    "verified callback carried a malformed payload"
                );
                return Err(err);
            }
        };
        tracing::info!(transaction_id = %reward.transaction_id, key_id, "callback verified");

        if let Some(custom_data) = callback.custom_data.as_deref() {
            tracing::debug!(
                transaction_id = %reward.transaction_id,
                custom_data,
                "callback carried custom data"
            );
        }

        // Dedup pre-check. Advisory: a concurrent redelivery can still pass
        // both pre-checks, which the commit below resolves.
        if self.ledger.is_recorded(&reward.transaction_id).await? {
            tracing::warn!(
                transaction_id = %reward.transaction_id,
                "duplicate transaction, responding success without reapplying"
            );
            return Ok(CallbackOutcome::Duplicate {
                transaction_id: reward.transaction_id,
            });
        }

        let resolved_player = self.resolve_player(&reward).await?;
        let mutation = resolved_player.and_then(|player_id| self.build_mutation(player_id, &reward));

        let transaction = VerificationTransaction {
            transaction_id: reward.transaction_id.clone(),
            player_id: reward.player_id,
            reward_item: reward.reward_item.clone(),
            reward_amount: reward.reward_amount,
            ad_completion_timestamp: reward.ad_completion_timestamp,
            processed_at: Utc::now(),
        };

        match self.ledger.commit(&transaction, mutation.as_ref()).await? {
            CommitOutcome::AlreadyRecorded => {
                // Lost a redelivery race at the uniqueness constraint; the
                // winner applied the reward.
                tracing::warn!(
                    transaction_id = %transaction.transaction_id,
                    "transaction committed concurrently, responding success"
                );
                Ok(CallbackOutcome::Duplicate {
                    transaction_id: transaction.transaction_id,
                })
            }
            CommitOutcome::Committed => match mutation {
                Some(mutation) => {
                    tracing::info!(
                        transaction_id = %transaction.transaction_id,
                        player_id = mutation.player_id,
                        reward_item = %transaction.reward_item,
                        "callback processed, reward credited"
                    );
                    Ok(CallbackOutcome::Rewarded {
                        transaction_id: transaction.transaction_id,
                        player_id: mutation.player_id,
                    })
                }
                None => {
                    tracing::info!(
                        transaction_id = %transaction.transaction_id,
                        "callback processed, transaction recorded without reward"
                    );
                    Ok(CallbackOutcome::Recorded {
                        transaction_id: transaction.transaction_id,
                    })
                }
            },
        }
    }

    /// Resolve the callback's player against the external store
    ///
    /// Returns `None` (record unattributed, skip the reward) when the
    /// callback carried no usable player id or the store has no such player.
    async fn resolve_player(&self, reward: &ValidatedReward) -> Result<Option<i64>> {
        let Some(player_id) = reward.player_id else {
            tracing::info!(
                transaction_id = %reward.transaction_id,
                "no player attached, transaction recorded for audit only"
            );
            return Ok(None);
        };

        if self.players.lookup_player(player_id).await? {
            Ok(Some(player_id))
        } else {
            tracing::error!(
                transaction_id = %reward.transaction_id,
                player_id,
                "player not found, transaction recorded but reward not granted"
            );
            Ok(None)
        }
    }

    fn build_mutation(&self, player_id: i64, reward: &ValidatedReward) -> Option<BalanceMutation> {
        match self.rewards.resolve(&reward.reward_item) {
            Some(balance) => Some(BalanceMutation {
                player_id,
                balance: balance.to_string(),
                amount: reward.reward_amount,
            }),
            None => {
                tracing::warn!(
                    transaction_id = %reward.transaction_id,
                    reward_item = %reward.reward_item,
                    player_id,
                    "no handler for reward item, transaction recorded without credit"
                );
                None
            }
        }
    }
}
