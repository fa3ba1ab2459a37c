use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{Result, RewardgateError};

/// Raw callback query fields as sent by the ad network
///
/// Everything is optional at the wire level; [`SsvCallback::validate`]
/// enforces what the crediting pipeline actually relies on. The original
/// ordered query string is carried separately for canonicalization - this
/// struct is never the input to signature verification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SsvCallback {
    pub ad_network: Option<String>,
    pub ad_unit: Option<String>,
    pub custom_data: Option<String>,
    pub key_id: Option<String>,
    pub reward_amount: Option<String>,
    pub reward_item: Option<String>,
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub transaction_id: Option<String>,
    pub user_id: Option<String>,
}

/// Callback fields after exhaustive validation
#[derive(Debug, Clone)]
pub struct ValidatedReward {
    pub transaction_id: String,
    pub reward_item: String,
    pub reward_amount: Decimal,
    /// Parsed from `user_id`; `None` when absent or unparseable (the
    /// transaction is then recorded unattributed rather than rejected)
    pub player_id: Option<i64>,
    pub ad_completion_timestamp: DateTime<Utc>,
}

impl SsvCallback {
    /// Validate the fields the pipeline requires
    ///
    /// `transaction_id` and `reward_item` must be present and non-empty, and
    /// `reward_amount` must parse as a non-negative decimal. `user_id` and
    /// `timestamp` are lenient: a missing or unparseable value downgrades
    /// with a warning instead of rejecting.
    pub fn validate(&self) -> Result<ValidatedReward> {
        let transaction_id = match self.transaction_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(RewardgateError::payload_malformed("missing transaction_id"));
            }
        };

        let reward_item = match self.reward_item.as_deref() {
            Some(item) if !item.is_empty() => item.to_string(),
            _ => {
                return Err(RewardgateError::payload_malformed("missing reward_item"));
            }
        };

        let raw_amount = self
            .reward_amount
            .as_deref()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| RewardgateError::payload_malformed("missing reward_amount"))?;
        let reward_amount: Decimal = raw_amount.parse().map_err(|_| {
            RewardgateError::payload_malformed(format!("invalid reward_amount '{}'", raw_amount))
        })?;
        if reward_amount.is_sign_negative() {
            return Err(RewardgateError::payload_malformed(format!(
                "negative reward_amount '{}'",
                raw_amount
            )));
        }

        Ok(ValidatedReward {
            player_id: self.parse_player_id(&transaction_id),
            ad_completion_timestamp: self.parse_timestamp(&transaction_id),
            transaction_id,
            reward_item,
            reward_amount,
        })
    }

    fn parse_player_id(&self, transaction_id: &str) -> Option<i64> {
        let user_id = self.user_id.as_deref().filter(|value| !value.is_empty())?;
        match user_id.parse() {
            Ok(player_id) => Some(player_id),
            Err(_) => {
                tracing::warn!(
                    transaction_id,
                    user_id,
                    "unparseable user_id, proceeding without a player"
                );
                None
            }
        }
    }

    fn parse_timestamp(&self, transaction_id: &str) -> DateTime<Utc> {
        let raw = self.timestamp.as_deref().filter(|value| !value.is_empty());
        match raw
            .and_then(|value| value.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
        {
            Some(timestamp) => timestamp,
            None => {
                if let Some(raw) = raw {
                    tracing::warn!(
                        transaction_id,
                        timestamp = raw,
                        "unparseable timestamp, using processing time"
                    );
                }
                Utc::now()
            }
        }
    }
}
