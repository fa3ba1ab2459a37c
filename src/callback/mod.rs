//! Callback intake: wire DTO, validation, reward handlers, and the one-shot
//! verification and crediting pipeline.

pub mod intake;
pub mod params;
pub mod rewards;

pub use intake::{CallbackOutcome, CallbackProcessor};
pub use params::{SsvCallback, ValidatedReward};
pub use rewards::RewardRegistry;
