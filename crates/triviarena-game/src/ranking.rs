//! Win-count persistence seam.
//!
//! At round end, a winner with a linked account gets one win recorded
//! in an external store. The call is fire-and-forget: a store failure
//! is logged and the round finalizes regardless.

use thiserror::Error;

use triviarena_protocol::AccountId;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("ranking store unavailable: {0}")]
    Unavailable(String),
}

/// Pluggable win-count store.
pub trait RankingStore: Send + Sync + 'static {
    fn increment_win_count(
        &self,
        account: &AccountId,
    ) -> impl std::future::Future<Output = Result<(), RankingError>> + Send;
}

/// Store that records nothing. Used for anonymous-only deployments and
/// in tests.
pub struct NoopRankingStore;

impl RankingStore for NoopRankingStore {
    async fn increment_win_count(&self, _account: &AccountId) -> Result<(), RankingError> {
        Ok(())
    }
}
