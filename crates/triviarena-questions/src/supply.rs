//! Per-lobby prefetch queue.
//!
//! Each running game owns one [`QuestionSupply`]. A background task
//! tops the queue up on a fixed interval so the next question is
//! usually ready the moment a round needs it; when the queue runs dry
//! the supply falls back to fetching inline.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::question::{fallback_question, Difficulty, Question};
use crate::source::{QuestionSource, SourceError};

/// Tuning for the prefetch task.
#[derive(Debug, Clone, Copy)]
pub struct SupplyConfig {
    /// Refill only runs while the queue holds fewer than this many.
    pub low_water: usize,
    /// How often the refill task wakes up.
    pub refill_interval: Duration,
    /// Direct fetch attempts before a round start settles for the
    /// built-in fallback question.
    pub start_retries: u32,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            low_water: 2,
            refill_interval: Duration::from_secs(2),
            start_retries: 3,
        }
    }
}

struct SupplyState {
    queue: VecDeque<Question>,
    // Question texts already queued or handed out, kept for the life
    // of the supply so one game never repeats itself.
    seen: HashSet<String>,
}

/// Prefetching question queue with a background refill task.
///
/// Dropping the supply aborts the refill task, so a finished game
/// leaves nothing running.
pub struct QuestionSupply<S: QuestionSource> {
    source: Arc<S>,
    state: Arc<Mutex<SupplyState>>,
    config: SupplyConfig,
    refill: JoinHandle<()>,
}

impl<S: QuestionSource> QuestionSupply<S> {
    pub fn start(source: Arc<S>, config: SupplyConfig) -> Self {
        let state = Arc::new(Mutex::new(SupplyState {
            queue: VecDeque::new(),
            seen: HashSet::new(),
        }));
        let refill = tokio::spawn(refill_loop(
            Arc::clone(&source),
            Arc::clone(&state),
            config,
        ));
        Self {
            source,
            state,
            config,
            refill,
        }
    }

    /// First question of a round. Retries the source a few times and
    /// falls back to a built-in question rather than failing the start.
    pub async fn draw_first(&self) -> Question {
        for attempt in 1..=self.config.start_retries {
            match self.source.fetch(Difficulty::random_weighted()).await {
                Ok(question) => {
                    self.state.lock().await.seen.insert(question.text.clone());
                    return question;
                }
                Err(error) => {
                    warn!(attempt, %error, "first question fetch failed");
                }
            }
        }
        warn!("question source down, starting with the built-in fallback");
        fallback_question()
    }

    /// Next queued question, oldest first. On an empty queue this
    /// fetches inline; the one failure case callers must handle is the
    /// source erroring during that inline fetch.
    pub async fn dequeue(&self) -> Result<Question, SourceError> {
        if let Some(question) = self.state.lock().await.queue.pop_front() {
            return Ok(question);
        }
        // Underrun fetches skip the duplicate filter.
        let question = self.source.fetch(Difficulty::random_weighted()).await?;
        self.state.lock().await.seen.insert(question.text.clone());
        Ok(question)
    }

    pub async fn queued(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Stops the refill task. Idempotent; also happens on drop.
    pub fn stop(&self) {
        self.refill.abort();
    }
}

impl<S: QuestionSource> Drop for QuestionSupply<S> {
    fn drop(&mut self) {
        self.refill.abort();
    }
}

async fn refill_loop<S: QuestionSource>(
    source: Arc<S>,
    state: Arc<Mutex<SupplyState>>,
    config: SupplyConfig,
) {
    loop {
        tokio::time::sleep(config.refill_interval).await;

        let below = {
            let s = state.lock().await;
            s.queue.len() < config.low_water
        };
        if !below {
            continue;
        }

        // One fetch per wake keeps the provider load flat.
        match source.fetch(Difficulty::random_weighted()).await {
            Ok(question) => {
                let mut s = state.lock().await;
                if !s.seen.insert(question.text.clone()) {
                    debug!(text = %question.text, "dropping duplicate question");
                    continue;
                }
                s.queue.push_back(question);
            }
            Err(error) => {
                warn!(%error, "question refill failed, retrying next interval");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_config_defaults() {
        let config = SupplyConfig::default();
        assert_eq!(config.low_water, 2);
        assert_eq!(config.refill_interval, Duration::from_secs(2));
        assert_eq!(config.start_retries, 3);
    }
}
