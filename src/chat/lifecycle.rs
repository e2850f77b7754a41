//! Per-request state machine of the chat handler.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::{AppError, AppResult};

/// Phases a chat request moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Idle,
    DatasetResolved,
    PromptBuilt,
    ModelResolved,
    Dispatched,
    Streaming,
    Completed,
    Failed,
}

impl ChatPhase {
    /// Successor on the happy path. Terminal phases have none.
    pub fn next(self) -> Option<ChatPhase> {
        match self {
            ChatPhase::Idle => Some(ChatPhase::DatasetResolved),
            ChatPhase::DatasetResolved => Some(ChatPhase::PromptBuilt),
            ChatPhase::PromptBuilt => Some(ChatPhase::ModelResolved),
            ChatPhase::ModelResolved => Some(ChatPhase::Dispatched),
            ChatPhase::Dispatched => Some(ChatPhase::Streaming),
            ChatPhase::Streaming => Some(ChatPhase::Completed),
            ChatPhase::Completed | ChatPhase::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ChatPhase::Completed | ChatPhase::Failed)
    }
}

/// Tracks one request through its phases and logs the outcome.
#[derive(Debug)]
pub struct RequestLifecycle {
    id: Uuid,
    phase: ChatPhase,
    chunks: usize,
    chars: usize,
}

impl RequestLifecycle {
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: ChatPhase::Idle,
            chunks: 0,
            chars: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    /// Move to the next phase. Phases cannot be skipped.
    pub fn advance(&mut self, next: ChatPhase) {
        debug_assert_eq!(
            self.phase.next(),
            Some(next),
            "invalid chat phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(request_id = %self.id, from = ?self.phase, to = ?next, "Chat phase transition");
        self.phase = next;
    }

    /// Advance on success, fail on error.
    pub fn step<T>(&mut self, next: ChatPhase, result: AppResult<T>) -> AppResult<T> {
        match result {
            Ok(value) => {
                self.advance(next);
                Ok(value)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    pub fn fail(&mut self, error: AppError) -> AppError {
        if !self.phase.is_terminal() {
            warn!(
                request_id = %self.id,
                phase = ?self.phase,
                code = error.code(),
                error = %error,
                "Chat request failed"
            );
            self.phase = ChatPhase::Failed;
        }
        error
    }

    pub fn record_chunk(&mut self, chunk: &str) {
        self.chunks += 1;
        self.chars += chunk.len();
    }

    pub fn complete(&mut self) {
        if self.phase == ChatPhase::Streaming {
            self.advance(ChatPhase::Completed);
            info!(
                request_id = %self.id,
                chunks = self.chunks,
                chars = self.chars,
                "Chat response completed"
            );
        }
    }
}

impl Drop for RequestLifecycle {
    fn drop(&mut self) {
        if !self.phase.is_terminal() && self.phase != ChatPhase::Idle {
            info!(
                request_id = %self.id,
                phase = ?self.phase,
                chunks = self.chunks,
                "Chat request abandoned before completion"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut lifecycle = RequestLifecycle::start();
        let mut phase = ChatPhase::Idle;
        while let Some(next) = phase.next() {
            lifecycle.advance(next);
            phase = next;
        }
        assert_eq!(lifecycle.phase(), ChatPhase::Completed);
    }

    #[test]
    #[should_panic(expected = "invalid chat phase transition")]
    fn test_cannot_skip_phase() {
        let mut lifecycle = RequestLifecycle::start();
        lifecycle.advance(ChatPhase::PromptBuilt);
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut lifecycle = RequestLifecycle::start();
        let result: AppResult<()> = lifecycle.step(
            ChatPhase::DatasetResolved,
            Err(AppError::InvalidRequest("bad".to_string())),
        );
        assert!(result.is_err());
        assert_eq!(lifecycle.phase(), ChatPhase::Failed);

        lifecycle.complete();
        assert_eq!(lifecycle.phase(), ChatPhase::Failed);
    }

    #[test]
    fn test_step_advances_on_success() {
        let mut lifecycle = RequestLifecycle::start();
        let value = lifecycle.step(ChatPhase::DatasetResolved, Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert_eq!(lifecycle.phase(), ChatPhase::DatasetResolved);
    }
}
