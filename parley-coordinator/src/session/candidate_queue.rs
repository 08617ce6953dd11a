use crate::error::EngineError;
use parley_core::IceCandidate;
use std::collections::VecDeque;
use std::future::Future;

/// Remote candidates that arrived before the remote description was set.
#[derive(Debug, Default)]
pub struct CandidateQueue {
    items: VecDeque<IceCandidate>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: IceCandidate) {
        self.items.push_back(candidate);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply every queued candidate in push order, leaving the queue empty.
    ///
    /// Stops at the first rejection; the rejected candidate and everything
    /// behind it are discarded since the session fails anyway.
    pub async fn flush<F, Fut>(&mut self, mut apply: F) -> Result<usize, EngineError>
    where
        F: FnMut(IceCandidate) -> Fut,
        Fut: Future<Output = Result<(), EngineError>>,
    {
        let mut applied = 0;
        while let Some(candidate) = self.items.pop_front() {
            if let Err(e) = apply(candidate).await {
                self.items.clear();
                return Err(e);
            }
            applied += 1;
        }
        Ok(applied)
    }
}
