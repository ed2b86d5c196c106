use crate::types::IceCandidate;
use std::collections::VecDeque;

/// Holds remote candidates until a remote description exists.
///
/// Candidates that arrive early are queued in receipt order; opening the gate
/// hands them all back, still in order, and later candidates pass straight
/// through.
#[derive(Debug, Default)]
pub struct CandidateGate {
    remote_description_set: bool,
    pending: VecDeque<IceCandidate>,
}

impl CandidateGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the candidate if it can be applied now, otherwise queues it.
    pub fn admit(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.remote_description_set {
            return Some(candidate);
        }
        tracing::debug!(
            "Queuing remote candidate until the remote description is set ({} pending)",
            self.pending.len() + 1
        );
        self.pending.push_back(candidate);
        None
    }

    /// Marks the remote description as set and drains the queue.
    pub fn open(&mut self) -> Vec<IceCandidate> {
        self.remote_description_set = true;
        self.pending.drain(..).collect()
    }

    pub fn is_open(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
