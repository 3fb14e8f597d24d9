//! Resumable session state of one shard

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Session established by a successful identify
///
/// The sequence counter is shared with the heartbeat task, which reads it
/// for every heartbeat it sends.
#[derive(Debug, Clone)]
pub struct Session {
    shard_id: u32,
    id: String,
    resume_url: Option<String>,
    sequence: Arc<Sequence>,
}

impl Session {
    pub fn new(
        shard_id: u32,
        id: impl Into<String>,
        resume_url: Option<String>,
        sequence: Arc<Sequence>,
    ) -> Self {
        Self {
            shard_id,
            id: id.into(),
            resume_url,
            sequence,
        }
    }

    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resume_url(&self) -> Option<&str> {
        self.resume_url.as_deref()
    }

    /// Last sequence received in this session
    pub fn sequence(&self) -> Option<u64> {
        self.sequence.get()
    }
}

/// Last dispatch sequence seen on a shard; 0 stands for "none yet"
#[derive(Debug, Default)]
pub struct Sequence(AtomicU64);

impl Sequence {
    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            seq => Some(seq),
        }
    }

    /// Record `seq` if it advances the counter; returns false for a replayed or stale sequence
    pub fn advance(&self, seq: u64) -> bool {
        self.0.fetch_max(seq, Ordering::AcqRel) < seq
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_only_advances() {
        let seq = Sequence::default();
        assert_eq!(seq.get(), None);
        assert!(seq.advance(1));
        assert!(seq.advance(2));
        assert!(!seq.advance(2));
        assert!(!seq.advance(1));
        assert_eq!(seq.get(), Some(2));
        seq.reset();
        assert_eq!(seq.get(), None);
    }

    #[test]
    fn test_session_reads_shared_sequence() {
        let seq = Arc::new(Sequence::default());
        let session = Session::new(3, "abc", Some("wss://resume".into()), Arc::clone(&seq));
        assert_eq!(session.sequence(), None);
        seq.advance(17);
        assert_eq!(session.sequence(), Some(17));
        assert_eq!(session.id(), "abc");
        assert_eq!(session.shard_id(), 3);
        assert_eq!(session.resume_url(), Some("wss://resume"));
    }
}
