//! Vote counting for one candidacy.
//!
//! A secondary whose election deadline passes becomes a candidate: it
//! bumps the term, votes for itself, and solicits votes from every
//! peer. [`VoteTally`] tracks the responses for that single term and
//! reports the moment a majority is reached.

use std::collections::HashSet;

/// Votes collected by a candidate during one election.
pub struct VoteTally {
    /// Term this candidacy is contesting.
    pub term: u64,
    votes: HashSet<String>,
    won: bool,
}

impl VoteTally {
    /// Starts a tally for `term`. The candidate's own vote is not
    /// implied; record it explicitly.
    pub fn new(term: u64) -> Self {
        Self {
            term,
            votes: HashSet::new(),
            won: false,
        }
    }

    /// Records a vote from `voter`. Returns `true` exactly once, when
    /// quorum is newly reached; duplicate voters never count twice.
    pub fn record(&mut self, voter: &str, cluster_size: usize) -> bool {
        if self.won {
            return false;
        }
        self.votes.insert(voter.to_string());
        self.won = self.votes.len() >= Self::quorum(cluster_size);
        self.won
    }

    /// Minimum votes for a strict majority of the configured cluster.
    pub fn quorum(cluster_size: usize) -> usize {
        cluster_size / 2 + 1
    }

    /// Whether this candidacy already reached quorum.
    pub fn won(&self) -> bool {
        self.won
    }

    /// Number of distinct voters recorded so far.
    pub fn count(&self) -> usize {
        self.votes.len()
    }
}
