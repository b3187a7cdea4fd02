//! Cluster coordination for a running node.
//!
//! Wraps the pure [`ClusterState`] machine in a mutex and drives it
//! from timers and incoming peer messages. Three background tasks are
//! spawned at startup and live until shutdown, each checking role
//! before doing work:
//!
//! - the heartbeat emitter announces a primary to every peer every
//!   heartbeat interval;
//! - the election monitor stands a secondary for election when its
//!   randomized deadline passes without a heartbeat;
//! - the sync task lets a secondary pull log entries it missed from
//!   the node it last heard a heartbeat from.
//!
//! The state lock is held only to inspect or update state; every
//! outbound call works from a snapshot taken under the lock.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use cinder_cluster::{
    ClusterConfig, ClusterState, HeartbeatOutcome, NodeRole, PeerSpec, Timing, VoteOutcome,
    VoteTally,
};
use cinder_core::Store;
use cinder_protocol::PeerMessage;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How often the election monitor re-checks the deadline.
const ELECTION_POLL: Duration = Duration::from_millis(250);

pub struct ClusterManager {
    node_id: String,
    timing: Timing,
    state: Mutex<ClusterState>,
}

impl ClusterManager {
    pub fn new(
        config: ClusterConfig,
        timing: Timing,
        node_id: impl Into<String>,
        bootstrap_primary: bool,
    ) -> Arc<Self> {
        let node_id = node_id.into();
        let state = ClusterState::new(
            config,
            timing.clone(),
            node_id.clone(),
            bootstrap_primary,
            Instant::now(),
        );
        Arc::new(Self {
            node_id,
            timing,
            state: Mutex::new(state),
        })
    }

    /// State is still coherent after a panic elsewhere; keep serving.
    fn locked(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- inspection --

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn is_primary(&self) -> bool {
        self.locked().is_primary()
    }

    pub fn role(&self) -> NodeRole {
        self.locked().role()
    }

    pub fn current_term(&self) -> u64 {
        self.locked().current_term()
    }

    /// Role and term read under one lock, for a consistent STATUS line.
    pub fn status(&self) -> (NodeRole, u64) {
        let state = self.locked();
        (state.role(), state.current_term())
    }

    /// Replication fan-out targets.
    pub fn secondary_peers(&self) -> Vec<PeerSpec> {
        self.locked().secondary_peers()
    }

    // -- message handling (called by the command handler) --

    /// Handles a HEARTBEAT from `from` carrying `term`.
    pub fn handle_heartbeat(&self, from: &str, term: u64) -> HeartbeatOutcome {
        let outcome = self.locked().record_heartbeat(from, term, Instant::now());
        if let HeartbeatOutcome::Accepted { stepped_down: true } = outcome {
            info!(from, term, "observed a newer primary; stepping down to secondary");
        }
        outcome
    }

    /// Handles an ELECTION vote request. Returns the outcome and the
    /// term after handling, which the response carries back.
    pub fn handle_vote_request(&self, candidate: &str, term: u64) -> (VoteOutcome, u64) {
        let mut state = self.locked();
        let was_primary = state.is_primary();
        let outcome = state.handle_vote_request(candidate, term, Instant::now());
        let current = state.current_term();
        drop(state);

        match &outcome {
            VoteOutcome::Granted => {
                if was_primary && !self.is_primary() {
                    info!(candidate, term, "stepped down for a higher-term candidate");
                }
                debug!(candidate, term, "vote granted");
            }
            VoteOutcome::StaleTerm { current } => {
                debug!(candidate, term, current, "refused stale-term vote request");
            }
            VoteOutcome::AlreadyVoted { voted_for } => {
                debug!(candidate, term, voted_for = %voted_for, "already voted this term");
            }
        }
        (outcome, current)
    }

    /// Handles a REGISTER_NODE peer-table update.
    pub fn register_node(&self, spec: PeerSpec, role: Option<NodeRole>) {
        debug!(peer = %spec.id, "peer registered");
        self.locked().register_node(spec, role);
    }

    // -- background tasks --

    /// Spawns the heartbeat emitter, election monitor, and sync task.
    /// All three stop when `shutdown` fires.
    pub fn spawn_background_tasks(
        self: &Arc<Self>,
        store: Arc<Store>,
        shutdown: watch::Receiver<bool>,
    ) {
        self.spawn_heartbeat_emitter(shutdown.clone());
        self.spawn_election_monitor(shutdown.clone());
        self.spawn_sync_task(store, shutdown);
    }

    fn spawn_heartbeat_emitter(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mgr = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(mgr.timing.heartbeat_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => mgr.emit_heartbeats(),
                }
            }
        });
    }

    /// Sends one heartbeat round to every peer, best-effort. Does
    /// nothing unless this node is primary.
    fn emit_heartbeats(self: &Arc<Self>) {
        let (term, peers) = {
            let state = self.locked();
            if !state.is_primary() {
                return;
            }
            (state.current_term(), state.peer_specs())
        };

        for peer in peers {
            let msg = PeerMessage::Heartbeat {
                from_node: self.node_id.clone(),
                term,
            };
            let mgr = Arc::clone(self);
            let budget = self.timing.peer_call_timeout;
            tokio::spawn(async move {
                match crate::peer::call(&peer.addr(), &msg, budget).await {
                    Ok(resp) if resp.is_ok() => {}
                    Ok(resp) => {
                        // a refusal with a newer term means another
                        // primary owns the cluster now
                        if let Some(their_term) = resp.term {
                            if mgr.locked().observe_term(their_term, Instant::now()) {
                                info!(
                                    peer = %peer.id,
                                    term = their_term,
                                    "heartbeat refused with a newer term; stepping down"
                                );
                            }
                        }
                    }
                    Err(e) => debug!(peer = %peer.id, "heartbeat not delivered: {e}"),
                }
            });
        }
    }

    fn spawn_election_monitor(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mgr = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(ELECTION_POLL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        if mgr.locked().election_due(Instant::now()) {
                            mgr.run_election().await;
                        }
                    }
                }
            }
        });
    }

    /// One full candidacy: bump the term, self-vote, solicit the peers
    /// in parallel, and promote if a majority answers in time.
    async fn run_election(self: &Arc<Self>) {
        let (term, peers, cluster_size) = {
            let mut state = self.locked();
            let term = state.begin_candidacy(Instant::now());
            (term, state.peer_specs(), state.cluster_size())
        };
        info!(term, "no heartbeat before the election deadline; standing for election");

        let mut tally = VoteTally::new(term);
        tally.record(&self.node_id, cluster_size);

        let mut requests = JoinSet::new();
        for peer in peers {
            let msg = PeerMessage::Election {
                candidate_id: self.node_id.clone(),
                term,
            };
            let budget = self.timing.peer_call_timeout;
            requests.spawn(async move {
                let result = crate::peer::call(&peer.addr(), &msg, budget).await;
                (peer.id, result)
            });
        }

        while let Some(joined) = requests.join_next().await {
            let Ok((peer_id, result)) = joined else { continue };
            match result {
                Ok(resp)
                    if resp.is_ok()
                        && resp.message.as_deref() == Some("Vote granted")
                        && resp.term == Some(term) =>
                {
                    if tally.record(&peer_id, cluster_size) {
                        break;
                    }
                }
                Ok(resp) => {
                    // refusal may carry a newer term worth adopting
                    if let Some(their_term) = resp.term {
                        self.locked().observe_term(their_term, Instant::now());
                    }
                    debug!(
                        peer = %peer_id,
                        reply = resp.message.as_deref().unwrap_or(""),
                        "vote refused"
                    );
                }
                Err(e) => debug!(peer = %peer_id, "vote request failed: {e}"),
            }
        }

        let mut state = self.locked();
        if tally.won() && state.become_primary(term) {
            info!(term, votes = tally.count(), "election won; now serving as primary");
        } else {
            state.reset_election_deadline(Instant::now());
            info!(
                term,
                votes = tally.count(),
                quorum = VoteTally::quorum(cluster_size),
                "election not won; retrying after the next timeout"
            );
        }
    }

    fn spawn_sync_task(self: &Arc<Self>, store: Arc<Store>, mut shutdown: watch::Receiver<bool>) {
        let mgr = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(mgr.timing.sync_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => mgr.sync_once(&store).await,
                }
            }
        });
    }

    /// Pulls log entries newer than our cursor from the presumed
    /// primary and applies them in order. Repairs gaps left by dropped
    /// REPLICATE calls.
    async fn sync_once(&self, store: &Store) {
        let target = {
            let state = self.locked();
            if state.is_primary() {
                return;
            }
            state.primary_hint().cloned()
        };
        // no heartbeat accepted yet — nobody to pull from
        let Some(target) = target else { return };

        let msg = PeerMessage::Sync {
            from_node: self.node_id.clone(),
            since_timestamp: store.sync_cursor(),
        };
        match crate::peer::call(&target.addr(), &msg, self.timing.peer_call_timeout).await {
            Ok(resp) if resp.is_ok() => {
                let entries = resp.entries.unwrap_or_default();
                if !entries.is_empty() {
                    for entry in &entries {
                        store.apply_log_entry(entry);
                    }
                    debug!(
                        from = %target.id,
                        count = entries.len(),
                        "applied missed log entries via sync"
                    );
                }
            }
            Ok(resp) => warn!(
                from = %target.id,
                reply = resp.message.as_deref().unwrap_or(""),
                "sync request refused"
            ),
            Err(e) => debug!(from = %target.id, "sync not delivered: {e}"),
        }
    }
}
