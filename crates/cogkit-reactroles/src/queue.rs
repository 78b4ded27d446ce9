//! Role-delta coalescing queue.
//!
//! Reaction events for the same (guild, user) subject arriving before the
//! worker reaches that subject are merged into one [`PendingDelta`] and
//! applied as a single batched membership edit. The map of pending deltas
//! and the dispatch queue are owned exclusively by this module.
//!
//! Concurrency model: producers call [`RoleQueue::enqueue`] from any task;
//! the map sits behind a `std::sync::Mutex` that is only held across
//! synchronous map mutation, never across an await. Dispatch order is FIFO
//! per key-push over an unbounded channel. One worker exists per process,
//! so at most one membership edit is in flight per subject.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use cogkit_core::{GuildId, Members, PlatformError, RoleId, Subject, UserId};

use crate::delta::PendingDelta;

struct QueueState {
    /// At most one entry per subject; presence means the subject key is
    /// somewhere in the dispatch channel.
    pending: Mutex<HashMap<Subject, PendingDelta>>,
}

/// Producer handle: enqueue role deltas from event handlers.
///
/// Cheap to clone; all clones feed the same worker.
pub struct RoleQueue<M: Members + ?Sized> {
    members: Arc<M>,
    state: Arc<QueueState>,
    tx: mpsc::UnboundedSender<Subject>,
}

impl<M: Members + ?Sized> Clone for RoleQueue<M> {
    fn clone(&self) -> Self {
        Self {
            members: Arc::clone(&self.members),
            state: Arc::clone(&self.state),
            tx: self.tx.clone(),
        }
    }
}

impl<M: Members + ?Sized> RoleQueue<M> {
    /// Merge one role mutation into the subject's pending delta.
    ///
    /// The first event for a subject creates its delta and schedules the
    /// subject exactly once; every later event merges in place without
    /// re-scheduling. `linked` holds the roles mutually exclusive with
    /// `role` (empty when the role is unlinked). Pure in-memory mutation,
    /// never blocks.
    pub fn enqueue(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
        grant: bool,
        linked: &HashSet<RoleId>,
    ) {
        let subject = Subject::new(guild, user);
        let mut pending = self.state.pending.lock().unwrap();
        match pending.entry(subject) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                entry.get_mut().apply(role, grant, linked);
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                let mut delta =
                    PendingDelta::new(guild, user, self.members.everyone_role(guild));
                delta.apply(role, grant, linked);
                entry.insert(delta);
                // Send cannot fail while the worker half is alive; once the
                // worker is gone the delta is abandoned anyway.
                let _ = self.tx.send(subject);
            }
        }
    }

    /// Number of subjects with an unprocessed delta.
    pub fn pending_subjects(&self) -> usize {
        self.state.pending.lock().unwrap().len()
    }
}

/// Single long-lived consumer loop; one per process.
pub struct RoleQueueWorker<M: Members + ?Sized> {
    members: Arc<M>,
    state: Arc<QueueState>,
    rx: mpsc::UnboundedReceiver<Subject>,
    tx: mpsc::UnboundedSender<Subject>,
    /// Fixed-rate pause after every attempt; `Duration::ZERO` disables it.
    pause: Duration,
}

/// Build the queue handle and its worker.
///
/// `max_processed_per_second` sets the fixed-rate throttle between
/// attempts (default 5/s → 200 ms); `0` disables the pause.
pub fn role_queue<M: Members + ?Sized>(
    members: Arc<M>,
    max_processed_per_second: u32,
) -> (RoleQueue<M>, RoleQueueWorker<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = Arc::new(QueueState {
        pending: Mutex::new(HashMap::new()),
    });
    let pause = if max_processed_per_second == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(1) / max_processed_per_second
    };
    let queue = RoleQueue {
        members: Arc::clone(&members),
        state: Arc::clone(&state),
        tx: tx.clone(),
    };
    let worker = RoleQueueWorker {
        members,
        state,
        rx,
        tx,
        pause,
    };
    (queue, worker)
}

impl<M: Members + ?Sized> RoleQueueWorker<M> {
    /// Process subjects in FIFO order until `shutdown` flips to true.
    ///
    /// Unprocessed deltas are abandoned on shutdown; guild membership is
    /// the source of truth and the queue only holds in-flight edits.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("role queue worker started");
        loop {
            let subject = tokio::select! {
                maybe = self.rx.recv() => match maybe {
                    Some(subject) => subject,
                    None => break,
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };
            // Stale keys (a requeue push duplicating an enqueue push) pop
            // no delta and cost no pause slot.
            if self.process(subject).await && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }
        info!("role queue worker stopped");
    }

    /// Returns true when an attempt was made against the platform, false
    /// when the key was stale and nothing happened.
    async fn process(&self, subject: Subject) -> bool {
        // Pop the delta; events arriving from here on start a fresh one.
        let delta = {
            let mut pending = self.state.pending.lock().unwrap();
            match pending.remove(&subject) {
                Some(delta) => delta,
                None => return false,
            }
        };

        // Read membership fresh at apply time, not at merge time.
        let current = match self
            .members
            .member_roles(subject.guild_id, subject.user_id)
            .await
        {
            Ok(roles) => roles,
            Err(PlatformError::NotFound(reason)) => {
                // Terminal: retrying cannot bring the member back.
                warn!(subject = %subject, %reason, "subject unavailable, dropping role delta");
                return true;
            }
            Err(e) => {
                warn!(subject = %subject, error = %e, "membership read failed, requeueing");
                self.requeue(subject, delta);
                return true;
            }
        };

        let target = delta.target_roles(&current);
        match self
            .members
            .replace_member_roles(subject.guild_id, subject.user_id, &target)
            .await
        {
            Ok(()) => {
                debug!(subject = %subject, roles = target.len(), "applied role delta");
            }
            Err(e) => {
                // Permission denial and transient failures alike: retry
                // forever at the fixed pace, round-robin with the rest of
                // the queue. No backoff, no attempt cap.
                warn!(subject = %subject, error = %e, "role edit rejected, requeueing");
                self.requeue(subject, delta);
            }
        }
        true
    }

    /// Re-store the failed delta and push the subject to the back of the
    /// queue. Overwrites any delta created while the edit was in flight.
    fn requeue(&self, subject: Subject, delta: PendingDelta) {
        self.state.pending.lock().unwrap().insert(subject, delta);
        let _ = self.tx.send(subject);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::time::Instant;

    const EVERYONE: u64 = 1000;

    /// Scripted membership stub recording every mutator call.
    struct MockMembers {
        /// Current roles per subject; `None` entries report NotFound.
        roles: Mutex<HashMap<Subject, Option<Vec<RoleId>>>>,
        /// Mutator calls observed: (subject, target set, at).
        calls: Mutex<Vec<(Subject, Vec<RoleId>, Instant)>>,
        /// Outcomes to script before the mutator starts succeeding.
        failures: Mutex<Vec<PlatformError>>,
        /// Every mutator invocation, successful or not.
        attempts: std::sync::atomic::AtomicUsize,
    }

    impl MockMembers {
        fn new() -> Self {
            Self {
                roles: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                failures: Mutex::new(Vec::new()),
                attempts: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn with_member(self, subject: Subject, roles: &[u64]) -> Self {
            self.roles.lock().unwrap().insert(
                subject,
                Some(roles.iter().map(|r| RoleId(*r)).collect()),
            );
            self
        }

        fn with_missing_member(self, subject: Subject) -> Self {
            self.roles.lock().unwrap().insert(subject, None);
            self
        }

        fn fail_next(&self, error: PlatformError) {
            self.failures.lock().unwrap().push(error);
        }

        fn calls(&self) -> Vec<(Subject, Vec<RoleId>)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(s, r, _)| (*s, r.clone()))
                .collect()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(_, _, t)| *t).collect()
        }

        fn attempts(&self) -> usize {
            self.attempts.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Members for MockMembers {
        fn everyone_role(&self, _guild: GuildId) -> RoleId {
            RoleId(EVERYONE)
        }

        async fn member_roles(
            &self,
            guild: GuildId,
            user: UserId,
        ) -> Result<Vec<RoleId>, PlatformError> {
            let subject = Subject::new(guild, user);
            match self.roles.lock().unwrap().get(&subject) {
                Some(Some(roles)) => Ok(roles.clone()),
                _ => Err(PlatformError::NotFound("member left".to_string())),
            }
        }

        async fn replace_member_roles(
            &self,
            guild: GuildId,
            user: UserId,
            roles: &[RoleId],
        ) -> Result<(), PlatformError> {
            let subject = Subject::new(guild, user);
            self.attempts
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if let Some(error) = self.failures.lock().unwrap().pop() {
                return Err(error);
            }
            self.calls
                .lock()
                .unwrap()
                .push((subject, roles.to_vec(), Instant::now()));
            self.roles
                .lock()
                .unwrap()
                .insert(subject, Some(roles.to_vec()));
            Ok(())
        }

        async fn add_member_role(
            &self,
            _guild: GuildId,
            _user: UserId,
            _role: RoleId,
        ) -> Result<(), PlatformError> {
            unimplemented!("not exercised by queue tests")
        }

        async fn remove_member_role(
            &self,
            _guild: GuildId,
            _user: UserId,
            _role: RoleId,
        ) -> Result<(), PlatformError> {
            unimplemented!("not exercised by queue tests")
        }
    }

    fn subject() -> Subject {
        Subject::new(GuildId(1), UserId(2))
    }

    async fn drain(shutdown: watch::Sender<bool>, task: tokio::task::JoinHandle<()>) {
        // Give the paused clock room to run every queued attempt.
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = shutdown.send(true);
        let _ = task.await;
    }

    #[tokio::test(start_paused = true)]
    async fn coalesces_burst_into_single_edit() {
        let members =
            Arc::new(MockMembers::new().with_member(subject(), &[3]));
        let (queue, worker) = role_queue(Arc::clone(&members), 5);

        // All events land before the worker starts: one edit expected.
        let none = HashSet::new();
        queue.enqueue(GuildId(1), UserId(2), RoleId(10), true, &none);
        queue.enqueue(GuildId(1), UserId(2), RoleId(11), true, &none);
        queue.enqueue(GuildId(1), UserId(2), RoleId(10), false, &none);
        assert_eq!(queue.pending_subjects(), 1);

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(rx));
        drain(tx, task).await;

        let calls = members.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![RoleId(3), RoleId(11)]);
        assert_eq!(queue.pending_subjects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn linked_roles_are_mutually_exclusive() {
        let members =
            Arc::new(MockMembers::new().with_member(subject(), &[20]));
        let (queue, worker) = role_queue(Arc::clone(&members), 5);

        // Member holds linked role 20; granting 10 must strip it.
        let linked: HashSet<RoleId> = [RoleId(20), RoleId(21)].into_iter().collect();
        queue.enqueue(GuildId(1), UserId(2), RoleId(10), true, &linked);

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(rx));
        drain(tx, task).await;

        let calls = members.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![RoleId(10)]);
    }

    #[tokio::test(start_paused = true)]
    async fn everyone_role_never_reapplied() {
        let members = Arc::new(
            MockMembers::new().with_member(subject(), &[EVERYONE, 3]),
        );
        let (queue, worker) = role_queue(Arc::clone(&members), 5);

        queue.enqueue(GuildId(1), UserId(2), RoleId(10), true, &HashSet::new());

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(rx));
        drain(tx, task).await;

        let calls = members.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].1.contains(&RoleId(EVERYONE)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_edit_is_retried_until_it_lands() {
        let members =
            Arc::new(MockMembers::new().with_member(subject(), &[]));
        members.fail_next(PlatformError::Forbidden("missing manage roles".to_string()));
        let (queue, worker) = role_queue(Arc::clone(&members), 5);

        queue.enqueue(GuildId(1), UserId(2), RoleId(10), true, &HashSet::new());

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(rx));
        drain(tx, task).await;

        // First attempt rejected, second converges: exactly two mutator
        // calls in total, and the end state holds the granted role.
        assert_eq!(members.attempts(), 2);
        let calls = members.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![RoleId(10)]);
        assert_eq!(queue.pending_subjects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_subject_is_dropped_not_retried() {
        let members =
            Arc::new(MockMembers::new().with_missing_member(subject()));
        let (queue, worker) = role_queue(Arc::clone(&members), 5);

        queue.enqueue(GuildId(1), UserId(2), RoleId(10), true, &HashSet::new());

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(rx));
        drain(tx, task).await;

        assert!(members.calls().is_empty());
        assert_eq!(queue.pending_subjects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_subjects_are_rate_limited() {
        let mut members = MockMembers::new();
        for user in 0..4u64 {
            members = members.with_member(Subject::new(GuildId(1), UserId(user)), &[]);
        }
        let members = Arc::new(members);
        let (queue, worker) = role_queue(Arc::clone(&members), 5);

        for user in 0..4u64 {
            queue.enqueue(GuildId(1), UserId(user), RoleId(10), true, &HashSet::new());
        }

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(rx));
        drain(tx, task).await;

        let times = members.call_times();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert!(
                pair[1] - pair[0] >= Duration::from_millis(200),
                "edits spaced {:?}, expected at least 200ms",
                pair[1] - pair[0]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stale_key_costs_no_pause_slot() {
        let members =
            Arc::new(MockMembers::new().with_member(subject(), &[]));
        let (queue, worker) = role_queue(Arc::clone(&members), 5);

        // A requeue push racing an enqueue push leaves a duplicate key in
        // the channel ahead of the delta's own key. Re-create that shape
        // directly: one dangling key, then a real delta behind it.
        let _ = queue.tx.send(subject());
        queue.enqueue(GuildId(1), UserId(2), RoleId(10), true, &HashSet::new());

        let start = Instant::now();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(rx));
        drain(tx, task).await;

        // Only the real delta reaches the platform, and draining the stale
        // key must not delay it by a pause interval.
        assert_eq!(members.attempts(), 1);
        let times = members.call_times();
        assert_eq!(times.len(), 1);
        assert!(
            times[0] - start < Duration::from_millis(200),
            "stale key delayed the edit by {:?}",
            times[0] - start
        );
    }

    #[tokio::test(start_paused = true)]
    async fn events_during_processing_get_a_second_edit() {
        let members =
            Arc::new(MockMembers::new().with_member(subject(), &[]));
        let (queue, worker) = role_queue(Arc::clone(&members), 5);

        queue.enqueue(GuildId(1), UserId(2), RoleId(10), true, &HashSet::new());

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(worker.run(rx));

        // Let the first delta apply, then enqueue a second wave.
        tokio::time::sleep(Duration::from_secs(1)).await;
        queue.enqueue(GuildId(1), UserId(2), RoleId(11), true, &HashSet::new());
        drain(tx, task).await;

        let calls = members.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1, vec![RoleId(10), RoleId(11)]);
    }
}
