//! Session-scoped query cache.
//!
//! Fetches run as jobs on a [`JobRunner`] and report back over a channel. The owner
//! thread commits finished fetches with [`QueryCache::pump`]; nothing else mutates
//! the entries, so there is no locking around them. Every dispatch carries a ticket
//! and an outcome is only committed if its entry is still waiting for that ticket.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result, anyhow};

use crate::error::QueryError;
use crate::request_key::{QueryKind, RequestDescriptor, RequestKey};
use crate::state::Payload;

pub type Fetcher = Arc<dyn Fn() -> Result<Payload> + Send + Sync>;
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait JobRunner {
    fn run(&self, job: Job);
}

impl<T: JobRunner + ?Sized> JobRunner for Arc<T> {
    fn run(&self, job: Job) {
        (**self).run(job)
    }
}

pub struct RayonRunner {
    pool: rayon::ThreadPool,
}

impl RayonRunner {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|idx| format!("courtside-fetch-{idx}"))
            .build()
            .context("failed to build fetch pool")?;
        Ok(Self { pool })
    }
}

impl JobRunner for RayonRunner {
    fn run(&self, job: Job) {
        self.pool.spawn(job);
    }
}

/// Runs each job on the calling thread before `run` returns.
pub struct InlineRunner;

impl JobRunner for InlineRunner {
    fn run(&self, job: Job) {
        job();
    }
}

/// Holds jobs until the caller drains them, in whatever order it likes.
#[derive(Default)]
pub struct QueuedRunner {
    jobs: Mutex<VecDeque<Job>>,
}

impl QueuedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    pub fn run_next(&self) -> bool {
        let job = self.queue().pop_front();
        Self::run_job(job)
    }

    pub fn run_last(&self) -> bool {
        let job = self.queue().pop_back();
        Self::run_job(job)
    }

    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    fn run_job(job: Option<Job>) -> bool {
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Job>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JobRunner for QueuedRunner {
    fn run(&self, job: Job) {
        self.queue().push_back(job);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Pending,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// A resolved entry older than this is refetched on the next `resolve`.
    pub stale_after: Option<Duration>,
    /// Delay before a new key's first fetch; keys replaced in the meantime never fetch.
    pub debounce: Option<Duration>,
}

impl QueryOptions {
    pub fn stale_after(mut self, ttl: Duration) -> Self {
        self.stale_after = Some(ttl);
        self
    }

    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }
}

pub struct CacheEntry {
    pub kind: QueryKind,
    pub status: QueryStatus,
    pub value: Option<Arc<Payload>>,
    pub error: Option<QueryError>,
    pub enabled: bool,
    pub fetched_at: Option<SystemTime>,
    fetcher: Fetcher,
    ticket: Option<u64>,
    rerun: bool,
    stale: bool,
    ready_at: Option<Instant>,
    fetches: u32,
}

impl CacheEntry {
    fn new(kind: QueryKind, enabled: bool, fetcher: Fetcher, ready_at: Option<Instant>) -> Self {
        Self {
            kind,
            status: QueryStatus::Idle,
            value: None,
            error: None,
            enabled,
            fetched_at: None,
            fetcher,
            ticket: None,
            rerun: false,
            stale: false,
            ready_at,
            fetches: 0,
        }
    }

    /// The value to show: resolved, or being revalidated with an older value on hand.
    /// Failed entries count as absent.
    pub fn current(&self) -> Option<&Arc<Payload>> {
        match self.status {
            QueryStatus::Resolved | QueryStatus::Pending => self.value.as_ref(),
            QueryStatus::Idle | QueryStatus::Failed => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending && self.value.is_none()
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches
    }

    pub fn age(&self) -> Option<Duration> {
        self.fetched_at.and_then(|t| t.elapsed().ok())
    }

    fn wants_fetch(&self, options: QueryOptions, now: Instant) -> bool {
        if !self.enabled {
            return false;
        }
        match self.status {
            QueryStatus::Idle => self.ready_at.is_none_or(|at| now >= at),
            QueryStatus::Pending => false,
            QueryStatus::Resolved => {
                self.stale
                    || options
                        .stale_after
                        .is_some_and(|ttl| self.age().is_some_and(|age| age >= ttl))
            }
            QueryStatus::Failed => self.stale,
        }
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("has_value", &self.value.is_some())
            .field("error", &self.error)
            .field("enabled", &self.enabled)
            .field("fetches", &self.fetches)
            .finish()
    }
}

/// What `pump` did with one finished fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    Resolved(RequestKey),
    Failed(RequestKey, QueryError),
    /// The entry was removed or is waiting on a newer fetch.
    Discarded(RequestKey),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub dispatches: u64,
    pub discarded: u64,
    pub failures: u64,
}

struct FetchOutcome {
    key: RequestKey,
    ticket: u64,
    result: Result<Payload>,
}

pub struct QueryCache {
    entries: HashMap<RequestKey, CacheEntry>,
    // Fetches still running for entries that were removed.
    orphans: HashMap<RequestKey, u64>,
    runner: Box<dyn JobRunner>,
    tx: Sender<FetchOutcome>,
    rx: Receiver<FetchOutcome>,
    next_ticket: u64,
    stats: CacheStats,
}

impl QueryCache {
    pub fn new(runner: impl JobRunner + 'static) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            entries: HashMap::with_capacity(32),
            orphans: HashMap::new(),
            runner: Box::new(runner),
            tx,
            rx,
            next_ticket: 1,
            stats: CacheStats::default(),
        }
    }

    /// Get-or-fetch for one key; call once per render.
    ///
    /// The fetcher is only kept when the entry is created; later calls for the same
    /// key describe the same request and reuse the stored one.
    pub fn resolve<F>(
        &mut self,
        desc: &RequestDescriptor,
        options: QueryOptions,
        fetcher: F,
    ) -> &CacheEntry
    where
        F: Fn() -> Result<Payload> + Send + Sync + 'static,
    {
        let key = desc.key();
        let now = Instant::now();
        match self.entries.get_mut(&key) {
            Some(entry) => {
                self.stats.hits += 1;
                entry.enabled = desc.enabled;
            }
            None => {
                let ready_at = options.debounce.map(|delay| now + delay);
                let entry = CacheEntry::new(desc.kind, desc.enabled, Arc::new(fetcher), ready_at);
                self.entries.insert(key.clone(), entry);
            }
        }

        if self
            .entries
            .get(&key)
            .is_some_and(|entry| entry.wants_fetch(options, now))
        {
            self.dispatch(&key);
        }
        &self.entries[&key]
    }

    /// Fetch again regardless of status or `enabled`. A pending key queues the trigger
    /// behind its in-flight fetch instead of issuing a second request.
    pub fn refetch(&mut self, key: &RequestKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.status == QueryStatus::Pending {
            entry.rerun = true;
            return true;
        }
        self.dispatch(key);
        true
    }

    /// Mark an entry stale; the next `resolve` refetches it if it is enabled.
    pub fn invalidate(&mut self, key: &RequestKey) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    pub fn invalidate_kind(&mut self, kind: QueryKind) -> usize {
        let mut marked = 0;
        for entry in self.entries.values_mut().filter(|e| e.kind == kind) {
            entry.stale = true;
            marked += 1;
        }
        marked
    }

    /// Drop an entry. A fetch it still has in flight keeps running; an entry
    /// re-created for the same key waits on that fetch instead of issuing another.
    pub fn remove(&mut self, key: &RequestKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        if let Some(ticket) = entry.ticket {
            self.orphans.insert(key.clone(), ticket);
        }
        Some(entry)
    }

    pub fn clear(&mut self) {
        for (key, entry) in self.entries.drain() {
            if let Some(ticket) = entry.ticket {
                self.orphans.insert(key, ticket);
            }
        }
    }

    pub fn get(&self, key: &RequestKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetches still running, including those whose entry was removed.
    pub fn in_flight(&self) -> usize {
        let attached = self
            .entries
            .values()
            .filter(|e| e.status == QueryStatus::Pending)
            .count();
        attached + self.orphans.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Commit every fetch that has finished so far.
    pub fn pump(&mut self) -> Vec<Commit> {
        let mut commits = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            commits.push(self.commit(outcome));
        }
        commits
    }

    /// Like `pump`, but waits up to `timeout` for the first outcome when fetches are in flight.
    pub fn pump_wait(&mut self, timeout: Duration) -> Vec<Commit> {
        if self.in_flight() == 0 {
            return self.pump();
        }
        let mut commits = Vec::new();
        if let Ok(outcome) = self.rx.recv_timeout(timeout) {
            commits.push(self.commit(outcome));
        }
        commits.extend(self.pump());
        commits
    }

    fn dispatch(&mut self, key: &RequestKey) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        if let Some(ticket) = self.orphans.remove(key) {
            // A fetch for this key is still running: wait for it.
            entry.status = QueryStatus::Pending;
            entry.error = None;
            entry.ticket = Some(ticket);
            entry.stale = false;
            entry.ready_at = None;
            return;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        entry.status = QueryStatus::Pending;
        entry.error = None;
        entry.ticket = Some(ticket);
        entry.stale = false;
        entry.ready_at = None;
        entry.fetches += 1;
        let fetcher = Arc::clone(&entry.fetcher);
        self.stats.dispatches += 1;

        let tx = self.tx.clone();
        let key = key.clone();
        self.runner.run(Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| fetcher()))
                .unwrap_or_else(|_| Err(anyhow!("fetcher panicked")));
            let _ = tx.send(FetchOutcome {
                key,
                ticket,
                result,
            });
        }));
    }

    fn commit(&mut self, outcome: FetchOutcome) -> Commit {
        let FetchOutcome {
            key,
            ticket,
            result,
        } = outcome;
        if self.orphans.get(&key) == Some(&ticket) {
            self.orphans.remove(&key);
        }
        let Some(entry) = self.entries.get_mut(&key) else {
            self.stats.discarded += 1;
            return Commit::Discarded(key);
        };
        if entry.ticket != Some(ticket) {
            self.stats.discarded += 1;
            return Commit::Discarded(key);
        }

        entry.ticket = None;
        let commit = match result {
            Ok(payload) => {
                entry.value = Some(Arc::new(payload));
                entry.status = QueryStatus::Resolved;
                entry.error = None;
                entry.fetched_at = Some(SystemTime::now());
                Commit::Resolved(key.clone())
            }
            Err(err) => {
                // Keep the last good value; only the status and error change.
                let err = QueryError::transport(&err);
                entry.status = QueryStatus::Failed;
                entry.error = Some(err.clone());
                self.stats.failures += 1;
                Commit::Failed(key.clone(), err)
            }
        };

        let rerun = std::mem::take(&mut entry.rerun);
        if rerun {
            self.dispatch(&key);
        }
        commit
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entries.len())
            .field("orphans", &self.orphans.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Game;

    fn games_payload() -> Result<Payload> {
        Ok(Payload::Games(vec![Game {
            game_id: "g1".to_string(),
            game_date: "2026-01-10".to_string(),
            game_time: None,
            home_team: "Boston Celtics".to_string(),
            away_team: "Los Angeles Lakers".to_string(),
            home_team_id: Some("BOS".to_string()),
            away_team_id: Some("LAL".to_string()),
            is_live: false,
        }]))
    }

    #[test]
    fn inline_runner_commits_on_next_pump() {
        let mut cache = QueryCache::new(InlineRunner);
        let desc = RequestDescriptor::games_feed();
        let status = cache
            .resolve(&desc, QueryOptions::default(), games_payload)
            .status;
        assert_eq!(status, QueryStatus::Pending);

        let commits = cache.pump();
        assert_eq!(commits, vec![Commit::Resolved(desc.key())]);
        let entry = cache.get(&desc.key()).expect("entry exists");
        assert_eq!(entry.status, QueryStatus::Resolved);
        assert!(entry.fetched_at.is_some());
    }

    #[test]
    fn stale_after_refetches_resolved_entry() {
        let mut cache = QueryCache::new(InlineRunner);
        let desc = RequestDescriptor::games_feed();
        let options = QueryOptions::default().stale_after(Duration::ZERO);
        cache.resolve(&desc, options, games_payload);
        cache.pump();

        let entry = cache.resolve(&desc, options, games_payload);
        // Revalidating keeps the old value visible.
        assert_eq!(entry.status, QueryStatus::Pending);
        assert!(entry.current().is_some());
        assert_eq!(entry.fetch_count(), 2);
    }

    #[test]
    fn panicking_fetcher_fails_the_entry() {
        let mut cache = QueryCache::new(InlineRunner);
        let desc = RequestDescriptor::games_feed();
        cache.resolve(&desc, QueryOptions::default(), || -> Result<Payload> {
            panic!("boom")
        });
        let commits = cache.pump();
        assert!(matches!(commits.as_slice(), [Commit::Failed(_, _)]));
        assert_eq!(
            cache.get(&desc.key()).map(|e| e.status),
            Some(QueryStatus::Failed)
        );
    }
}
