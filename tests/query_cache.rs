use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};

use courtside::error::QueryError;
use courtside::query_cache::{
    Commit, InlineRunner, QueryCache, QueryOptions, QueryStatus, QueuedRunner, RayonRunner,
};
use courtside::request_key::RequestDescriptor;
use courtside::state::{Payload, RosterPlayer};

fn roster(name: &str) -> Payload {
    Payload::Roster(vec![RosterPlayer {
        id: 1,
        full_name: name.to_string(),
        position: None,
    }])
}

fn counting(name: &'static str, calls: Arc<AtomicUsize>) -> impl Fn() -> Result<Payload> + Send + Sync + 'static {
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(roster(name))
    }
}

fn roster_name(cache: &QueryCache, team: &str) -> Option<String> {
    cache
        .get(&RequestDescriptor::team_roster(team).key())?
        .current()?
        .as_roster()?
        .first()
        .map(|p| p.full_name.clone())
}

#[test]
fn concurrent_resolves_share_one_fetch() {
    let runner = Arc::new(QueuedRunner::new());
    let mut cache = QueryCache::new(Arc::clone(&runner));
    let calls = Arc::new(AtomicUsize::new(0));
    let desc = RequestDescriptor::team_roster("BOS");

    for _ in 0..3 {
        let entry = cache.resolve(&desc, QueryOptions::default(), counting("Tatum", calls.clone()));
        assert_eq!(entry.status, QueryStatus::Pending);
    }
    assert_eq!(runner.len(), 1);
    runner.run_all();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(cache.pump(), vec![Commit::Resolved(desc.key())]);
    // Resolved and fresh: no further fetch.
    cache.resolve(&desc, QueryOptions::default(), counting("Tatum", calls.clone()));
    assert_eq!(runner.len(), 0);
    assert_eq!(cache.stats().dispatches, 1);
    assert_eq!(cache.stats().hits, 3);
}

#[test]
fn late_response_lands_under_its_own_key() {
    let runner = Arc::new(QueuedRunner::new());
    let mut cache = QueryCache::new(Arc::clone(&runner));
    let calls = Arc::new(AtomicUsize::new(0));
    let k1 = RequestDescriptor::team_roster("BOS");
    let k2 = RequestDescriptor::team_roster("LAL");

    cache.resolve(&k1, QueryOptions::default(), counting("Celtic", calls.clone()));
    cache.resolve(&k2, QueryOptions::default(), counting("Laker", calls.clone()));

    // K2 finishes first, K1 arrives afterwards.
    assert!(runner.run_last());
    assert_eq!(cache.pump(), vec![Commit::Resolved(k2.key())]);
    assert_eq!(roster_name(&cache, "LAL").as_deref(), Some("Laker"));
    assert!(runner.run_next());
    cache.pump();

    assert_eq!(roster_name(&cache, "LAL").as_deref(), Some("Laker"));
    assert_eq!(roster_name(&cache, "BOS").as_deref(), Some("Celtic"));
}

#[test]
fn response_for_a_removed_entry_is_discarded() {
    let runner = Arc::new(QueuedRunner::new());
    let mut cache = QueryCache::new(Arc::clone(&runner));
    let calls = Arc::new(AtomicUsize::new(0));
    let desc = RequestDescriptor::team_roster("BOS");

    cache.resolve(&desc, QueryOptions::default(), counting("Old", calls.clone()));
    assert!(cache.remove(&desc.key()).is_some());
    assert_eq!(cache.in_flight(), 1);

    runner.run_next();
    assert_eq!(cache.pump(), vec![Commit::Discarded(desc.key())]);
    assert!(cache.get(&desc.key()).is_none());
    assert_eq!(cache.in_flight(), 0);
    assert_eq!(cache.stats().discarded, 1);
}

#[test]
fn recreated_entry_waits_on_the_running_fetch() {
    let runner = Arc::new(QueuedRunner::new());
    let mut cache = QueryCache::new(Arc::clone(&runner));
    let calls = Arc::new(AtomicUsize::new(0));
    let desc = RequestDescriptor::team_roster("BOS");

    cache.resolve(&desc, QueryOptions::default(), counting("First", calls.clone()));
    cache.remove(&desc.key());
    let entry = cache.resolve(&desc, QueryOptions::default(), counting("Second", calls.clone()));
    assert_eq!(entry.status, QueryStatus::Pending);
    // Still a single fetch for the key.
    assert_eq!(runner.len(), 1);
    assert_eq!(cache.stats().dispatches, 1);

    runner.run_all();
    assert_eq!(cache.pump(), vec![Commit::Resolved(desc.key())]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(roster_name(&cache, "BOS").as_deref(), Some("First"));
    assert_eq!(cache.in_flight(), 0);
}

#[test]
fn clear_keeps_running_fetches_exclusive() {
    let runner = Arc::new(QueuedRunner::new());
    let mut cache = QueryCache::new(Arc::clone(&runner));
    let calls = Arc::new(AtomicUsize::new(0));
    let desc = RequestDescriptor::team_roster("LAL").enabled(false);

    cache.resolve(&desc, QueryOptions::default(), counting("Laker", calls.clone()));
    cache.refetch(&desc.key());
    cache.clear();
    cache.resolve(&desc, QueryOptions::default(), counting("Laker", calls.clone()));
    // The explicit trigger attaches to the fetch started before the clear.
    assert!(cache.refetch(&desc.key()));
    assert_eq!(runner.len(), 1);

    runner.run_all();
    cache.pump();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(roster_name(&cache, "LAL").as_deref(), Some("Laker"));
}

#[test]
fn lazy_entry_waits_for_refetch() {
    let runner = Arc::new(QueuedRunner::new());
    let mut cache = QueryCache::new(Arc::clone(&runner));
    let calls = Arc::new(AtomicUsize::new(0));
    let desc = RequestDescriptor::team_roster("BOS").enabled(false);

    for _ in 0..3 {
        let entry = cache.resolve(&desc, QueryOptions::default(), counting("Tatum", calls.clone()));
        assert_eq!(entry.status, QueryStatus::Idle);
    }
    assert!(runner.is_empty());

    assert!(cache.refetch(&desc.key()));
    assert_eq!(runner.len(), 1);
    runner.run_all();
    cache.pump();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(roster_name(&cache, "BOS").as_deref(), Some("Tatum"));
}

#[test]
fn refetch_while_pending_queues_one_rerun() {
    let runner = Arc::new(QueuedRunner::new());
    let mut cache = QueryCache::new(Arc::clone(&runner));
    let calls = Arc::new(AtomicUsize::new(0));
    let desc = RequestDescriptor::team_roster("BOS").enabled(false);
    cache.resolve(&desc, QueryOptions::default(), counting("Tatum", calls.clone()));

    cache.refetch(&desc.key());
    cache.refetch(&desc.key());
    cache.refetch(&desc.key());
    // Never two fetches in flight for one key.
    assert_eq!(runner.len(), 1);

    runner.run_all();
    cache.pump();
    // The queued trigger starts as soon as the first settles.
    assert_eq!(runner.len(), 1);
    assert_eq!(
        cache.get(&desc.key()).map(|e| e.status),
        Some(QueryStatus::Pending)
    );
    runner.run_all();
    cache.pump();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        cache.get(&desc.key()).map(|e| e.status),
        Some(QueryStatus::Resolved)
    );
}

#[test]
fn unknown_key_refetch_is_a_no_op() {
    let mut cache = QueryCache::new(InlineRunner);
    assert!(!cache.refetch(&RequestDescriptor::games_feed().key()));
    assert!(!cache.invalidate(&RequestDescriptor::games_feed().key()));
}

#[test]
fn failure_keeps_the_last_good_value() {
    let mut cache = QueryCache::new(InlineRunner);
    let desc = RequestDescriptor::team_roster("BOS");
    let fail = Arc::new(AtomicBool::new(false));
    let flag = fail.clone();
    let fetcher = move || {
        if flag.load(Ordering::SeqCst) {
            Err(anyhow!("connection reset"))
        } else {
            Ok(roster("Tatum"))
        }
    };

    cache.resolve(&desc, QueryOptions::default(), fetcher.clone());
    cache.pump();
    fail.store(true, Ordering::SeqCst);
    cache.invalidate(&desc.key());
    cache.resolve(&desc, QueryOptions::default(), fetcher);
    let commits = cache.pump();
    assert_eq!(
        commits,
        vec![Commit::Failed(
            desc.key(),
            QueryError::Transport("connection reset".to_string())
        )]
    );

    let entry = cache.get(&desc.key()).expect("entry kept");
    assert_eq!(entry.status, QueryStatus::Failed);
    assert!(entry.value.is_some());
    // Failed reads as absent for derivation.
    assert!(entry.current().is_none());
    assert_eq!(cache.stats().failures, 1);
}

#[test]
fn failed_entry_recovers_on_refetch() {
    let mut cache = QueryCache::new(InlineRunner);
    let desc = RequestDescriptor::team_roster("BOS");
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    cache.resolve(&desc, QueryOptions::default(), move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(anyhow!("timeout"))
        } else {
            Ok(roster("Tatum"))
        }
    });
    cache.pump();
    assert_eq!(cache.get(&desc.key()).map(|e| e.status), Some(QueryStatus::Failed));

    // No automatic retry.
    cache.resolve(&desc, QueryOptions::default(), || Ok(roster("unused")));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    cache.refetch(&desc.key());
    cache.pump();
    assert_eq!(roster_name(&cache, "BOS").as_deref(), Some("Tatum"));
    assert!(cache.get(&desc.key()).is_some_and(|e| e.error.is_none()));
}

#[test]
fn debounced_key_fetches_only_after_the_delay() {
    let runner = Arc::new(QueuedRunner::new());
    let mut cache = QueryCache::new(Arc::clone(&runner));
    let calls = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions::default().debounce(Duration::from_millis(40));

    // The user types "2", then "25": only the last key may fetch.
    let abandoned = RequestDescriptor::team_roster("2");
    let kept = RequestDescriptor::team_roster("25");
    cache.resolve(&abandoned, options, counting("x", calls.clone()));
    cache.resolve(&kept, options, counting("y", calls.clone()));
    assert!(runner.is_empty());

    thread::sleep(Duration::from_millis(60));
    let entry = cache.resolve(&kept, options, counting("y", calls.clone()));
    assert_eq!(entry.status, QueryStatus::Pending);
    runner.run_all();
    cache.pump();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        cache.get(&abandoned.key()).map(|e| e.status),
        Some(QueryStatus::Idle)
    );
}

#[test]
fn invalidate_kind_marks_matching_entries() {
    let mut cache = QueryCache::new(InlineRunner);
    let calls = Arc::new(AtomicUsize::new(0));
    for team in ["BOS", "LAL"] {
        let desc = RequestDescriptor::team_roster(team);
        cache.resolve(&desc, QueryOptions::default(), counting("p", calls.clone()));
    }
    cache.resolve(&RequestDescriptor::games_feed(), QueryOptions::default(), || {
        Ok(Payload::Games(Vec::new()))
    });
    cache.pump();

    assert_eq!(cache.invalidate_kind(courtside::request_key::QueryKind::TeamRoster), 2);
    for team in ["BOS", "LAL"] {
        let desc = RequestDescriptor::team_roster(team);
        cache.resolve(&desc, QueryOptions::default(), counting("p", calls.clone()));
    }
    cache.pump();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn rayon_runner_delivers_through_pump_wait() {
    let runner = RayonRunner::new(2).expect("pool");
    let mut cache = QueryCache::new(runner);
    let desc = RequestDescriptor::team_roster("BOS");
    cache.resolve(&desc, QueryOptions::default(), || Ok(roster("Tatum")));

    let mut commits = Vec::new();
    for _ in 0..50 {
        commits.extend(cache.pump_wait(Duration::from_millis(100)));
        if !commits.is_empty() {
            break;
        }
    }
    assert_eq!(commits, vec![Commit::Resolved(desc.key())]);
    assert_eq!(cache.in_flight(), 0);
}
