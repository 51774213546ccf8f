//! Registry behaviour under concurrent callers
//!
//! Commands for different rooms run in parallel; racing creates for one room
//! leave exactly one winner.

use std::{
    sync::{Arc, Barrier},
    thread,
    time::{Duration, Instant},
};

use masque_core::{SessionConfig, SessionError};
use masque_server::{SessionRegistry, lock_session};

#[test]
fn racing_creates_have_one_winner() {
    let registry = Arc::new(SessionRegistry::<Instant>::new());
    let barrier = Arc::new(Barrier::new(8));
    let now = Instant::now();

    let handles: Vec<_> = (1..=8u64)
        .map(|host| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.create(5, host, "en", "classic", now, SessionConfig::default())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == SessionError::DuplicateActiveSession(5))
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn rooms_progress_independently() {
    let registry = Arc::new(SessionRegistry::<Instant>::new());
    let now = Instant::now();

    let handles: Vec<_> = (1..=6u64)
        .map(|room| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let session = registry
                    .create(room, 1, "en", "classic", now, SessionConfig::default())
                    .unwrap();
                for player in 2..=10 {
                    lock_session(&session).join(player, now).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.room_ids(), vec![1, 2, 3, 4, 5, 6]);
    for room in 1..=6 {
        let session = registry.get(room).unwrap();
        assert_eq!(lock_session(&session).players().len(), 10);
    }
}

#[test]
fn concurrent_joins_to_one_room_all_land() {
    let registry = Arc::new(SessionRegistry::<Instant>::new());
    let now = Instant::now();
    registry.create(3, 1, "en", "classic", now, SessionConfig::default()).unwrap();

    let handles: Vec<_> = (2..=17u64)
        .map(|player| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let session = registry.get(3).unwrap();
                let mut guard = lock_session(&session);
                guard.join(player, now).unwrap();
                guard.set_ready(player, true, now).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let session = registry.get(3).unwrap();
    let snapshot = lock_session(&session).snapshot();
    assert_eq!(snapshot.players.len(), 17);
    assert_eq!(snapshot.ready_count, 16);
}

#[test]
fn sweep_runs_alongside_commands() {
    let registry = Arc::new(SessionRegistry::<Instant>::new());
    let start = Instant::now();
    for room in 1..=4 {
        registry.create(room, 1, "en", "classic", start, SessionConfig::default()).unwrap();
    }

    let sweeper = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let late = start + Duration::from_secs(120);
            registry.sweep(late, Duration::from_secs(1)).len()
        })
    };
    let joiner = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for room in 1..=4 {
                if let Ok(session) = registry.get(room) {
                    let _ = lock_session(&session).join(2, start);
                }
            }
        })
    };

    joiner.join().unwrap();
    let swept = sweeper.join().unwrap();
    assert_eq!(swept, 4);
    assert!(registry.is_empty());
}
