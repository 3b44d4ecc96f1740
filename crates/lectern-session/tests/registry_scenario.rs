//! End-to-end registry behaviour through the public API.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lectern_session::{
    NewParticipant, RegistryConfig, SessionError, SessionOptions, SessionRegistry, SessionStatus,
};
use lectern_types::ManualClock;

fn registry() -> (SessionRegistry, Arc<ManualClock>) {
    let clock = ManualClock::starting_now();
    let registry = SessionRegistry::with_clock(RegistryConfig::default(), clock.clone());
    (registry, clock)
}

// ─────────────────────────────────────────────────────────────────────────────
// Classroom scenario
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_five_students_join_and_leave() {
    let (registry, _) = registry();
    let session = registry
        .create(SessionOptions::new().with_title("Contracts 101"))
        .unwrap();
    let code = session.code;

    for i in 0..5 {
        let id = format!("student-{i}");
        registry
            .add_participant(&code, &id, NewParticipant::named(&id))
            .unwrap();
    }

    let session = registry.get_by_code(&code).unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.statistics.total_participants, 5);
    assert_eq!(session.statistics.active_participants, 5);

    for i in 0..5 {
        assert!(
            registry
                .remove_participant(&code, &format!("student-{i}"))
                .unwrap()
        );
    }

    let session = registry.get_by_code(&code).unwrap();
    assert_eq!(session.status, SessionStatus::Waiting);
    assert_eq!(session.statistics.active_participants, 0);
    assert_eq!(session.statistics.peak_participants, 5);
}

#[test]
fn test_full_lesson_lifecycle() {
    let (registry, clock) = registry();
    let code = registry
        .create(SessionOptions::new().with_owner("prof-okafor"))
        .unwrap()
        .code;

    registry
        .add_participant(&code, "student-0", NewParticipant::named("Ada"))
        .unwrap();
    registry
        .set_question(&code, "Was there an offer?")
        .unwrap();
    registry
        .set_vote(&code, serde_json::json!({"options": ["yes", "no"]}))
        .unwrap();
    clock.advance(Duration::from_secs(300));

    assert!(registry.update_status(&code, SessionStatus::Ended).unwrap());

    let session = registry.get_by_code(&code).unwrap();
    assert_eq!(session.status, SessionStatus::Ended);
    assert!(session.current_question.is_none());
    assert!(session.current_vote.is_none());
    assert_eq!(
        session.statistics.topic_durations["Was there an offer?"],
        Duration::from_secs(300)
    );
    assert!(!session.participants["student-0"].online);

    let err = registry
        .add_participant(&code, "student-1", NewParticipant::named("Late"))
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(_)));
    assert!(registry.list_active().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Codes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_concurrent_creates_yield_distinct_codes() {
    let (registry, _) = registry();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                (0..50)
                    .map(|_| registry.create(SessionOptions::new()).unwrap().code)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut codes = HashSet::new();
    for handle in handles {
        for code in handle.join().unwrap() {
            assert!(codes.insert(code), "duplicate session code issued");
        }
    }
    assert_eq!(codes.len(), 400);
    assert_eq!(registry.len(), 400);
}

#[test]
fn test_concurrent_creates_on_small_code_space() {
    // 100 codes, 60 sessions: collisions are frequent, duplicates never.
    let clock = ManualClock::starting_now();
    let registry = SessionRegistry::with_clock(
        RegistryConfig::default()
            .with_code_length(2)
            .with_max_code_attempts(500),
        clock,
    );

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                (0..10)
                    .filter_map(|_| registry.create(SessionOptions::new()).ok())
                    .map(|s| s.code)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut codes = HashSet::new();
    for handle in handles {
        for code in handle.join().unwrap() {
            assert!(codes.insert(code));
        }
    }
    assert_eq!(codes.len(), registry.len());
}

// ─────────────────────────────────────────────────────────────────────────────
// Expiry
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_expired_then_not_found() {
    let (registry, clock) = registry();
    let code = registry
        .create(SessionOptions::new().with_ttl(Duration::from_secs(1)))
        .unwrap()
        .code;

    clock.advance(Duration::from_secs(2));
    assert!(matches!(
        registry.get_by_code(&code),
        Err(SessionError::Expired(_))
    ));
    assert!(matches!(
        registry.add_participant(&code, "student-0", NewParticipant::default()),
        Err(SessionError::Expired(_))
    ));

    assert_eq!(registry.cleanup_expired(), 1);
    assert!(matches!(
        registry.get_by_code(&code),
        Err(SessionError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_reaper_runs_in_background() {
    let clock = ManualClock::starting_now();
    let registry = SessionRegistry::with_clock(
        RegistryConfig::default().with_cleanup_interval(Duration::from_millis(10)),
        clock.clone(),
    );
    let doomed = registry
        .create(SessionOptions::new().with_ttl(Duration::from_secs(1)))
        .unwrap()
        .code;
    let kept = registry.create(SessionOptions::new()).unwrap().code;

    assert!(registry.start_reaper());
    clock.advance(Duration::from_secs(5));
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(!registry.contains(&doomed));
    assert!(registry.contains(&kept));

    registry.stop();
    registry.stop();
    assert!(registry.is_empty());
}
