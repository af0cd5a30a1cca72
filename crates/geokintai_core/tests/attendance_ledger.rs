use chrono::{Duration, TimeZone, Utc};
use geokintai_core::repo::attendance_repo::AttendanceRepository;
use geokintai_core::{is_append_only, RepoError};
use uuid::Uuid;

#[test]
fn at_most_one_open_interval_per_place_under_mixed_calls() {
    let mut repo = AttendanceRepository::new();
    let places = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let mut now = Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap();

    // Deterministic interleaving of opens and closes across three places.
    let mut seed: u64 = 0x5eed;
    for _ in 0..300 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let place = places[(seed >> 33) as usize % places.len()];
        now += Duration::seconds(30);
        if (seed >> 17) % 3 == 0 {
            let _ = repo.close_open_record(place, now);
        } else {
            repo.create_open_record(place, now);
        }

        for place in places {
            assert!(repo.open_count(place) <= 1);
        }
    }
}

#[test]
fn create_is_idempotent_while_open() {
    let mut repo = AttendanceRepository::new();
    let place = Uuid::new_v4();
    let entry = Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();

    let first = repo.create_open_record(place, entry);
    let second = repo.create_open_record(place, entry + Duration::minutes(3));

    assert_eq!(first, second);
    assert_eq!(repo.len(), 1);
}

#[test]
fn close_without_open_interval_is_not_found() {
    let mut repo = AttendanceRepository::new();
    let place = Uuid::new_v4();
    let now = Utc.with_ymd_and_hms(2024, 4, 1, 18, 0, 0).unwrap();

    assert_eq!(
        repo.close_open_record(place, now),
        Err(RepoError::NoOpenInterval(place))
    );
}

#[test]
fn reopen_after_close_creates_new_interval_and_keeps_history() {
    let mut repo = AttendanceRepository::new();
    let place = Uuid::new_v4();
    let morning = Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();

    let first = repo.create_open_record(place, morning);
    let closed = repo
        .close_open_record(place, morning + Duration::hours(3))
        .unwrap();
    assert_eq!(closed.id, first.id);
    assert_eq!(closed.exit_time, Some(morning + Duration::hours(3)));

    let before = repo.fetch_all().to_vec();
    let second = repo.create_open_record(place, morning + Duration::hours(4));
    assert_ne!(second.id, first.id);
    assert!(is_append_only(&before, repo.fetch_all()));
    assert_eq!(repo.fetch_by_place(place).len(), 2);
}

#[test]
fn append_only_guard_examples() {
    assert!(is_append_only(&[1, 2, 3], &[1, 2, 3, 4]));
    assert!(!is_append_only(&[1, 2, 3], &[1, 9, 3]));
    assert!(!is_append_only(&[1, 2, 3], &[1, 2]));
}
