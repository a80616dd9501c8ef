//! License lifecycle tests: issue, verify/bind, expiry, renewal, gate

#[path = "../common/mod.rs"]
mod common;

use common::*;

// ============ Issuance ============

#[test]
fn test_issue_defaults() {
    let conn = setup_test_db();
    let before = now();
    let license = issue_test_license(&conn, "user@example.com", 30);
    let after = now();

    assert_eq!(license.code.len(), code::CODE_LENGTH);
    assert!(code::is_well_formed(&license.code));
    assert_eq!(license.email, "user@example.com");
    assert!(license.device_id.is_none(), "new license should be unbound");
    assert!(license.active);
    assert_eq!(license.usage_count, 0);
    assert!(license.created_at >= before && license.created_at <= after);
    assert_eq!(
        license.expires_at,
        license.created_at + 30 * 86400,
        "expiry should be duration_days after creation"
    );
}

#[test]
fn test_issue_rejects_bad_input() {
    let conn = setup_test_db();

    let result = license::issue(&conn, "", 30);
    assert!(matches!(result, Err(AppError::BadRequest(_))), "empty email should be rejected");

    let result = license::issue(&conn, "not-an-email", 30);
    assert!(matches!(result, Err(AppError::BadRequest(_))), "email without @ should be rejected");

    let result = license::issue(&conn, "user@example.com", 0);
    assert!(matches!(result, Err(AppError::BadRequest(_))), "zero duration should be rejected");

    let all = queries::list_licenses(&conn).expect("list failed");
    assert!(all.is_empty(), "validation failures must not touch the store");
}

#[test]
fn test_issue_rejects_oversized_duration() {
    let conn = setup_test_db();

    // Large enough that the expiry arithmetic would overflow i64
    let result = license::issue(&conn, "user@example.com", i64::MAX / 86400 + 1);
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    // Just past the documented cap
    let result = license::issue(&conn, "user@example.com", 36_501);
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let all = queries::list_licenses(&conn).expect("list failed");
    assert!(all.is_empty(), "rejected durations must not create licenses");
}

#[test]
fn test_issued_codes_are_unique() {
    let conn = setup_test_db();
    let mut codes = std::collections::HashSet::new();
    for _ in 0..50 {
        let license = issue_test_license(&conn, "user@example.com", 30);
        assert!(codes.insert(license.code), "issued codes must be unique");
    }
}

// ============ Verify and device binding ============

#[test]
fn test_verify_unknown_code_is_invalid() {
    let conn = setup_test_db();
    let outcome = license::verify(&conn, "AAAABBBBCCCCDDDD", None).expect("verify failed");
    assert_eq!(outcome, Verification::Invalid);

    // Garbage shapes are invalid too, without erroring
    let outcome = license::verify(&conn, "???", Some("device-a")).expect("verify failed");
    assert_eq!(outcome, Verification::Invalid);
}

#[test]
fn test_verify_normalizes_code() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 30);
    let sloppy = format!("  {}  ", license.code.to_lowercase());

    let outcome = license::verify(&conn, &sloppy, None).expect("verify failed");
    assert!(
        matches!(outcome, Verification::Valid { .. }),
        "lowercase input with whitespace should verify, got: {:?}",
        outcome
    );
}

#[test]
fn test_verify_binds_first_device_only() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 30);

    // Without a device id, verify reports validity but never binds
    let outcome = license::verify(&conn, &license.code, None).expect("verify failed");
    assert!(matches!(outcome, Verification::Valid { .. }));
    let stored = queries::get_license(&conn, &license.code).unwrap().unwrap();
    assert!(stored.device_id.is_none());

    // First device binds
    let outcome = license::verify(&conn, &license.code, Some("device-a")).expect("verify failed");
    assert!(matches!(outcome, Verification::Valid { .. }));
    let stored = queries::get_license(&conn, &license.code).unwrap().unwrap();
    assert_eq!(stored.device_id.as_deref(), Some("device-a"));

    // Same device keeps verifying
    let outcome = license::verify(&conn, &license.code, Some("device-a")).expect("verify failed");
    assert!(matches!(outcome, Verification::Valid { .. }));

    // A different device is locked out
    let outcome = license::verify(&conn, &license.code, Some("device-b")).expect("verify failed");
    assert_eq!(outcome, Verification::DeviceMismatch);
    let stored = queries::get_license(&conn, &license.code).unwrap().unwrap();
    assert_eq!(
        stored.device_id.as_deref(),
        Some("device-a"),
        "mismatch must not rebind"
    );
}

#[test]
fn test_expiry_deactivates_and_is_monotonic() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 30);
    license::verify(&conn, &license.code, Some("device-a")).expect("verify failed");

    let stale_expiry = past_timestamp(1);
    set_expiry(&conn, &license.code, stale_expiry);

    let outcome = license::verify(&conn, &license.code, Some("device-a")).expect("verify failed");
    assert_eq!(
        outcome,
        Verification::Expired {
            expired_at: stale_expiry
        }
    );

    let stored = queries::get_license(&conn, &license.code).unwrap().unwrap();
    assert!(!stored.active, "observing expiry should deactivate");

    // Every later verify sees the inactive row, never Valid again
    for _ in 0..3 {
        let outcome =
            license::verify(&conn, &license.code, Some("device-a")).expect("verify failed");
        assert_eq!(outcome, Verification::Invalid);
    }
}

#[test]
fn test_concurrent_binding_exactly_one_wins() {
    // Multiple threads race to bind a freshly issued code with different
    // device ids. The conditional update must let exactly one through.
    use std::sync::{Arc, Barrier};

    let num_threads = 5;

    // File-based DB for cross-thread access since in-memory DBs are per-connection.
    let db_path = std::env::temp_dir()
        .join(format!("guardian_bind_race_{}.db", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    let conn = rusqlite::Connection::open(&db_path).expect("Failed to create test db");
    init_db(&conn).expect("Failed to init schema");
    let license = issue_test_license(&conn, "race@example.com", 30);
    let license_code = license.code.clone();
    drop(conn); // Close so threads can open their own connections

    let barrier = Arc::new(Barrier::new(num_threads));
    let db_path_arc = Arc::new(db_path.clone());

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let db_path = Arc::clone(&db_path_arc);
            let code = license_code.clone();

            std::thread::spawn(move || {
                let thread_conn =
                    rusqlite::Connection::open(db_path.as_str()).expect("thread failed to open db");
                thread_conn
                    .busy_timeout(std::time::Duration::from_secs(5))
                    .expect("failed to set busy timeout");

                barrier.wait();

                license::verify(&thread_conn, &code, Some(&format!("race-device-{}", i)))
                    .expect("verify failed")
            })
        })
        .collect();

    let results: Vec<Verification> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let valid_count = results
        .iter()
        .filter(|r| matches!(r, Verification::Valid { .. }))
        .count();
    let mismatch_count = results
        .iter()
        .filter(|r| matches!(r, Verification::DeviceMismatch))
        .count();

    assert_eq!(
        valid_count, 1,
        "exactly one of {} concurrent first verifies should bind, got {:?}",
        num_threads, results
    );
    assert_eq!(mismatch_count, num_threads - 1);

    let verify_conn = rusqlite::Connection::open(&db_path).expect("failed to reopen db");
    let stored = queries::get_license(&verify_conn, &license_code)
        .expect("query failed")
        .expect("license not found");
    assert!(stored.device_id.is_some(), "the winner's device should be bound");

    let _ = std::fs::remove_file(&db_path);
}

// ============ Renewal ============

#[test]
fn test_renew_future_expiry_extends_from_old() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 10);

    let outcome = license::renew(&conn, &license.code, 30).expect("renew failed");
    assert_eq!(
        outcome,
        RenewOutcome::Renewed {
            new_expires_at: license.expires_at + 30 * 86400
        },
        "early renewal should stack on the remaining window"
    );
}

#[test]
fn test_renew_expired_starts_from_now() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 30);
    set_expiry(&conn, &license.code, past_timestamp(5));

    let before = now();
    let outcome = license::renew(&conn, &license.code, 30).expect("renew failed");
    let after = now();

    let RenewOutcome::Renewed { new_expires_at } = outcome else {
        panic!("renew should succeed, got: {:?}", outcome);
    };
    assert!(
        new_expires_at >= before + 30 * 86400 && new_expires_at <= after + 30 * 86400,
        "renewal of an expired license should start from now, not the stale expiry"
    );
}

#[test]
fn test_renew_reactivates_for_bound_device() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 30);
    license::verify(&conn, &license.code, Some("device-a")).expect("verify failed");

    // Expire and observe it, deactivating the license
    set_expiry(&conn, &license.code, past_timestamp(1));
    license::verify(&conn, &license.code, Some("device-a")).expect("verify failed");

    license::renew(&conn, &license.code, 30).expect("renew failed");

    let outcome = license::verify(&conn, &license.code, Some("device-a")).expect("verify failed");
    assert!(
        matches!(outcome, Verification::Valid { .. }),
        "renewal should make the originally bound device valid again, got: {:?}",
        outcome
    );

    // Binding survives renewal: a different device stays locked out
    let outcome = license::verify(&conn, &license.code, Some("device-b")).expect("verify failed");
    assert_eq!(outcome, Verification::DeviceMismatch);
}

#[test]
fn test_renew_unknown_code_not_found() {
    let conn = setup_test_db();
    let outcome = license::renew(&conn, "AAAABBBBCCCCDDDD", 30).expect("renew failed");
    assert_eq!(outcome, RenewOutcome::NotFound);
}

#[test]
fn test_renew_rejects_out_of_range_days() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 30);

    let result = license::renew(&conn, &license.code, 0);
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    // A value that would wrap expires_at negative and brick the license
    let result = license::renew(&conn, &license.code, i64::MAX / 86400 + 1);
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let result = license::renew(&conn, &license.code, 36_501);
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let stored = queries::get_license(&conn, &license.code).unwrap().unwrap();
    assert_eq!(stored.expires_at, license.expires_at, "no state change on validation failure");
    assert!(stored.active, "rejected renewals must not touch the active flag");
}

// ============ Gate and usage accounting ============

#[test]
fn test_authorize_counts_usage_exactly_once_per_grant() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 30);

    for expected in 1..=3i64 {
        let decision =
            license::authorize(&conn, &license.code, "device-a").expect("authorize failed");
        assert_eq!(
            decision,
            Authorization::Authorized {
                days_left: 30,
                usage_count: expected
            }
        );
    }

    let stored = queries::get_license(&conn, &license.code).unwrap().unwrap();
    assert_eq!(stored.usage_count, 3);
}

#[test]
fn test_denied_authorize_never_counts_usage() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 30);
    license::verify(&conn, &license.code, Some("device-a")).expect("verify failed");

    // Wrong device
    let decision = license::authorize(&conn, &license.code, "device-b").expect("authorize failed");
    assert_eq!(
        decision,
        Authorization::Denied {
            reason: "device_mismatch"
        }
    );

    // Expired
    set_expiry(&conn, &license.code, past_timestamp(1));
    let decision = license::authorize(&conn, &license.code, "device-a").expect("authorize failed");
    assert_eq!(decision, Authorization::Denied { reason: "expired" });

    // Inactive after the observed expiry
    let decision = license::authorize(&conn, &license.code, "device-a").expect("authorize failed");
    assert_eq!(decision, Authorization::Denied { reason: "invalid" });

    // Unknown code
    let decision =
        license::authorize(&conn, "AAAABBBBCCCCDDDD", "device-a").expect("authorize failed");
    assert_eq!(decision, Authorization::Denied { reason: "invalid" });

    let stored = queries::get_license(&conn, &license.code).unwrap().unwrap();
    assert_eq!(stored.usage_count, 0, "denied attempts must not be counted");
}

// ============ End-to-end scenario ============

#[test]
fn test_full_lifecycle_scenario() {
    let conn = setup_test_db();
    let license = issue_test_license(&conn, "user@example.com", 1);

    // First verify from device A binds and reports one day left
    let outcome = license::verify(&conn, &license.code, Some("deviceA")).expect("verify failed");
    assert_eq!(
        outcome,
        Verification::Valid {
            days_left: 1,
            usage_count: 0
        }
    );
    let stored = queries::get_license(&conn, &license.code).unwrap().unwrap();
    assert_eq!(stored.device_id.as_deref(), Some("deviceA"));

    // Device B is rejected
    let outcome = license::verify(&conn, &license.code, Some("deviceB")).expect("verify failed");
    assert_eq!(outcome, Verification::DeviceMismatch);

    // Clock passes the expiry
    let stale_expiry = past_timestamp(1);
    set_expiry(&conn, &license.code, stale_expiry);
    let outcome = license::verify(&conn, &license.code, Some("deviceA")).expect("verify failed");
    assert_eq!(
        outcome,
        Verification::Expired {
            expired_at: stale_expiry
        }
    );

    // Renewal brings device A back for roughly thirty days
    let outcome = license::renew(&conn, &license.code, 30).expect("renew failed");
    assert!(matches!(outcome, RenewOutcome::Renewed { .. }));

    let outcome = license::verify(&conn, &license.code, Some("deviceA")).expect("verify failed");
    let Verification::Valid { days_left, .. } = outcome else {
        panic!("renewed license should verify, got: {:?}", outcome);
    };
    assert!(
        (29..=30).contains(&days_left),
        "expected roughly 30 days left, got {}",
        days_left
    );
}
