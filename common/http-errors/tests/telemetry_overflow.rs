use common_http_errors::telemetry::{distinct_codes, overflow_count, record_error_code, MAX_ERROR_CODES};

#[test]
fn distinct_and_overflow_tracking() {
    for i in 0..5 {
        record_error_code("test-svc", &format!("code_{}", i), 400);
    }
    assert!(distinct_codes() >= 5, "expected at least 5 distinct codes");
    let before_overflow = overflow_count();

    for i in 5..50 {
        record_error_code("test-svc", &format!("code_{}", i), 400);
    }
    assert!(distinct_codes() as usize <= MAX_ERROR_CODES, "distinct gauge should be capped, got {}", distinct_codes());
    assert!(overflow_count() > before_overflow, "expected overflow counter to increment");
    assert_eq!(record_error_code("test-svc", "code_49", 400), "overflow");
    assert_eq!(record_error_code("test-svc", "code_0", 400), "code_0");
}
