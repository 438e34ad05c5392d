//! Tests for the outcome type.

use super::Outcome;
use pretty_assertions::assert_eq;

#[test]
fn test_outcome_success_boundary() {
    assert!(Outcome::ok("done").is_success());
    assert!(Outcome::new(201, "created").is_failure());
    assert!(Outcome::new(404, "User not found").is_failure());
}

#[test]
fn test_common_failures() {
    assert_eq!(Outcome::invalid_request().code, 400);
    assert_eq!(Outcome::invalid_request().message, "Invalid request");
    assert_eq!(Outcome::bad_request().code, 403);
    assert_eq!(Outcome::bad_request().message, "Bad Request");
}

#[test]
fn test_outcome_serializes_cause_as_stack() {
    let outcome = Outcome::new(500, "boom").with_cause("db down");
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(
        json,
        serde_json::json!({"code": 500, "message": "boom", "stack": "db down"})
    );
}

#[test]
fn test_outcome_skips_empty_fields() {
    let json = serde_json::to_value(Outcome::ok("Login succesful!")).unwrap();
    assert_eq!(json, serde_json::json!({"code": 200, "message": "Login succesful!"}));
}

#[test]
fn test_outcome_with_data() {
    let outcome = Outcome::ok_with("found", serde_json::json!([{"id": "1"}]));
    assert!(outcome.is_success());
    assert_eq!(outcome.data, Some(serde_json::json!([{"id": "1"}])));
}

#[test]
fn test_outcome_deserialize_defaults() {
    let outcome: Outcome = serde_json::from_str(r#"{"code": 404}"#).unwrap();
    assert_eq!(outcome.code, 404);
    assert_eq!(outcome.message, "");
    assert!(outcome.cause.is_none());
}
