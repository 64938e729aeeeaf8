//! Tests for domain error construction and serialisation.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(DomainError::invalid_input("bad"), ErrorCode::InvalidInput)]
#[case(DomainError::not_found("missing"), ErrorCode::NotFound)]
#[case(DomainError::invalid_transition("no edge"), ErrorCode::InvalidTransition)]
#[case(DomainError::conflict("raced"), ErrorCode::Conflict)]
#[case(DomainError::internal("boom"), ErrorCode::Internal)]
fn constructors_set_code(#[case] error: DomainError, #[case] expected: ErrorCode) {
    assert_eq!(error.code(), expected);
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = DomainError::try_new(ErrorCode::InvalidInput, "   ");
    assert!(matches!(result, Err(DomainErrorValidationError::EmptyMessage)));
}

#[rstest]
fn new_substitutes_default_message_for_blank_input() {
    let error = DomainError::new(ErrorCode::Conflict, "");
    assert_eq!(error.message(), "concurrent modification");
}

#[rstest]
fn serialises_with_snake_case_code_and_details() {
    let error = DomainError::invalid_input("subject is required").with_details(json!({"field": "subject"}));
    let value = serde_json::to_value(&error).expect("error serialises");

    assert_eq!(
        value,
        json!({
            "code": "invalid_input",
            "message": "subject is required",
            "details": {"field": "subject"},
        })
    );
}

#[rstest]
fn deserialisation_rejects_blank_messages() {
    let result: Result<DomainError, _> =
        serde_json::from_value(json!({"code": "not_found", "message": " "}));
    assert!(result.is_err());
}

#[rstest]
fn display_uses_message() {
    assert_eq!(DomainError::internal("storage down").to_string(), "storage down");
}
