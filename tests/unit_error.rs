use cadence::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidRule("interval must be >= 1".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let mode = Error::InvalidEditMode("not part of a series".to_string());
    assert_eq!(mode.exit_code(), exit_codes::USER_ERROR);

    let policy = Error::PermissionDenied("tasks.update".to_string());
    assert_eq!(policy.exit_code(), exit_codes::POLICY_BLOCKED);

    let op = Error::OperationFailed("boom".to_string());
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code() {
    let err = Error::SeriesNotFound("rs-01".to_string());
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert!(json.error.contains("Series not found"));
    assert!(json.details.is_none());
}

#[test]
fn conflict_details_carry_revisions() {
    let err = Error::Conflict {
        series_id: "rs-01".to_string(),
        expected: 3,
        found: 5,
    };
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::POLICY_BLOCKED);
    let details = json.details.expect("details");
    assert_eq!(details["series_id"], "rs-01");
    assert_eq!(details["expected"], 3);
    assert_eq!(details["found"], 5);
}
