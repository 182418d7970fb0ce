use trellis_util::errors::TrellisError;

#[test]
fn test_io_error_display() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err = TrellisError::from(io_err);
    assert!(err.to_string().contains("I/O error"), "got: {err}");
}

#[test]
fn test_config_error_display() {
    let err = TrellisError::Config {
        message: "bad syntax".to_string(),
    };
    assert_eq!(err.to_string(), "Configuration error: bad syntax");
}

#[test]
fn test_invalid_version_display() {
    let err = TrellisError::InvalidVersion {
        input: "1.x".to_string(),
        reason: "unexpected character".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Invalid version '1.x': unexpected character"
    );
}

#[test]
fn test_no_solution_display() {
    let err = TrellisError::NoSolution {
        id: "B".to_string(),
        message: "no candidates".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Dependency resolution failed for 'B': no candidates"
    );
    assert!(err.is_no_solution());
}

#[test]
fn test_invalid_input_is_not_no_solution() {
    let err = TrellisError::InvalidInput {
        message: "target id is empty".to_string(),
    };
    assert_eq!(err.to_string(), "Invalid input: target id is empty");
    assert!(!err.is_no_solution());
}

#[test]
fn test_cancelled_display() {
    assert_eq!(TrellisError::Cancelled.to_string(), "Operation cancelled");
}

#[test]
fn test_generic_error_display() {
    let err = TrellisError::Generic {
        message: "something broke".to_string(),
    };
    assert_eq!(err.to_string(), "something broke");
}

#[test]
fn test_io_error_from_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: TrellisError = io_err.into();
    assert!(matches!(err, TrellisError::Io(_)));
}
