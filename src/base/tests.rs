use crate::base::neterror::NetError;
use std::io;

#[test]
fn test_chromium_codes() {
    assert_eq!(NetError::ConnectionRefused.as_i32(), -102);
    assert_eq!(NetError::ConnectionTimedOut.as_i32(), -118);
    assert_eq!(NetError::TooManyRedirects.as_i32(), -310);
    assert_eq!(NetError::InvalidChunkedEncoding.as_i32(), -321);
    assert_eq!(NetError::EmptyResponse.as_i32(), -324);
}

#[test]
fn test_custom_codes_stay_out_of_blob_range() {
    // -900..=-906 belongs to Chromium's blob errors.
    let blob_range = -906..=-900;
    for err in [
        NetError::AlreadyExecuted,
        NetError::ChainExhausted { index: 4, len: 4 },
        NetError::InterceptorPanicked,
        NetError::InvalidHeader,
        NetError::BodyNotPermitted("GET".into()),
    ] {
        assert!(!blob_range.contains(&err.as_i32()), "{err:?}");
    }
}

#[test]
fn test_framing_errors_are_recoverable() {
    let err = NetError::InvalidStatusLine("garbage".into());
    assert!(err.is_framing());
    assert!(err.is_recoverable());
    assert!(!err.is_connection());
}

#[test]
fn test_connection_errors_are_recoverable() {
    for err in [
        NetError::ConnectionReset,
        NetError::ConnectionRefused,
        NetError::ConnectionTimedOut,
        NetError::ConnectionFailedTo {
            host: "a".into(),
            port: 1,
            kind: io::ErrorKind::Other,
        },
    ] {
        assert!(err.is_connection(), "{err:?}");
        assert!(err.is_recoverable(), "{err:?}");
    }
}

#[test]
fn test_lifecycle_errors_are_not_recoverable() {
    for err in [
        NetError::Canceled,
        NetError::AlreadyExecuted,
        NetError::TooManyRedirects,
        NetError::SslProtocolError,
        NetError::ChainExhausted { index: 1, len: 1 },
    ] {
        assert!(!err.is_recoverable(), "{err:?}");
    }
}

#[test]
fn test_from_io_error() {
    let err: NetError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
    assert_eq!(err, NetError::ConnectionClosed);

    let err: NetError = io::Error::new(io::ErrorKind::InvalidData, "bad").into();
    assert!(matches!(err, NetError::Io { kind: io::ErrorKind::InvalidData, .. }));
}

#[test]
fn test_display_messages() {
    let err = NetError::IncompleteBody {
        expected: 10,
        received: 4,
    };
    assert_eq!(
        err.to_string(),
        "Incomplete body: expected 10 bytes, received 4"
    );
}
