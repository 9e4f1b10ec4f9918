use super::tls::{
    AcceptAnyServerCert, TlsMode, load_ca_bundle, tls_mode, unverified_client_config,
};
use super::{CloseSignal, RetryPolicy, dial, retry, supervise};
use crate::config::{SupervisorSettings, TlsSettings};
use crate::utils::error::{AppError, ForwardError, SupervisorError};
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use std::fs;
use std::future::pending;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinSet;

const CA_PEM: &str = "-----BEGIN CERTIFICATE-----\n\
MIIBszCCAVmgAwIBAgIUQ2FFR0FfdGVzdF9jYV9jZXJ0aWZpY2F0ZTAKBggqhkjO\n\
-----END CERTIFICATE-----\n";

fn quick_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        interval: Duration::from_millis(1),
    }
}

fn tls(enabled: bool, verify_cert: bool, ca_cert_path: Option<&Path>) -> TlsSettings {
    TlsSettings {
        enabled,
        ca_cert_path: ca_cert_path.map(|p| p.to_path_buf()),
        verify_cert,
    }
}

#[test]
fn test_default_policy() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.attempts, 10);
    assert_eq!(policy.interval, Duration::from_secs(10));
}

#[test]
fn test_policy_from_settings() {
    let policy = RetryPolicy::from(&SupervisorSettings {
        dial_attempts: 3,
        dial_interval_secs: 2,
    });
    assert_eq!(policy.attempts, 3);
    assert_eq!(policy.interval, Duration::from_secs(2));
}

#[tokio::test]
async fn test_retry_stops_at_first_success() {
    let calls = AtomicU32::new(0);

    let result: Result<&str, String> = retry(&quick_policy(10), "test", |attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 3 {
                Err(format!("refused #{attempt}"))
            } else {
                Ok("connected")
            }
        }
    })
    .await;

    assert_eq!(result, Ok("connected"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_returns_last_error_when_exhausted() {
    let calls = AtomicU32::new(0);

    let result: Result<(), String> = retry(&quick_policy(10), "test", |attempt| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Err(format!("refused #{attempt}")) }
    })
    .await;

    assert_eq!(result, Err("refused #10".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_retry_makes_at_least_one_attempt() {
    let calls = AtomicU32::new(0);

    let result: Result<(), String> = retry(&quick_policy(0), "test", |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err("refused".to_string()) }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dial_rejects_invalid_url_without_retrying() {
    let policy = RetryPolicy {
        attempts: 10,
        interval: Duration::from_secs(3600),
    };

    let result = dial("not a connection string", &tls(false, true, None), &policy).await;

    assert!(matches!(result, Err(SupervisorError::InvalidUrl(_))));
}

#[test]
fn test_tls_disabled_is_plain() {
    let mode = tls_mode(&tls(false, true, None)).unwrap();
    assert!(matches!(mode, TlsMode::Plain));
}

#[test]
fn test_tls_pins_ca_bundle() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("CA.cert");
    fs::write(&path, CA_PEM).unwrap();

    let mode = tls_mode(&tls(true, true, Some(&path))).unwrap();

    match mode {
        TlsMode::Verified { ca_bundle } => assert_eq!(ca_bundle, CA_PEM),
        other => panic!("Expected Verified, got {other:?}"),
    }
}

#[test]
fn test_tls_without_verification_does_not_read_bundle() {
    let mode = tls_mode(&tls(true, false, Some(Path::new("/does/not/exist")))).unwrap();
    assert!(matches!(mode, TlsMode::Unverified { .. }));
}

#[test]
fn test_tls_requires_ca_path_when_verifying() {
    let err = tls_mode(&tls(true, true, None)).unwrap_err();
    assert!(matches!(err, SupervisorError::MissingCaCert));
}

#[test]
fn test_unverified_config_accepts_unknown_certificates() {
    let provider = Arc::new(ring::default_provider());
    let verifier = AcceptAnyServerCert::new(provider);
    let self_signed = CertificateDer::from(b"not issued by any known CA".to_vec());
    let broker = ServerName::try_from("cega-mq.example.org").unwrap();

    let verified = verifier.verify_server_cert(&self_signed, &[], &broker, &[], UnixTime::now());

    assert!(verified.is_ok());
    assert!(!verifier.supported_verify_schemes().is_empty());
    assert!(unverified_client_config().is_ok());
}

#[test]
fn test_missing_ca_bundle_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let err = load_ca_bundle(&tmp.path().join("missing.pem")).unwrap_err();
    assert!(matches!(err, SupervisorError::ReadCaCert { .. }));
}

#[test]
fn test_non_pem_ca_bundle_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("CA.cert");
    fs::write(&path, "this is not a certificate").unwrap();

    let err = load_ca_bundle(&path).unwrap_err();
    assert!(matches!(err, SupervisorError::InvalidCaCert { .. }));
    assert!(err.to_string().contains("CA.cert"));
}

fn connection_reset() -> lapin::Error {
    lapin::Error::IOError(Arc::new(io::Error::new(
        io::ErrorKind::ConnectionReset,
        "connection reset by peer",
    )))
}

fn running_consumers() -> JoinSet<ForwardError> {
    let mut consumers = JoinSet::new();
    for _ in 0..5 {
        consumers.spawn(pending::<ForwardError>());
    }
    consumers
}

#[tokio::test]
async fn test_close_signal_reports_connection_error() {
    let (notifier, mut signal) = CloseSignal::new("cega-mq.example.org");
    notifier.send(connection_reset()).unwrap();

    let err = signal.closed().await;

    match err {
        SupervisorError::ConnectionLost { host, .. } => assert_eq!(host, "cega-mq.example.org"),
        other => panic!("Expected ConnectionLost, got {other:?}"),
    }
}

#[tokio::test]
async fn test_close_signal_fires_when_notifier_is_dropped() {
    let (notifier, mut signal) = CloseSignal::new("lega-mq");
    drop(notifier);

    assert!(matches!(
        signal.closed().await,
        SupervisorError::ConnectionClosed { .. }
    ));
}

#[tokio::test]
async fn test_connection_loss_stops_running_consumers() {
    let (notifier, mut cega) = CloseSignal::new("cega-mq");
    let (_lega_notifier, mut lega) = CloseSignal::new("lega-mq");
    let mut consumers = running_consumers();
    notifier.send(connection_reset()).unwrap();

    let result = supervise(
        lega.closed(),
        cega.closed(),
        &mut consumers,
        pending::<io::Result<()>>(),
    )
    .await;

    match result {
        Err(AppError::Supervisor(SupervisorError::ConnectionLost { host, .. })) => {
            assert_eq!(host, "cega-mq")
        }
        other => panic!("Expected ConnectionLost, got {other:?}"),
    }
    assert_eq!(consumers.len(), 5);
}

#[tokio::test]
async fn test_consumer_exit_is_fatal() {
    let mut consumers = running_consumers();
    consumers.spawn(async {
        ForwardError::ConsumerClosed {
            queue: "inbox".to_string(),
        }
    });

    let result = supervise(
        pending::<SupervisorError>(),
        pending::<SupervisorError>(),
        &mut consumers,
        pending::<io::Result<()>>(),
    )
    .await;

    assert!(matches!(
        result,
        Err(AppError::Forward(ForwardError::ConsumerClosed { .. }))
    ));
}

#[tokio::test]
async fn test_shutdown_is_clean() {
    let mut consumers = running_consumers();

    let result = supervise(
        pending::<SupervisorError>(),
        pending::<SupervisorError>(),
        &mut consumers,
        async { Ok(()) },
    )
    .await;

    assert!(result.is_ok());
}
