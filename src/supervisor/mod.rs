//! The `supervisor` module owns the two broker connections.
//!
//! Startup is patient: `dial` retries a fixed number of times with a fixed
//! pause, then gives up with the last error. Runtime is not: once a
//! `BrokerLink` is serving, any connection error resolves `closed()` and the
//! process is expected to exit and be restarted by its orchestrator.

pub mod tls;

use std::future::Future;
use std::time::Duration;

use lapin::tcp::OwnedTLSConfig;
use lapin::uri::AMQPUri;
use lapin::{Channel, Connection, ConnectionProperties};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use url::Url;

use crate::config::{SupervisorSettings, TlsSettings};
use crate::utils::error::{AppError, ForwardError, SupervisorError};

use tls::TlsMode;

/// How often and how patiently to retry an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(10),
        }
    }
}

impl From<&SupervisorSettings> for RetryPolicy {
    fn from(settings: &SupervisorSettings) -> Self {
        Self {
            attempts: settings.dial_attempts,
            interval: Duration::from_secs(settings.dial_interval_secs),
        }
    }
}

/// Runs `operation` until it succeeds or `policy.attempts` is used up, and
/// returns the last error in the latter case. The operation receives the
/// 1-based attempt number. There is no pause after the final attempt.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!(
                    operation = what,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Attempt failed, will retry"
                );
                attempt += 1;
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

/// Fires once a connection reports an error or its notifier goes away.
#[derive(Debug)]
pub struct CloseSignal {
    host: String,
    errors: mpsc::UnboundedReceiver<lapin::Error>,
}

impl CloseSignal {
    /// A signal for `host` and the sender that fires it.
    pub fn new(host: impl Into<String>) -> (mpsc::UnboundedSender<lapin::Error>, Self) {
        let (tx, errors) = mpsc::unbounded_channel();
        let signal = Self {
            host: host.into(),
            errors,
        };
        (tx, signal)
    }

    pub async fn closed(&mut self) -> SupervisorError {
        match self.errors.recv().await {
            Some(source) => SupervisorError::ConnectionLost {
                host: self.host.clone(),
                source,
            },
            None => SupervisorError::ConnectionClosed {
                host: self.host.clone(),
            },
        }
    }
}

/// An established broker connection and its close notification.
pub struct BrokerLink {
    host: String,
    connection: Connection,
    close: CloseSignal,
}

impl BrokerLink {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub async fn open_channel(&self) -> Result<Channel, SupervisorError> {
        self.connection
            .create_channel()
            .await
            .map_err(|source| SupervisorError::Channel {
                host: self.host.clone(),
                source,
            })
    }

    /// Resolves once the connection fails or is closed by the broker.
    pub async fn closed(&mut self) -> SupervisorError {
        self.close.closed().await
    }
}

/// Connects to the broker at `url`, retrying according to `policy`.
///
/// The URL is validated before the first attempt; an unparsable URL is
/// returned at once.
pub async fn dial(
    url: &str,
    tls: &TlsSettings,
    policy: &RetryPolicy,
) -> Result<BrokerLink, SupervisorError> {
    let parsed = Url::parse(url)?;
    let uri: AMQPUri = url.parse().map_err(SupervisorError::InvalidAmqpUri)?;
    let host = parsed.host_str().unwrap_or_default().to_string();
    let mode = tls::tls_mode(tls)?;

    if tls.enabled && parsed.scheme() != "amqps" {
        warn!(
            host = %host,
            scheme = parsed.scheme(),
            "TLS is enabled but the connection string is not amqps"
        );
    }
    info!(
        host = %host,
        attempts = policy.attempts,
        interval_secs = policy.interval.as_secs(),
        tls = ?mode,
        "Dialing broker"
    );

    let connection = retry(policy, "connect", |_| connect(url, &uri, &mode))
        .await
        .map_err(|source| SupervisorError::Connect {
            host: host.clone(),
            attempts: policy.attempts,
            source,
        })?;
    info!(host = %host, "Connected to broker");

    let (tx, close) = CloseSignal::new(host.as_str());
    connection.on_error(move |err| {
        let _ = tx.send(err);
    });

    Ok(BrokerLink {
        host,
        connection,
        close,
    })
}

/// One connection attempt. TLS settings are rebuilt per attempt since lapin
/// takes them by value.
async fn connect(url: &str, uri: &AMQPUri, mode: &TlsMode) -> Result<Connection, lapin::Error> {
    let properties = ConnectionProperties::default();
    match mode {
        TlsMode::Plain => Connection::connect(url, properties).await,
        TlsMode::Verified { ca_bundle } => {
            let config = OwnedTLSConfig {
                identity: None,
                cert_chain: Some(ca_bundle.clone()),
            };
            Connection::connect_with_config(url, properties, config).await
        }
        TlsMode::Unverified { config } => {
            let config = config.clone();
            Connection::connector(
                uri.clone(),
                Box::new(move |uri: &AMQPUri| tls::unverified_stream(uri, config)),
                properties,
            )
            .await
        }
    }
}

/// Waits for the first event that ends the process: either connection
/// closing, a consumer returning, or `shutdown` resolving. Only a shutdown
/// yields `Ok`.
pub async fn supervise<L, C, S>(
    lega_closed: L,
    cega_closed: C,
    consumers: &mut JoinSet<ForwardError>,
    shutdown: S,
) -> Result<(), AppError>
where
    L: Future<Output = SupervisorError>,
    C: Future<Output = SupervisorError>,
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        err = lega_closed => Err(err.into()),
        err = cega_closed => Err(err.into()),
        Some(joined) = consumers.join_next() => Err(joined?.into()),
        signal = shutdown => signal.map_err(AppError::Signal),
    }
}

#[cfg(test)]
mod tests;
