//! The `error` module defines the error types used across the interceptor.
//!
//! Each component owns one enum. Whether an error is permanent, transient or
//! fatal is decided by the router, not by the type itself.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to map an identifier from one domain to the other.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("no identity mapping found for '{id}'")]
    NotFound { id: String },

    #[error("mapping store query failed: {0}")]
    Store(#[from] sqlx::Error),
}

/// Failure to turn a delivery into a publishing.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("malformed message payload: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error(transparent)]
    Identity(#[from] TranslateError),

    #[error("failed to re-encode message payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure reported by a channel implementation.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("AMQP operation failed: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("broker did not confirm publication to [{exchange}, {routing_key}]")]
    Nacked {
        exchange: String,
        routing_key: String,
    },

    #[error("message not posted to correct exchange: expected '{expected}' but got '{actual}'")]
    WrongExchange { expected: String, actual: String },

    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

/// Failure while establishing or holding a broker connection.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid broker connection string: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid AMQP connection string: {0}")]
    InvalidAmqpUri(String),

    #[error("TLS is enabled but no CA certificate path is configured")]
    MissingCaCert,

    #[error("failed to read CA certificate '{}': {source}", path.display())]
    ReadCaCert {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no PEM certificate found in '{}'", path.display())]
    InvalidCaCert { path: PathBuf },

    #[error("failed to build TLS configuration: {0}")]
    TlsConfig(#[from] rustls::Error),

    #[error("failed to connect to {host} after {attempts} attempts: {source}")]
    Connect {
        host: String,
        attempts: u32,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to open channel on {host}: {source}")]
    Channel {
        host: String,
        #[source]
        source: lapin::Error,
    },

    #[error("connection to {host} closed")]
    ConnectionClosed { host: String },

    #[error("connection to {host} lost: {source}")]
    ConnectionLost {
        host: String,
        #[source]
        source: lapin::Error,
    },
}

/// Conditions under which the forwarding engine cannot continue.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to {action} delivery {tag}: {source}")]
    Disposition {
        action: &'static str,
        tag: u64,
        #[source]
        source: ChannelError,
    },

    #[error("failed to publish error record: {0}")]
    ErrorReport(#[source] ChannelError),

    #[error("failed to encode error record: {0}")]
    ErrorEncode(#[source] serde_json::Error),

    #[error("consumer for queue '{queue}' failed: {source}")]
    Consume {
        queue: String,
        #[source]
        source: ChannelError,
    },

    #[error("consumer for queue '{queue}' closed")]
    ConsumerClosed { queue: String },
}

/// Top-level error of the binary; every variant ends the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("failed to prepare channel: {0}")]
    Channel(#[from] ChannelError),

    #[error("failed to start consumer on queue '{queue}': {source}")]
    Subscribe {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("consumer task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}
