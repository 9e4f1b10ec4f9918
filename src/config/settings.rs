use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration of the interceptor.
///
/// Covers the mapping database, TLS for both broker links, the two brokers
/// themselves, the startup dial policy and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub tls: TlsSettings,
    pub lega: BrokerSettings,
    pub cega: BrokerSettings,
    pub supervisor: SupervisorSettings,
    pub logging: LoggingSettings,
}

/// Connection to the identity mapping store.
#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

/// TLS settings shared by both broker connections.
#[derive(Debug, Deserialize, Clone)]
pub struct TlsSettings {
    pub enabled: bool,
    pub ca_cert_path: Option<PathBuf>,
    pub verify_cert: bool,
}

/// One side of the bridge.
///
/// For LEGA, `queue` is the routing key every CEGA message is forwarded with.
/// For CEGA, `queue` is the inbound queue the interceptor consumes.
#[derive(Deserialize, Clone)]
pub struct BrokerSettings {
    pub connection: String,
    pub exchange: String,
    pub queue: String,
}

/// Startup connection policy.
#[derive(Debug, Deserialize, Clone)]
pub struct SupervisorSettings {
    pub dial_attempts: u32,
    pub dial_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration as read from files and the environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub database: Option<PartialDatabaseSettings>,
    pub tls: Option<PartialTlsSettings>,
    pub lega: Option<PartialBrokerSettings>,
    pub cega: Option<PartialBrokerSettings>,
    pub supervisor: Option<PartialSupervisorSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDatabaseSettings {
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PartialTlsSettings {
    pub enabled: Option<bool>,
    pub ca_cert_path: Option<PathBuf>,
    pub verify_cert: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub connection: Option<String>,
    pub exchange: Option<String>,
    pub queue: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialSupervisorSettings {
    pub dial_attempts: Option<u32>,
    pub dial_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Connection strings and exchange/queue names have no safe default for the
/// connection URLs; those stay empty and are rejected by validation.
impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings {
                url: String::new(),
                max_connections: 5,
            },
            tls: TlsSettings {
                enabled: false,
                ca_cert_path: None,
                verify_cert: true,
            },
            lega: BrokerSettings {
                connection: String::new(),
                exchange: "sda".to_string(),
                queue: "files".to_string(),
            },
            cega: BrokerSettings {
                connection: String::new(),
                exchange: "localega.v1".to_string(),
                queue: "v1.files".to_string(),
            },
            supervisor: SupervisorSettings {
                dial_attempts: 10,
                dial_interval_secs: 10,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge_over(self, defaults: Settings) -> Settings {
        let database = self.database;
        let tls = self.tls;
        let supervisor = self.supervisor;
        let logging = self.logging;

        Settings {
            database: DatabaseSettings {
                url: database
                    .as_ref()
                    .and_then(|d| d.url.clone())
                    .unwrap_or(defaults.database.url),
                max_connections: database
                    .as_ref()
                    .and_then(|d| d.max_connections)
                    .unwrap_or(defaults.database.max_connections),
            },
            tls: TlsSettings {
                enabled: tls
                    .as_ref()
                    .and_then(|t| t.enabled)
                    .unwrap_or(defaults.tls.enabled),
                ca_cert_path: tls
                    .as_ref()
                    .and_then(|t| t.ca_cert_path.clone())
                    .or(defaults.tls.ca_cert_path),
                verify_cert: tls
                    .as_ref()
                    .and_then(|t| t.verify_cert)
                    .unwrap_or(defaults.tls.verify_cert),
            },
            lega: merge_broker(self.lega, defaults.lega),
            cega: merge_broker(self.cega, defaults.cega),
            supervisor: SupervisorSettings {
                dial_attempts: supervisor
                    .as_ref()
                    .and_then(|s| s.dial_attempts)
                    .unwrap_or(defaults.supervisor.dial_attempts),
                dial_interval_secs: supervisor
                    .as_ref()
                    .and_then(|s| s.dial_interval_secs)
                    .unwrap_or(defaults.supervisor.dial_interval_secs),
            },
            logging: LoggingSettings {
                level: logging
                    .and_then(|l| l.level)
                    .unwrap_or(defaults.logging.level),
            },
        }
    }
}

fn merge_broker(partial: Option<PartialBrokerSettings>, default: BrokerSettings) -> BrokerSettings {
    match partial {
        Some(p) => BrokerSettings {
            connection: p.connection.unwrap_or(default.connection),
            exchange: p.exchange.unwrap_or(default.exchange),
            queue: p.queue.unwrap_or(default.queue),
        },
        None => default,
    }
}

const MASK: &str = "***";

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("url", &MASK)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("connection", &MASK)
            .field("exchange", &self.exchange)
            .field("queue", &self.queue)
            .finish()
    }
}

/// Single-line rendering for the startup log. Credentials never appear.
impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "database={MASK} tls.enabled={} tls.verify_cert={} \
             lega=[{MASK}, exchange={:?}, queue={:?}] \
             cega=[{MASK}, exchange={:?}, queue={:?}] \
             dial={}x{}s",
            self.tls.enabled,
            self.tls.verify_cert,
            self.lega.exchange,
            self.lega.queue,
            self.cega.exchange,
            self.cega.queue,
            self.supervisor.dial_attempts,
            self.supervisor.dial_interval_secs,
        )
    }
}
