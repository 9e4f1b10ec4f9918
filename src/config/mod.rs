mod settings;

use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, DatabaseSettings, LoggingSettings, PartialSettings, Settings,
    SupervisorSettings, TlsSettings,
};

/// Environment variables used by existing deployments, mapped onto their
/// structured keys. They take precedence over every other source.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("POSTGRES_CONNECTION", "database.url"),
    ("ENABLE_TLS", "tls.enabled"),
    ("CA_CERT_PATH", "tls.ca_cert_path"),
    ("VERIFY_CERT", "tls.verify_cert"),
    ("LEGA_MQ_CONNECTION", "lega.connection"),
    ("LEGA_MQ_EXCHANGE", "lega.exchange"),
    ("LEGA_MQ_QUEUE", "lega.queue"),
    ("CEGA_MQ_CONNECTION", "cega.connection"),
    ("CEGA_MQ_EXCHANGE", "cega.exchange"),
    ("CEGA_MQ_QUEUE", "cega.queue"),
];

/// Loads the configuration and merges it over `Settings::default()`.
///
/// Sources, lowest precedence first:
/// 1. `path`, or `config/default.*` when no path is given (optional)
/// 2. `INTERCEPTOR__SECTION__KEY` environment variables
/// 3. the legacy flat variables listed in `LEGACY_ENV`
///
/// The merged result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name("config/default").required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix("INTERCEPTOR")
            .separator("__")
            .try_parsing(true),
    );
    let builder = apply_legacy_env(builder)?;

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let settings = partial.merge_over(Settings::default());

    validate(&settings)?;
    Ok(settings)
}

fn apply_legacy_env(
    mut builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    for (var, key) in LEGACY_ENV {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                builder = builder.set_override(*key, value)?;
            }
        }
    }
    Ok(builder)
}

/// Rejects settings the process cannot start with.
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    let required = [
        ("database.url", &settings.database.url),
        ("lega.connection", &settings.lega.connection),
        ("lega.exchange", &settings.lega.exchange),
        ("lega.queue", &settings.lega.queue),
        ("cega.connection", &settings.cega.connection),
        ("cega.exchange", &settings.cega.exchange),
        ("cega.queue", &settings.cega.queue),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::NotFound(key.to_string()));
        }
    }

    if settings.tls.enabled && settings.tls.verify_cert && settings.tls.ca_cert_path.is_none() {
        return Err(ConfigError::NotFound("tls.ca_cert_path".to_string()));
    }

    if settings.supervisor.dial_attempts == 0 {
        return Err(ConfigError::Message(
            "supervisor.dial_attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}
