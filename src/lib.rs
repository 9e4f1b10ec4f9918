//! # mq-interceptor
//!
//! `mq-interceptor` bridges two RabbitMQ brokers: the Central EGA (CEGA) broker
//! and a Local EGA (LEGA) broker. Messages from CEGA's inbound queue are
//! forwarded to LEGA, and status messages from four LEGA queues are forwarded
//! back to CEGA. On the way, the `user` field of each JSON message is
//! rewritten between EGA ids and Elixir ids using a mapping table in Postgres.
//!
//! ## Core Modules
//!
//! - `supervisor`: Dials both brokers with retries and reports connection loss.
//! - `channel`: The `MqChannel` trait with a live `lapin` and an in-memory implementation.
//! - `identity`: Translates user ids through a `MappingStore`.
//! - `transform`: Rebuilds a delivery as the publishing for the other side.
//! - `router`: Forwards and settles deliveries under a global lock.
//! - `config`: Loads settings from files and the environment.
//! - `utils`: Error types and logging setup.

pub mod channel;
pub mod config;
pub mod identity;
pub mod router;
pub mod supervisor;
pub mod transform;
pub mod utils;
