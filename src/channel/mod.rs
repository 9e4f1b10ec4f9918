//! The `channel` module is the seam between the forwarding engine and the
//! transport.
//!
//! `MqChannel` is the capability set the router needs from a broker session:
//! settle a delivery (ack, nack, reject) and publish a message. Two
//! implementations exist:
//!
//! - `AmqpChannel`: a live `lapin` channel on a broker connection.
//! - `MemoryChannel`: an in-memory double that records publications per
//!   destination queue and remembers how deliveries were settled.

pub mod amqp;
pub mod memory;
pub mod message;

use async_trait::async_trait;

use crate::utils::error::ChannelError;

pub use amqp::AmqpChannel;
pub use memory::MemoryChannel;
pub use message::{Delivery, DeliveryTag, Publishing};

#[async_trait]
pub trait MqChannel: Send + Sync {
    /// Positively acknowledges `tag` (and every earlier tag when `multiple`).
    async fn ack(&self, tag: DeliveryTag, multiple: bool) -> Result<(), ChannelError>;

    /// Negatively acknowledges `tag`, asking the broker to redeliver it when
    /// `requeue` is set.
    async fn nack(
        &self,
        tag: DeliveryTag,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), ChannelError>;

    async fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<(), ChannelError>;

    /// Publishes `msg` to `exchange` under `routing_key`. Returns once the
    /// transport considers the message handed over.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        msg: Publishing,
    ) -> Result<(), ChannelError>;
}
