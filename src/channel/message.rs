//! Inbound and outbound message representations.
//!
//! Both carry the full AMQP basic property set (`lapin::BasicProperties`):
//! content type and encoding, delivery mode, priority, correlation id,
//! reply-to, expiration, message id, timestamp, type, user id, app id and
//! headers. A `Publishing` built for a forwarded `Delivery` copies that set
//! verbatim and only ever replaces the body.

use lapin::BasicProperties;

pub type DeliveryTag = u64;

/// A message pulled from a queue, owned by the consumer until it is settled.
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    pub exchange: String,
    pub routing_key: String,
    pub delivery_tag: DeliveryTag,
    pub redelivered: bool,
    pub properties: BasicProperties,
    pub body: Vec<u8>,
}

/// A message about to be published.
#[derive(Debug, Clone, Default)]
pub struct Publishing {
    pub properties: BasicProperties,
    pub body: Vec<u8>,
}

impl Delivery {
    pub fn correlation_id(&self) -> Option<&str> {
        self.properties
            .correlation_id()
            .as_ref()
            .map(|id| id.as_str())
    }

    /// The body as text, replacing invalid UTF-8 sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Publishing {
    /// Builds a publishing that carries every property of `delivery` and the
    /// given body.
    pub fn forward(delivery: &Delivery, body: Vec<u8>) -> Self {
        Self {
            properties: delivery.properties.clone(),
            body,
        }
    }
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(delivery: lapin::message::Delivery) -> Self {
        Self {
            exchange: delivery.exchange.as_str().to_string(),
            routing_key: delivery.routing_key.as_str().to_string(),
            delivery_tag: delivery.delivery_tag,
            redelivered: delivery.redelivered,
            properties: delivery.properties,
            body: delivery.data,
        }
    }
}
