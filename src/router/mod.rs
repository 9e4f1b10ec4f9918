//! The `router` module is the forwarding engine.
//!
//! Each monitored queue is drained by `run_consumer`, which hands every
//! delivery to `Router::forward`. A forward ends in exactly one disposition:
//!
//! - `Acked`: the transformed message was published to the other side.
//! - `Rejected`: the message could not be transformed. It is nacked without
//!   requeue and an error record goes to the CEGA exchange under `files.error`.
//! - `Requeued`: publishing failed. It is nacked with requeue for a later retry.
//!
//! All forwards in the process run one at a time under a single lock, from
//! transform through disposition, so forwards are totally ordered across
//! queues and the publish channels are never used concurrently.

pub mod rules;

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use lapin::BasicProperties;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::channel::{Delivery, MqChannel, Publishing};
use crate::config::Settings;
use crate::identity::{Direction, IdentityTranslator};
use crate::transform::{Transformed, transform};
use crate::utils::error::{ChannelError, ForwardError, TransformError};

pub use rules::{LEGA_STATUS_QUEUES, RoutingRule, standard_rules};

/// Routing key of error records on the CEGA exchange.
pub const ERROR_ROUTING_KEY: &str = "files.error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acked,
    Rejected,
    Requeued,
}

/// The body published for a delivery that could not be transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub reason: String,
    pub original_message: String,
}

impl ErrorRecord {
    pub fn new(delivery: &Delivery, error: &TransformError) -> Self {
        Self {
            reason: error.to_string(),
            original_message: delivery.body_text(),
        }
    }

    /// The error record as a publishing. Only content type, content encoding
    /// and correlation id are carried over from the failed delivery.
    pub fn to_publishing(&self, delivery: &Delivery) -> Result<Publishing, serde_json::Error> {
        let mut properties = BasicProperties::default();
        if let Some(content_type) = delivery.properties.content_type() {
            properties = properties.with_content_type(content_type.clone());
        }
        if let Some(content_encoding) = delivery.properties.content_encoding() {
            properties = properties.with_content_encoding(content_encoding.clone());
        }
        if let Some(correlation_id) = delivery.properties.correlation_id() {
            properties = properties.with_correlation_id(correlation_id.clone());
        }

        Ok(Publishing {
            properties,
            body: serde_json::to_vec(self)?,
        })
    }
}

/// Consume and publish channels of both brokers.
#[derive(Clone)]
pub struct Channels {
    pub cega_consume: Arc<dyn MqChannel>,
    pub cega_publish: Arc<dyn MqChannel>,
    pub lega_consume: Arc<dyn MqChannel>,
    pub lega_publish: Arc<dyn MqChannel>,
}

impl Channels {
    /// The channel deliveries travelling in `direction` were consumed on.
    fn source(&self, direction: Direction) -> &dyn MqChannel {
        match direction {
            Direction::CegaToLega => self.cega_consume.as_ref(),
            Direction::LegaToCega => self.lega_consume.as_ref(),
        }
    }

    fn destination(&self, direction: Direction) -> &dyn MqChannel {
        match direction {
            Direction::CegaToLega => self.lega_publish.as_ref(),
            Direction::LegaToCega => self.cega_publish.as_ref(),
        }
    }
}

pub struct Router {
    translator: IdentityTranslator,
    channels: Channels,
    lega_inbound_queue: String,
    cega_exchange: String,
    forward_lock: Mutex<()>,
}

impl Router {
    pub fn new(translator: IdentityTranslator, channels: Channels, settings: &Settings) -> Self {
        Self {
            translator,
            channels,
            lega_inbound_queue: settings.lega.queue.clone(),
            cega_exchange: settings.cega.exchange.clone(),
            forward_lock: Mutex::new(()),
        }
    }

    /// Forwards one delivery consumed under `rule` and settles it.
    ///
    /// An `Err` means the process can no longer guarantee a disposition for
    /// its deliveries: the source channel refused an ack or nack, or an
    /// error record could not be published.
    pub async fn forward(
        &self,
        rule: &RoutingRule,
        delivery: &Delivery,
    ) -> Result<Disposition, ForwardError> {
        let _guard = self.forward_lock.lock().await;
        let source = self.channels.source(rule.direction);
        let tag = delivery.delivery_tag;

        let transformed = match transform(delivery, rule.direction, &self.translator).await {
            Ok(transformed) => transformed,
            Err(e) => {
                warn!(
                    queue = %rule.queue,
                    direction = %rule.direction,
                    correlation_id = delivery.correlation_id().unwrap_or_default(),
                    error = %e,
                    "Rejecting delivery"
                );
                settle(source.nack(tag, false, false).await, "nack", tag)?;
                self.report_error(delivery, &e).await?;
                return Ok(Disposition::Rejected);
            }
        };

        let routing_key = self.routing_key(rule, &transformed);
        let published = self
            .channels
            .destination(rule.direction)
            .publish(
                &rule.exchange,
                &routing_key,
                false,
                false,
                transformed.publishing,
            )
            .await;

        if let Err(e) = published {
            warn!(
                queue = %rule.queue,
                to_exchange = %rule.exchange,
                to_routing_key = %routing_key,
                correlation_id = delivery.correlation_id().unwrap_or_default(),
                error = %e,
                "Publish failed, requeueing delivery"
            );
            settle(source.nack(tag, false, true).await, "nack", tag)?;
            return Ok(Disposition::Requeued);
        }

        settle(source.ack(tag, false).await, "ack", tag)?;
        info!(
            from_exchange = %delivery.exchange,
            from_routing_key = %delivery.routing_key,
            to_exchange = %rule.exchange,
            to_routing_key = %routing_key,
            correlation_id = delivery.correlation_id().unwrap_or_default(),
            redelivered = delivery.redelivered,
            "Forwarded message"
        );
        debug!(body = %delivery.body_text(), "Forwarded body");
        Ok(Disposition::Acked)
    }

    /// CEGA to LEGA always targets the LEGA inbound queue. LEGA to CEGA uses
    /// the message type when there is one.
    fn routing_key(&self, rule: &RoutingRule, transformed: &Transformed) -> String {
        match rule.direction {
            Direction::CegaToLega => self.lega_inbound_queue.clone(),
            Direction::LegaToCega => transformed
                .message_type
                .clone()
                .unwrap_or_else(|| rule.default_routing_key.clone()),
        }
    }

    async fn report_error(
        &self,
        delivery: &Delivery,
        error: &TransformError,
    ) -> Result<(), ForwardError> {
        let publishing = ErrorRecord::new(delivery, error)
            .to_publishing(delivery)
            .map_err(ForwardError::ErrorEncode)?;

        self.channels
            .cega_publish
            .publish(
                &self.cega_exchange,
                ERROR_ROUTING_KEY,
                false,
                false,
                publishing,
            )
            .await
            .map_err(ForwardError::ErrorReport)
    }
}

fn settle(
    result: Result<(), ChannelError>,
    action: &'static str,
    tag: u64,
) -> Result<(), ForwardError> {
    result.map_err(|source| ForwardError::Disposition {
        action,
        tag,
        source,
    })
}

/// Forwards every delivery of `stream` in order.
///
/// Only returns on a condition the consumer cannot recover from: a fatal
/// forward error, a failing stream, or the stream ending.
pub async fn run_consumer<S>(router: Arc<Router>, rule: RoutingRule, stream: S) -> ForwardError
where
    S: Stream<Item = Result<Delivery, ChannelError>>,
{
    info!(queue = %rule.queue, direction = %rule.direction, "Consuming queue");
    tokio::pin!(stream);

    while let Some(next) = stream.next().await {
        let delivery = match next {
            Ok(delivery) => delivery,
            Err(source) => {
                return ForwardError::Consume {
                    queue: rule.queue,
                    source,
                };
            }
        };
        if let Err(e) = router.forward(&rule, &delivery).await {
            return e;
        }
    }

    ForwardError::ConsumerClosed { queue: rule.queue }
}
