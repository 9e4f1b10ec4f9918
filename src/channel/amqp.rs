use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use lapin::Channel;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicRejectOptions, ConfirmSelectOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use tracing::debug;
use uuid::Uuid;

use super::{Delivery, DeliveryTag, MqChannel, Publishing};
use crate::utils::error::ChannelError;

/// A live channel on a broker connection.
#[derive(Clone)]
pub struct AmqpChannel {
    channel: Channel,
}

impl AmqpChannel {
    /// Wraps a channel used for consuming and settling deliveries.
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// Wraps a channel used for publishing and switches it to publisher
    /// confirms, so that a broker-side nack surfaces as a publish error.
    pub async fn with_confirms(channel: Channel) -> Result<Self, ChannelError> {
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        Ok(Self { channel })
    }

    /// Starts a manual-ack consumer on `queue`.
    pub async fn consume(
        &self,
        queue: &str,
    ) -> Result<BoxStream<'static, Result<Delivery, ChannelError>>, lapin::Error> {
        let consumer_tag = format!("mq-interceptor-{queue}-{}", Uuid::new_v4());
        let consumer = self
            .channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        debug!(queue, consumer_tag = %consumer_tag, "Consumer started");

        Ok(consumer
            .map(|delivery| delivery.map(Delivery::from).map_err(ChannelError::from))
            .boxed())
    }
}

#[async_trait]
impl MqChannel for AmqpChannel {
    async fn ack(&self, tag: DeliveryTag, multiple: bool) -> Result<(), ChannelError> {
        self.channel
            .basic_ack(tag, BasicAckOptions { multiple })
            .await?;
        Ok(())
    }

    async fn nack(
        &self,
        tag: DeliveryTag,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), ChannelError> {
        self.channel
            .basic_nack(tag, BasicNackOptions { multiple, requeue })
            .await?;
        Ok(())
    }

    async fn reject(&self, tag: DeliveryTag, requeue: bool) -> Result<(), ChannelError> {
        self.channel
            .basic_reject(tag, BasicRejectOptions { requeue })
            .await?;
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        msg: Publishing,
    ) -> Result<(), ChannelError> {
        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    mandatory,
                    immediate,
                },
                &msg.body,
                msg.properties,
            )
            .await?;

        match confirm.await? {
            Confirmation::Nack(_) => Err(ChannelError::Nacked {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
            }),
            Confirmation::Ack(_) | Confirmation::NotRequested => Ok(()),
        }
    }
}
