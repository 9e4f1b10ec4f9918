//! In-memory channel used to exercise the forwarding engine without a broker.
//!
//! A `MemoryChannel` stands in for one exchange. Publications are appended to
//! the queue bound to their routing key; keys without a binding land in a
//! queue named after the key itself. Publishing to any other exchange fails,
//! which is also how tests detect a message sent to the wrong side.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;

use super::{DeliveryTag, MqChannel, Publishing};
use crate::utils::error::ChannelError;

#[derive(Debug, Default)]
struct State {
    queues: HashMap<String, VecDeque<Publishing>>,
    ack: bool,
    nack: bool,
    last_requeue: Option<bool>,
    unavailable: Option<String>,
}

#[derive(Debug)]
pub struct MemoryChannel {
    exchange: String,
    bindings: HashMap<String, String>,
    state: Mutex<State>,
}

/// The subset of a RabbitMQ definitions export the channel understands.
#[derive(Debug, Deserialize)]
struct Definitions {
    #[serde(default)]
    exchanges: Vec<ExchangeDefinition>,
    #[serde(default)]
    bindings: Vec<BindingDefinition>,
}

#[derive(Debug, Deserialize)]
struct ExchangeDefinition {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BindingDefinition {
    routing_key: String,
    destination: String,
}

impl MemoryChannel {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            bindings: HashMap::new(),
            state: Mutex::new(State::default()),
        }
    }

    /// Routes `routing_key` to `queue`.
    pub fn bind(mut self, routing_key: impl Into<String>, queue: impl Into<String>) -> Self {
        self.bindings.insert(routing_key.into(), queue.into());
        self
    }

    /// Builds a channel from a RabbitMQ definitions export. The last exchange
    /// listed becomes the channel's exchange.
    pub fn from_definitions(json: &str) -> Result<Self, serde_json::Error> {
        let definitions: Definitions = serde_json::from_str(json)?;
        let exchange = definitions
            .exchanges
            .into_iter()
            .next_back()
            .map(|e| e.name)
            .unwrap_or_default();

        Ok(definitions
            .bindings
            .into_iter()
            .fold(Self::new(exchange), |channel, binding| {
                channel.bind(binding.routing_key, binding.destination)
            }))
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Makes every subsequent publish fail with `reason`, or restores normal
    /// operation when `reason` is `None`.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.state().unavailable = reason.map(str::to_string);
    }

    /// Removes and returns the oldest message in `queue`.
    pub fn take_message(&self, queue: &str) -> Option<Publishing> {
        self.state()
            .queues
            .get_mut(queue)
            .and_then(VecDeque::pop_front)
    }

    pub fn queue_len(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Returns whether ack and nack were invoked since the last call, then
    /// resets both flags.
    pub fn take_ack_nack(&self) -> (bool, bool) {
        let mut state = self.state();
        let flags = (state.ack, state.nack);
        state.ack = false;
        state.nack = false;
        flags
    }

    /// The requeue flag of the most recent nack or reject.
    pub fn last_requeue(&self) -> Option<bool> {
        self.state().last_requeue
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MqChannel for MemoryChannel {
    async fn ack(&self, _tag: DeliveryTag, _multiple: bool) -> Result<(), ChannelError> {
        self.state().ack = true;
        Ok(())
    }

    async fn nack(
        &self,
        _tag: DeliveryTag,
        _multiple: bool,
        requeue: bool,
    ) -> Result<(), ChannelError> {
        let mut state = self.state();
        state.nack = true;
        state.last_requeue = Some(requeue);
        Ok(())
    }

    async fn reject(&self, _tag: DeliveryTag, requeue: bool) -> Result<(), ChannelError> {
        self.state().last_requeue = Some(requeue);
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        _mandatory: bool,
        _immediate: bool,
        msg: Publishing,
    ) -> Result<(), ChannelError> {
        let mut state = self.state();
        if let Some(reason) = &state.unavailable {
            return Err(ChannelError::Unavailable(reason.clone()));
        }
        if exchange != self.exchange {
            return Err(ChannelError::WrongExchange {
                expected: self.exchange.clone(),
                actual: exchange.to_string(),
            });
        }

        let queue = self
            .bindings
            .get(routing_key)
            .cloned()
            .unwrap_or_else(|| routing_key.to_string());
        state.queues.entry(queue).or_default().push_back(msg);
        Ok(())
    }
}
