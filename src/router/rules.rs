use crate::config::Settings;
use crate::identity::Direction;

/// LEGA status queues and the CEGA routing key used when a message carries
/// no `type`.
pub const LEGA_STATUS_QUEUES: [(&str, &str); 4] = [
    ("error", "files.error"),
    ("verified", "files.verified"),
    ("completed", "files.completed"),
    ("inbox", "files.inbox"),
];

/// Where deliveries from one monitored queue go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    pub queue: String,
    pub direction: Direction,
    pub exchange: String,
    pub default_routing_key: String,
}

impl RoutingRule {
    pub fn new(
        queue: impl Into<String>,
        direction: Direction,
        exchange: impl Into<String>,
        default_routing_key: impl Into<String>,
    ) -> Self {
        Self {
            queue: queue.into(),
            direction,
            exchange: exchange.into(),
            default_routing_key: default_routing_key.into(),
        }
    }
}

/// The five rules the interceptor serves: the CEGA inbound queue towards the
/// LEGA exchange, and each LEGA status queue towards the CEGA exchange.
pub fn standard_rules(settings: &Settings) -> Vec<RoutingRule> {
    let inbound = RoutingRule::new(
        settings.cega.queue.as_str(),
        Direction::CegaToLega,
        settings.lega.exchange.as_str(),
        "",
    );

    std::iter::once(inbound)
        .chain(LEGA_STATUS_QUEUES.iter().map(|(queue, key)| {
            RoutingRule::new(
                *queue,
                Direction::LegaToCega,
                settings.cega.exchange.as_str(),
                *key,
            )
        }))
        .collect()
}
