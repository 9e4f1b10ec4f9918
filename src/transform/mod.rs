//! The `transform` module rebuilds a delivery as the publishing that goes to
//! the other side of the bridge.
//!
//! Bodies are JSON objects. Two fields matter:
//!
//! - `type`: when it is a string it becomes the message-type hint the router
//!   may use as routing key.
//! - `user`: an identity in the source namespace. It is replaced by the
//!   mapped identity of the destination namespace.
//!
//! Without a `user` field the body is forwarded byte for byte. With one, the
//! object is re-encoded compactly with its key order preserved, so only
//! insignificant whitespace can differ besides the `user` value.

use serde_json::{Map, Value};

use crate::channel::{Delivery, Publishing};
use crate::identity::{Direction, IdentityTranslator};
use crate::utils::error::TransformError;

/// The outcome of a successful transform.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub publishing: Publishing,
    pub message_type: Option<String>,
}

pub async fn transform(
    delivery: &Delivery,
    direction: Direction,
    translator: &IdentityTranslator,
) -> Result<Transformed, TransformError> {
    let mut message: Map<String, Value> =
        serde_json::from_slice(&delivery.body).map_err(TransformError::Malformed)?;

    let message_type = message
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);

    let Some(user) = message.get("user").map(user_text) else {
        return Ok(Transformed {
            publishing: Publishing::forward(delivery, delivery.body.clone()),
            message_type,
        });
    };

    let translated = translator.translate(&user, direction).await?;
    message.insert("user".to_string(), Value::String(translated));
    let body = serde_json::to_vec(&message).map_err(TransformError::Encode)?;

    Ok(Transformed {
        publishing: Publishing::forward(delivery, body),
        message_type,
    })
}

/// Strings are used as they are; any other JSON value by its JSON text.
fn user_text(value: &Value) -> String {
    match value {
        Value::String(user) => user.clone(),
        other => other.to_string(),
    }
}
