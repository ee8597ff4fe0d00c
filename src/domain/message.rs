//! Protocol message codec for `graphql-transport-ws`.
//!
//! [`Message`] covers the six message types exchanged over a connection.
//! [`Message::parse`] validates raw JSON text into a fully-populated value,
//! rejecting anything that violates the protocol shape. [`Message::to_json`]
//! is the inverse for outbound construction and reproduces the wire field
//! order required by the protocol: `id` (when applicable), then `type`, then
//! `payload` (only when present).

use serde::Serialize;
use serde_json::Value;

use crate::error::{ConnectionError, QueryError};

/// A `graphql-transport-ws` protocol message.
///
/// | Type              | Direction       | Fields                                     |
/// |-------------------|-----------------|--------------------------------------------|
/// | `connection_init` | client → server | `payload?`                                 |
/// | `connection_ack`  | server → client | `payload?`                                 |
/// | `subscribe`       | client → server | `id`, `query`, `operationName?`, `variables?` |
/// | `next`            | server → client | `id`, `payload`                            |
/// | `error`           | server → client | `id`, `payload` (non-empty error list)     |
/// | `complete`        | both            | `id`                                       |
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Client request to establish a protocol-level connection.
    ConnectionInit {
        /// Optional payload, typically carrying authentication data.
        payload: Option<Value>,
    },
    /// Server acknowledgement of a successful `connection_init`.
    ConnectionAck {
        /// Optional payload returned to the client.
        payload: Option<Value>,
    },
    /// Client request to start an operation under a client-chosen id.
    Subscribe {
        /// Client-chosen operation id, unique among open subscriptions.
        id: String,
        /// The GraphQL query document text.
        query: String,
        /// Operation to run when the document contains more than one.
        operation_name: Option<String>,
        /// Variables for the operation.
        variables: Option<Value>,
    },
    /// Server delivery of one execution result for a subscription.
    Next {
        /// The subscription id this result belongs to.
        id: String,
        /// Execution-result object.
        payload: Value,
    },
    /// Server delivery of operation-level errors for a subscription.
    Error {
        /// The subscription id the errors belong to.
        id: String,
        /// Non-empty list of GraphQL error objects.
        payload: Vec<Value>,
    },
    /// Completion of a subscription, sent by either side.
    Complete {
        /// The subscription id being completed.
        id: String,
    },
}

/// Outbound frame with the protocol's fixed field order.
///
/// Field declaration order is the wire order; serde serializes struct fields
/// in declaration order, which is what makes this a protocol contract rather
/// than a cosmetic choice.
#[derive(Serialize)]
struct WireFrame<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(rename = "type")]
    message_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl Message {
    /// Parses a raw text frame into a protocol message.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidMessage`] when the text is not valid
    /// JSON, the `type` field is missing, empty, or unknown, or a
    /// type-specific required field is absent (`subscribe` requires `id` and
    /// `payload.query`; `complete`, `next`, and `error` require `id`; `next`
    /// and `error` require a non-empty `payload`).
    pub fn parse(raw: &str) -> Result<Self, ConnectionError> {
        let data: Value = serde_json::from_str(raw)
            .map_err(|_| ConnectionError::InvalidMessage("Invalid JSON".to_string()))?;

        let Some(message_type) = data
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        else {
            return Err(ConnectionError::InvalidMessage("Missing type".to_string()));
        };

        match message_type {
            "connection_init" => Ok(Self::ConnectionInit {
                payload: optional_payload(&data),
            }),
            "connection_ack" => Ok(Self::ConnectionAck {
                payload: optional_payload(&data),
            }),
            "subscribe" => {
                let id = required_id(&data)?;
                let payload = data.get("payload").and_then(Value::as_object);
                let query = payload
                    .and_then(|p| p.get("query"))
                    .and_then(Value::as_str)
                    .filter(|q| !q.is_empty())
                    .ok_or_else(|| {
                        ConnectionError::InvalidMessage("Missing payload.query".to_string())
                    })?
                    .to_string();
                let operation_name = payload
                    .and_then(|p| p.get("operationName"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let variables = payload
                    .and_then(|p| p.get("variables"))
                    .filter(|v| !v.is_null())
                    .cloned();
                Ok(Self::Subscribe {
                    id,
                    query,
                    operation_name,
                    variables,
                })
            }
            "next" => {
                let id = required_id(&data)?;
                let payload = data
                    .get("payload")
                    .filter(|p| !p.is_null())
                    .cloned()
                    .ok_or_else(|| {
                        ConnectionError::InvalidMessage("Missing payload".to_string())
                    })?;
                Ok(Self::Next { id, payload })
            }
            "error" => {
                let id = required_id(&data)?;
                let payload = data
                    .get("payload")
                    .and_then(Value::as_array)
                    .filter(|errors| !errors.is_empty())
                    .cloned()
                    .ok_or_else(|| {
                        ConnectionError::InvalidMessage("Missing payload".to_string())
                    })?;
                Ok(Self::Error { id, payload })
            }
            "complete" => Ok(Self::Complete {
                id: required_id(&data)?,
            }),
            unknown => Err(ConnectionError::InvalidMessage(format!(
                "Unsupported type '{unknown}'"
            ))),
        }
    }

    /// Returns the wire discriminator for this message.
    #[must_use]
    pub const fn message_type(&self) -> &'static str {
        match self {
            Self::ConnectionInit { .. } => "connection_init",
            Self::ConnectionAck { .. } => "connection_ack",
            Self::Subscribe { .. } => "subscribe",
            Self::Next { .. } => "next",
            Self::Error { .. } => "error",
            Self::Complete { .. } => "complete",
        }
    }

    /// Creates a `connection_ack` message.
    #[must_use]
    pub const fn connection_ack(payload: Option<Value>) -> Self {
        Self::ConnectionAck { payload }
    }

    /// Creates a `next` message carrying one execution result.
    #[must_use]
    pub fn next(id: impl Into<String>, payload: Value) -> Self {
        Self::Next {
            id: id.into(),
            payload,
        }
    }

    /// Creates an `error` message from operation-level errors.
    #[must_use]
    pub fn error(id: impl Into<String>, errors: &[QueryError]) -> Self {
        Self::Error {
            id: id.into(),
            payload: errors
                .iter()
                .map(|e| serde_json::json!({ "message": e.message.as_str() }))
                .collect(),
        }
    }

    /// Creates a `complete` message.
    #[must_use]
    pub fn complete(id: impl Into<String>) -> Self {
        Self::Complete { id: id.into() }
    }

    /// Serializes this message to its wire representation.
    ///
    /// Field order is fixed: `id` (if applicable), `type`, `payload` (only
    /// when present). Never fails for values constructed through this type.
    #[must_use]
    pub fn to_json(&self) -> String {
        let frame = match self {
            Self::ConnectionInit { payload } => WireFrame {
                id: None,
                message_type: self.message_type(),
                payload: payload.clone(),
            },
            Self::ConnectionAck { payload } => WireFrame {
                id: None,
                message_type: self.message_type(),
                payload: payload.clone(),
            },
            Self::Subscribe {
                id,
                query,
                operation_name,
                variables,
            } => WireFrame {
                id: Some(id),
                message_type: self.message_type(),
                payload: Some(serde_json::json!({
                    "operationName": operation_name,
                    "query": query,
                    "variables": variables,
                })),
            },
            Self::Next { id, payload } => WireFrame {
                id: Some(id),
                message_type: self.message_type(),
                payload: Some(payload.clone()),
            },
            Self::Error { id, payload } => WireFrame {
                id: Some(id),
                message_type: self.message_type(),
                payload: Some(Value::Array(payload.clone())),
            },
            Self::Complete { id } => WireFrame {
                id: Some(id),
                message_type: self.message_type(),
                payload: None,
            },
        };
        serde_json::to_string(&frame).unwrap_or_default()
    }
}

/// Extracts a required non-empty `id` field.
fn required_id(data: &Value) -> Result<String, ConnectionError> {
    data.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConnectionError::InvalidMessage("Missing id".to_string()))
}

/// Extracts an optional `payload` object, treating `null` as absent.
fn optional_payload(data: &Value) -> Option<Value> {
    data.get("payload").filter(|p| !p.is_null()).cloned()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn parse_err(raw: &str) -> String {
        match Message::parse(raw) {
            Err(ConnectionError::InvalidMessage(reason)) => reason,
            other => panic!("expected InvalidMessage, got {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_json() {
        assert_eq!(parse_err("{not json"), "Invalid JSON");
    }

    #[test]
    fn rejects_missing_or_empty_type() {
        assert_eq!(parse_err(r#"{"id":"1"}"#), "Missing type");
        assert_eq!(parse_err(r#"{"type":""}"#), "Missing type");
    }

    #[test]
    fn rejects_unknown_type() {
        assert_eq!(parse_err(r#"{"type":"ping"}"#), "Unsupported type 'ping'");
    }

    #[test]
    fn rejects_subscribe_without_id() {
        let raw = r#"{"type":"subscribe","payload":{"query":"subscription{x}"}}"#;
        assert_eq!(parse_err(raw), "Missing id");
    }

    #[test]
    fn rejects_subscribe_without_query() {
        assert_eq!(
            parse_err(r#"{"id":"1","type":"subscribe","payload":{}}"#),
            "Missing payload.query"
        );
        assert_eq!(
            parse_err(r#"{"id":"1","type":"subscribe"}"#),
            "Missing payload.query"
        );
    }

    #[test]
    fn rejects_complete_without_id() {
        assert_eq!(parse_err(r#"{"type":"complete"}"#), "Missing id");
        assert_eq!(parse_err(r#"{"id":"","type":"complete"}"#), "Missing id");
    }

    #[test]
    fn rejects_next_without_payload() {
        assert_eq!(parse_err(r#"{"id":"1","type":"next"}"#), "Missing payload");
    }

    #[test]
    fn rejects_error_with_empty_payload() {
        assert_eq!(
            parse_err(r#"{"id":"1","type":"error","payload":[]}"#),
            "Missing payload"
        );
    }

    #[test]
    fn parses_connection_init_with_payload() {
        let raw = r#"{"type":"connection_init","payload":{"token":"abc"}}"#;
        let Ok(Message::ConnectionInit { payload: Some(p) }) = Message::parse(raw) else {
            panic!("expected connection_init with payload");
        };
        assert_eq!(p.get("token").and_then(Value::as_str), Some("abc"));
    }

    #[test]
    fn parses_connection_init_null_payload_as_absent() {
        let raw = r#"{"type":"connection_init","payload":null}"#;
        let Ok(Message::ConnectionInit { payload: None }) = Message::parse(raw) else {
            panic!("expected connection_init without payload");
        };
    }

    #[test]
    fn parses_subscribe_with_all_fields() {
        let raw = concat!(
            r#"{"id":"op-1","type":"subscribe","payload":{"#,
            r#""query":"subscription($a: Int){x(a: $a)}","#,
            r#""operationName":"Watch","variables":{"a":1}}}"#
        );
        let Ok(Message::Subscribe {
            id,
            query,
            operation_name,
            variables,
        }) = Message::parse(raw)
        else {
            panic!("expected subscribe");
        };
        assert_eq!(id, "op-1");
        assert_eq!(query, "subscription($a: Int){x(a: $a)}");
        assert_eq!(operation_name.as_deref(), Some("Watch"));
        assert_eq!(variables, Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn serializes_ack_without_payload() {
        let json = Message::connection_ack(None).to_json();
        assert_eq!(json, r#"{"type":"connection_ack"}"#);
    }

    #[test]
    fn serializes_id_before_type_before_payload() {
        let json = Message::next("1", serde_json::json!({"data": {"x": 1}})).to_json();
        assert_eq!(json, r#"{"id":"1","type":"next","payload":{"data":{"x":1}}}"#);
    }

    #[test]
    fn serializes_complete_without_payload() {
        let json = Message::complete("7").to_json();
        assert_eq!(json, r#"{"id":"7","type":"complete"}"#);
    }

    #[test]
    fn serializes_error_payload_as_list() {
        let errors = vec![QueryError::new("bad query")];
        let json = Message::error("3", &errors).to_json();
        assert_eq!(
            json,
            r#"{"id":"3","type":"error","payload":[{"message":"bad query"}]}"#
        );
    }

    #[test]
    fn subscribe_round_trips_without_field_loss() {
        let msg = Message::Subscribe {
            id: "1".to_string(),
            query: "subscription{x}".to_string(),
            operation_name: None,
            variables: None,
        };
        let json = msg.to_json();
        assert_eq!(
            json,
            concat!(
                r#"{"id":"1","type":"subscribe","payload":"#,
                r#"{"operationName":null,"query":"subscription{x}","variables":null}}"#
            )
        );
        let Ok(reparsed) = Message::parse(&json) else {
            panic!("round trip failed to parse");
        };
        assert_eq!(reparsed, msg);
    }
}
