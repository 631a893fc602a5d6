//! Flex messaging records
//!
//! Plain data records mirroring the `flex.messaging.messages.*` classes
//! carried inside packet bodies by legacy remoting peers. They are
//! collaborators of the codec, not part of it: each converts to and from
//! a class-name-tagged [`Object`] value and the engines treat them like
//! any other structured record.

use chrono::Utc;

use crate::value::{AmfValue, Object};

pub const ASYNC_MESSAGE_CLASS: &str = "flex.messaging.messages.AsyncMessage";
pub const ACKNOWLEDGE_MESSAGE_CLASS: &str = "flex.messaging.messages.AcknowledgeMessage";
pub const COMMAND_MESSAGE_CLASS: &str = "flex.messaging.messages.CommandMessage";
pub const ERROR_MESSAGE_CLASS: &str = "flex.messaging.messages.ErrorMessage";
pub const REMOTING_MESSAGE_CLASS: &str = "flex.messaging.messages.RemotingMessage";

/// Random message id in the `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX` shape
/// peers generate, with the RFC 4122 version and variant bits set
pub fn generate_id() -> String {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;
    format!(
        "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
        bytes[0],
        bytes[1],
        bytes[2],
        bytes[3],
        bytes[4],
        bytes[5],
        bytes[6],
        bytes[7],
        bytes[8],
        bytes[9],
        bytes[10],
        bytes[11],
        bytes[12],
        bytes[13],
        bytes[14],
        bytes[15]
    )
}

/// Structural check for the message-id shape
pub fn valid_id(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    parts.len() == 5
        && [8, 4, 4, 4, 12]
            .iter()
            .zip(&parts)
            .all(|(len, part)| part.len() == *len && part.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn timestamp_millis() -> f64 {
    Utc::now().timestamp_millis() as f64
}

fn headers_with_ds_id(client_id: &str) -> AmfValue {
    Object::anonymous().with_field("DSId", client_id).into()
}

/// Invocation of a remote service method
#[derive(Debug, Clone, PartialEq)]
pub struct RemotingMessage {
    pub message_id: String,
    pub client_id: String,
    pub timestamp: f64,
    pub time_to_live: f64,
    pub destination: String,
    pub source: String,
    pub operation: String,
    pub body: AmfValue,
}

impl RemotingMessage {
    pub fn new(
        client_id: impl Into<String>,
        destination: impl Into<String>,
        source: impl Into<String>,
        operation: impl Into<String>,
        params: AmfValue,
    ) -> Self {
        Self {
            message_id: generate_id(),
            client_id: client_id.into(),
            timestamp: timestamp_millis(),
            time_to_live: 0.0,
            destination: destination.into(),
            source: source.into(),
            operation: operation.into(),
            body: params,
        }
    }

    pub fn to_value(&self) -> AmfValue {
        Object::typed(REMOTING_MESSAGE_CLASS)
            .with_field("messageId", self.message_id.as_str())
            .with_field("clientId", self.client_id.as_str())
            .with_field("timestamp", self.timestamp)
            .with_field("timeToLive", self.time_to_live)
            .with_field("destination", self.destination.as_str())
            .with_field("headers", headers_with_ds_id(&self.client_id))
            .with_field("body", self.body.clone())
            .with_field("source", self.source.as_str())
            .with_field("operation", self.operation.as_str())
            .into()
    }

    /// Extract a remoting message from a decoded record
    pub fn from_value(value: &AmfValue) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.class_name.as_deref() != Some(REMOTING_MESSAGE_CLASS) {
            return None;
        }
        Some(Self {
            message_id: value.get_str("messageId").unwrap_or_default().to_string(),
            client_id: value.get_str("clientId").unwrap_or_default().to_string(),
            timestamp: value.get_number("timestamp").unwrap_or_default(),
            time_to_live: value.get_number("timeToLive").unwrap_or_default(),
            destination: value.get_str("destination").unwrap_or_default().to_string(),
            source: value.get_str("source").unwrap_or_default().to_string(),
            operation: value.get_str("operation").unwrap_or_default().to_string(),
            body: value.get("body").cloned().unwrap_or(AmfValue::Null),
        })
    }
}

/// Positive response correlated to a request message
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeMessage {
    pub message_id: String,
    pub client_id: String,
    pub correlation_id: String,
    pub timestamp: f64,
    pub time_to_live: f64,
    pub destination: String,
    pub body: AmfValue,
}

impl AcknowledgeMessage {
    /// Build an acknowledgement for a decoded request record
    ///
    /// The client id comes from the request's `clientId`, falling back to
    /// its `DSId` header; a missing or `"nil"` id gets a fresh one.
    pub fn acknowledging(request: &AmfValue) -> Self {
        let mut client_id = request.get_str("clientId").unwrap_or_default().to_string();
        if client_id.is_empty() {
            if let Some(ds_id) = request.get("headers").and_then(|h| h.get_str("DSId")) {
                client_id = ds_id.to_string();
            }
        }
        if client_id.is_empty() || client_id == "nil" {
            client_id = generate_id();
        }
        Self {
            message_id: generate_id(),
            correlation_id: request.get_str("messageId").unwrap_or_default().to_string(),
            client_id,
            timestamp: timestamp_millis(),
            time_to_live: 0.0,
            destination: String::new(),
            body: AmfValue::Null,
        }
    }

    pub fn with_body(mut self, body: AmfValue) -> Self {
        self.body = body;
        self
    }

    pub fn to_value(&self) -> AmfValue {
        self.build_value(ACKNOWLEDGE_MESSAGE_CLASS).into()
    }

    fn build_value(&self, class_name: &str) -> Object {
        Object::typed(class_name)
            .with_field("messageId", self.message_id.as_str())
            .with_field("clientId", self.client_id.as_str())
            .with_field("correlationId", self.correlation_id.as_str())
            .with_field("timestamp", self.timestamp)
            .with_field("timeToLive", self.time_to_live)
            .with_field("destination", self.destination.as_str())
            .with_field("headers", headers_with_ds_id(&self.client_id))
            .with_field("body", self.body.clone())
    }
}

/// Negative response carrying fault information
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub acknowledge: AcknowledgeMessage,
    pub fault_code: String,
    pub fault_string: String,
    pub fault_detail: String,
    pub extended_data: AmfValue,
    pub root_cause: AmfValue,
}

impl ErrorMessage {
    pub fn for_fault(
        request: &AmfValue,
        fault_code: impl Into<String>,
        fault_string: impl Into<String>,
        fault_detail: impl Into<String>,
    ) -> Self {
        Self {
            acknowledge: AcknowledgeMessage::acknowledging(request),
            fault_code: fault_code.into(),
            fault_string: fault_string.into(),
            fault_detail: fault_detail.into(),
            extended_data: AmfValue::Null,
            root_cause: AmfValue::Null,
        }
    }

    pub fn to_value(&self) -> AmfValue {
        self.acknowledge
            .build_value(ERROR_MESSAGE_CLASS)
            .with_field("extendedData", self.extended_data.clone())
            .with_field("faultCode", self.fault_code.as_str())
            .with_field("faultDetail", self.fault_detail.as_str())
            .with_field("faultString", self.fault_string.as_str())
            .with_field("rootCause", self.root_cause.clone())
            .into()
    }
}

/// Client/server control message distinguished by an operation code
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    pub message_id: String,
    pub client_id: String,
    pub correlation_id: String,
    pub timestamp: f64,
    pub time_to_live: f64,
    pub destination: String,
    pub operation: f64,
    pub body: AmfValue,
}

impl CommandMessage {
    pub const SUBSCRIBE_OPERATION: f64 = 0.0;
    pub const UNSUBSCRIBE_OPERATION: f64 = 1.0;
    pub const POLL_OPERATION: f64 = 2.0;
    pub const CLIENT_SYNC_OPERATION: f64 = 4.0;
    pub const CLIENT_PING_OPERATION: f64 = 5.0;
    pub const CLUSTER_REQUEST_OPERATION: f64 = 7.0;
    pub const LOGIN_OPERATION: f64 = 8.0;
    pub const LOGOUT_OPERATION: f64 = 9.0;
    pub const SESSION_INVALIDATE_OPERATION: f64 = 10.0;
    pub const MULTI_SUBSCRIBE_OPERATION: f64 = 11.0;
    pub const DISCONNECT_OPERATION: f64 = 12.0;
    pub const UNKNOWN_OPERATION: f64 = 10000.0;

    pub fn new(operation: f64) -> Self {
        Self {
            message_id: generate_id(),
            client_id: String::new(),
            correlation_id: String::new(),
            timestamp: timestamp_millis(),
            time_to_live: 0.0,
            destination: String::new(),
            operation,
            body: AmfValue::Null,
        }
    }

    pub fn to_value(&self) -> AmfValue {
        Object::typed(COMMAND_MESSAGE_CLASS)
            .with_field("messageId", self.message_id.as_str())
            .with_field("clientId", self.client_id.as_str())
            .with_field("correlationId", self.correlation_id.as_str())
            .with_field("timestamp", self.timestamp)
            .with_field("timeToLive", self.time_to_live)
            .with_field("destination", self.destination.as_str())
            .with_field("operation", self.operation)
            .with_field("body", self.body.clone())
            .into()
    }

    pub fn from_value(value: &AmfValue) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.class_name.as_deref() != Some(COMMAND_MESSAGE_CLASS) {
            return None;
        }
        Some(Self {
            message_id: value.get_str("messageId").unwrap_or_default().to_string(),
            client_id: value.get_str("clientId").unwrap_or_default().to_string(),
            correlation_id: value
                .get_str("correlationId")
                .unwrap_or_default()
                .to_string(),
            timestamp: value.get_number("timestamp").unwrap_or_default(),
            time_to_live: value.get_number("timeToLive").unwrap_or_default(),
            destination: value.get_str("destination").unwrap_or_default().to_string(),
            operation: value
                .get_number("operation")
                .unwrap_or(Self::UNKNOWN_OPERATION),
            body: value.get("body").cloned().unwrap_or(AmfValue::Null),
        })
    }
}
