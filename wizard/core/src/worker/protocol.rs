//! Worker Wire Protocol
//!
//! Messages exchanged with an out-of-process worker. Every request carries a
//! client-chosen id; the worker answers each one with exactly one
//! [`WorkerFrame::Reply`] bearing the same id. Events are unsolicited.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::EventChannel;

/// Request id, unique per connection
pub type RequestId = u64;

/// Client → worker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Run a named command
    Invoke {
        /// Request id
        id: RequestId,
        /// Command name
        command: String,
        /// JSON arguments
        args: Value,
    },

    /// Start forwarding a channel's events to this connection
    ///
    /// The request id doubles as the subscription id.
    Listen {
        /// Request id
        id: RequestId,
        /// Channel to forward
        channel: EventChannel,
    },

    /// Stop a subscription started by `Listen`
    Unlisten {
        /// Request id
        id: RequestId,
        /// Id of the original `Listen` request
        subscription: RequestId,
    },
}

impl WorkerRequest {
    /// The request id
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Invoke { id, .. } | Self::Listen { id, .. } | Self::Unlisten { id, .. } => *id,
        }
    }
}

/// Result carried by a reply
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// Command result
    Ok(Value),
    /// Structured worker error
    Err(Value),
}

impl From<ReplyOutcome> for Result<Value, Value> {
    fn from(outcome: ReplyOutcome) -> Self {
        match outcome {
            ReplyOutcome::Ok(v) => Ok(v),
            ReplyOutcome::Err(e) => Err(e),
        }
    }
}

/// Worker → client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerFrame {
    /// Answer to a request
    Reply {
        /// Id of the request being answered
        id: RequestId,
        /// Outcome
        outcome: ReplyOutcome,
    },

    /// Event published on a channel
    Event {
        /// Source channel
        channel: EventChannel,
        /// Event payload
        payload: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let req = WorkerRequest::Invoke {
            id: 3,
            command: "remove_file".to_string(),
            args: json!({ "fileName": "a.xci" }),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "invoke": { "id": 3, "command": "remove_file", "args": { "fileName": "a.xci" } } })
        );
        assert_eq!(req.id(), 3);

        let listen = WorkerRequest::Listen {
            id: 4,
            channel: EventChannel::Message,
        };
        assert_eq!(
            serde_json::to_value(&listen).unwrap(),
            json!({ "listen": { "id": 4, "channel": "extract_message" } })
        );
    }

    #[test]
    fn test_reply_wire_shape() {
        let frame: WorkerFrame = serde_json::from_value(json!({
            "reply": { "id": 9, "outcome": { "err": { "RequiredFilesMissing": ["MW_Model.pack"] } } }
        }))
        .unwrap();

        match frame {
            WorkerFrame::Reply { id, outcome } => {
                assert_eq!(id, 9);
                let result: Result<Value, Value> = outcome.into();
                assert_eq!(result, Err(json!({ "RequiredFilesMissing": ["MW_Model.pack"] })));
            }
            WorkerFrame::Event { .. } => panic!("expected reply"),
        }
    }
}
