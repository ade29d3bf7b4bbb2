//! Worker Layer
//!
//! Everything the wizard needs to talk to the extraction worker: the
//! [`Worker`] trait, the named commands and event channels it exposes, the
//! decoding of its structured errors, and the transports that carry it.
//!
//! # Transports
//!
//! ```text
//! ┌──────────────┐   invoke / listen   ┌──────────────────────────┐
//! │    Wizard    ├────────────────────►│ InProcessWorker          │──► WorkerEndpoint (same process)
//! │              │                     │ UnixSocketWorker         │──► worker.sock (frame protocol)
//! └──────────────┘◄────────────────────┴──────────────────────────┘
//!                     event payloads
//! ```

pub mod config;
pub mod factory;
pub mod frame;
pub mod in_process;
pub mod protocol;
pub mod traits;
pub mod unix_socket;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use config::{default_socket_path, WorkerConfig};
pub use factory::connect_worker;
pub use in_process::{EventEmitter, InProcessWorker, WorkerCall, WorkerEndpoint};
pub use traits::{InvokeError, ReleaseFuture, Subscription, TransportError, Worker};
pub use unix_socket::UnixSocketWorker;

/// Command names understood by the worker
pub mod commands {
    /// Add archives; `{ files? }`, returns the canonical list
    pub const ADD_FILES: &str = "add_files";
    /// Remove one archive; `{ fileName }`, returns the canonical list
    pub const REMOVE_FILE: &str = "remove_file";
    /// Check that the added archives cover every required resource
    pub const ASSERT_ADDED_FILES: &str = "assert_added_files";
    /// Search well-known locations for key files
    pub const FIND_KEYS: &str = "find_keys";
    /// Use a key file; `{ prodKey }`
    pub const SET_PROD_KEY: &str = "set_prod_key";
    /// Let the worker prompt for a key file, returns its identifier
    pub const SELECT_PROD_KEY: &str = "select_prod_key";
    /// Run the extraction and bundling job
    pub const EXTRACT_ASSETS: &str = "extract_assets";
    /// Persist the finished bundle
    pub const SAVE_BUNDLE_DATA: &str = "save_bundle_data";
}

// =============================================================================
// Event Channels
// =============================================================================

/// The worker's published event channels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventChannel {
    /// Progress ratio, number in 0..=100
    #[serde(rename = "extract_progress")]
    Progress,
    /// Free-form log line
    #[serde(rename = "extract_message")]
    Message,
    /// Current step label
    #[serde(rename = "extract_step")]
    Step,
}

impl EventChannel {
    /// All channels, in subscription order
    pub const ALL: [EventChannel; 3] = [Self::Progress, Self::Message, Self::Step];

    /// Wire name of the channel
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "extract_progress",
            Self::Message => "extract_message",
            Self::Step => "extract_step",
        }
    }
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown event channel: {s}"))
    }
}

// =============================================================================
// Error Decoding
// =============================================================================

/// String-keyed error description shown to the user
pub type ErrorMap = BTreeMap<String, String>;

/// Worker error variant carrying the names of missing resource files
const REQUIRED_FILES_MISSING: &str = "RequiredFilesMissing";

/// Worker error emitted when the user dismisses a picker
const FILE_SELECT_CANCELED: &str = "FileSelectCanceled";

/// A worker failure, classified
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedError {
    /// The added archives lack these resource files
    RequiredFilesMissing(Vec<String>),
    /// The user dismissed the worker's file picker
    Canceled,
    /// Anything else
    Unrecognized(ErrorMap),
}

impl DecodedError {
    /// Classify an invocation failure
    #[must_use]
    pub fn from_invoke(err: &InvokeError) -> Self {
        match err {
            InvokeError::Worker(value) => Self::from_value(value),
            InvokeError::Transport(_) => Self::Unrecognized(err.to_error_map()),
        }
    }

    fn from_value(value: &Value) -> Self {
        if let Some(list) = value
            .get(REQUIRED_FILES_MISSING)
            .and_then(Value::as_array)
        {
            return Self::RequiredFilesMissing(list.iter().map(value_text).collect());
        }
        if value.as_str() == Some(FILE_SELECT_CANCELED) {
            return Self::Canceled;
        }
        Self::Unrecognized(error_map(value))
    }
}

impl InvokeError {
    /// Displayable form of the failure
    #[must_use]
    pub fn to_error_map(&self) -> ErrorMap {
        match self {
            Self::Worker(value) => error_map(value),
            Self::Transport(e) => ErrorMap::from([("Transport".to_string(), e.to_string())]),
        }
    }
}

/// Convert a worker error value into a displayable map
///
/// Objects map key by key. A bare string `s` becomes `{"Error": s}`, and any
/// other value becomes `{"Error": <json text>}`.
#[must_use]
pub fn error_map(value: &Value) -> ErrorMap {
    match value {
        Value::Object(fields) => fields
            .iter()
            .map(|(k, v)| (k.clone(), value_text(v)))
            .collect(),
        other => ErrorMap::from([("Error".to_string(), value_text(other))]),
    }
}

/// Render a JSON value as display text, leaving strings unquoted
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_channel_names() {
        assert_eq!(EventChannel::Progress.as_str(), "extract_progress");
        assert_eq!(EventChannel::Message.to_string(), "extract_message");
        assert_eq!("extract_step".parse::<EventChannel>(), Ok(EventChannel::Step));
        assert!("extract_nothing".parse::<EventChannel>().is_err());
        assert_eq!(
            serde_json::to_value(EventChannel::Step).unwrap(),
            json!("extract_step")
        );
    }

    #[test]
    fn test_decode_required_files_missing() {
        let err = InvokeError::Worker(json!({
            "RequiredFilesMissing": ["MW_Model.pack", "MW_Field_Plain.pack"]
        }));
        assert_eq!(
            DecodedError::from_invoke(&err),
            DecodedError::RequiredFilesMissing(vec![
                "MW_Model.pack".to_string(),
                "MW_Field_Plain.pack".to_string()
            ])
        );
    }

    #[test]
    fn test_decode_canceled() {
        let err = InvokeError::Worker(json!("FileSelectCanceled"));
        assert_eq!(DecodedError::from_invoke(&err), DecodedError::Canceled);
    }

    #[test]
    fn test_decode_unrecognized_object() {
        let err = InvokeError::Worker(json!({ "InvalidSignature": "checksum mismatch" }));
        let expected = ErrorMap::from([(
            "InvalidSignature".to_string(),
            "checksum mismatch".to_string(),
        )]);
        assert_eq!(
            DecodedError::from_invoke(&err),
            DecodedError::Unrecognized(expected)
        );
    }

    #[test]
    fn test_error_map_shapes() {
        assert_eq!(
            error_map(&json!("ProdKeyNotSet")),
            ErrorMap::from([("Error".to_string(), "ProdKeyNotSet".to_string())])
        );
        assert_eq!(
            error_map(&json!({ "Io": { "kind": "NotFound" } })),
            ErrorMap::from([("Io".to_string(), r#"{"kind":"NotFound"}"#.to_string())])
        );
        assert_eq!(
            error_map(&json!(42)),
            ErrorMap::from([("Error".to_string(), "42".to_string())])
        );
    }

    #[test]
    fn test_transport_failure_is_unrecognized() {
        let err = InvokeError::Transport(TransportError::ConnectionClosed);
        match DecodedError::from_invoke(&err) {
            DecodedError::Unrecognized(map) => {
                assert_eq!(map.get("Transport").map(String::as_str), Some("Connection closed"));
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }
}
