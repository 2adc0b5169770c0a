//! Wire envelopes for the worker protocol.
//!
//! The host and the worker exchange newline-delimited JSON frames. Each
//! request carries a correlation id and a Python expression or statement to
//! evaluate; each reply carries the same id and either a tagged value payload
//! or the exception the evaluation raised. The worker answers every request
//! exactly once, in issue order.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single evaluation submitted to the worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalRequest {
    pub id: u64,
    pub code: String,
}

/// A successful reply carrying the evaluated value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalValueReply {
    pub id: u64,
    pub value: RawValue,
}

/// A reply reporting that evaluation raised in the remote interpreter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalErrorReply {
    pub id: u64,
    pub error: RemoteFailure,
}

/// A reply to a request, containing either the value or the failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EvalReply {
    Value(EvalValueReply),
    Error(EvalErrorReply),
}

impl EvalReply {
    /// Correlation id this reply answers.
    pub fn id(&self) -> u64 {
        match self {
            Self::Value(reply) => reply.id,
            Self::Error(reply) => reply.id,
        }
    }

    /// Collapse the reply into the crate result shape, surfacing remote
    /// exceptions as [`Error::RemoteEval`](crate::Error::RemoteEval).
    pub fn into_result(self) -> Result<RawValue> {
        match self {
            Self::Value(reply) => Ok(reply.value),
            Self::Error(reply) => Err(reply.error.into()),
        }
    }
}

/// The exception surface captured by the worker when evaluation raises.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteFailure {
    /// Exception type name, verbatim (e.g. `KeyError`).
    pub kind: String,
    /// Exception message, verbatim.
    pub message: String,
    /// Traceback text, when the worker captured one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

/// A tagged value payload.
///
/// The worker reduces every evaluation result to one of these shapes. Values
/// that are not transferable scalars come back as `ref`: an accessor-path
/// string the host turns into a new remote handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<RawValue>),
    Ref(String),
}

impl RawValue {
    /// Tag name as it appears on the wire, used in decode diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Ref(_) => "ref",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape() {
        let request = EvalRequest {
            id: 7,
            code: "scene.name".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"id":7,"code":"scene.name"}"#);
    }

    #[test]
    fn value_reply_parses() {
        let reply: EvalReply =
            serde_json::from_str(r#"{"id":3,"value":{"type":"int","value":42}}"#).unwrap();
        assert_eq!(reply.id(), 3);
        assert_eq!(reply.into_result().unwrap(), RawValue::Int(42));
    }

    #[test]
    fn error_reply_parses() {
        let reply: EvalReply = serde_json::from_str(
            r#"{"id":4,"error":{"kind":"KeyError","message":"'missing'"}}"#,
        )
        .unwrap();
        assert_eq!(reply.id(), 4);
        let err = reply.into_result().unwrap_err();
        match err {
            crate::Error::RemoteEval { kind, message, traceback } => {
                assert_eq!(kind, "KeyError");
                assert_eq!(message, "'missing'");
                assert!(traceback.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn none_payload_has_no_content() {
        let json = serde_json::to_string(&RawValue::None).unwrap();
        assert_eq!(json, r#"{"type":"none"}"#);
        let back: RawValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RawValue::None);
    }

    #[test]
    fn ref_payload_round_trips() {
        let json = serde_json::to_string(&RawValue::Ref("scene.objects[0]".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"ref","value":"scene.objects[0]"}"#);
    }
}
