// SPDX-FileCopyrightText: 2026 Holdfast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Versioned JSON encoding of the persisted operation list.
//!
//! Version 1 is an envelope `{"schema_version": 1, "operations": [...]}`.
//! Version 0 is a bare array of operations with no envelope; it is
//! accepted on load and rewritten as version 1 on the next save.

use holdfast_core::{HoldfastError, Operation};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema_version: u32,
    operations: &'a [Operation],
}

#[derive(Deserialize)]
struct Envelope {
    schema_version: u32,
    operations: Vec<Operation>,
}

/// Decoded contents of a persisted slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub schema_version: u32,
    pub operations: Vec<Operation>,
}

pub fn encode(operations: &[Operation]) -> Result<Vec<u8>, HoldfastError> {
    serde_json::to_vec(&EnvelopeRef {
        schema_version: SCHEMA_VERSION,
        operations,
    })
    .map_err(|e| HoldfastError::Codec {
        message: "failed to encode queue".to_string(),
        source: Some(Box::new(e)),
    })
}

/// Why a persisted slot could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("persisted queue is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("persisted queue has schema version {found}, newest supported is {SCHEMA_VERSION}")]
    UnsupportedVersion { found: u32 },
}

impl From<DecodeError> for HoldfastError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Malformed(source) => HoldfastError::Codec {
                message: "persisted queue is malformed".to_string(),
                source: Some(Box::new(source)),
            },
            e @ DecodeError::UnsupportedVersion { .. } => HoldfastError::Codec {
                message: e.to_string(),
                source: None,
            },
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;

    if value.is_array() {
        return Ok(Decoded {
            schema_version: 0,
            operations: serde_json::from_value(value)?,
        });
    }

    let envelope: Envelope = serde_json::from_value(value)?;
    if envelope.schema_version > SCHEMA_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: envelope.schema_version,
        });
    }

    Ok(Decoded {
        schema_version: envelope.schema_version,
        operations: envelope.operations,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use holdfast_core::{NewOperation, OperationKind};

    use super::*;

    fn sample() -> Vec<Operation> {
        let created = chrono::Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        vec![Operation::from_request(
            NewOperation::new(
                OperationKind::SendMessage,
                "s-1",
                serde_json::json!({"content": "hello", "client_id": "c-1"}),
            ),
            created,
        )]
    }

    #[test]
    fn encoded_form_carries_schema_version() {
        let bytes = encode(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["operations"][0]["kind"], "send-message");
    }

    #[test]
    fn encode_decode_encode_is_byte_stable() {
        let first = encode(&sample()).unwrap();
        let decoded = decode(&first).unwrap();
        let second = encode(&decoded.operations).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bare_array_is_read_as_version_zero() {
        let ops = sample();
        let legacy = serde_json::to_vec(&ops).unwrap();
        let decoded = decode(&legacy).unwrap();
        assert_eq!(decoded.schema_version, 0);
        assert_eq!(decoded.operations, ops);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let bytes = br#"{"schema_version": 9, "operations": []}"#;
        assert!(matches!(
            decode(bytes),
            Err(DecodeError::UnsupportedVersion { found: 9 })
        ));
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let err: HoldfastError = decode(b"not json").unwrap_err().into();
        assert!(matches!(err, HoldfastError::Codec { source: Some(_), .. }));
    }
}
