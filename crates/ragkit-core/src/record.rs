//! Record encoding: scalar metadata, fingerprints and opaque payloads.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::condition::Scalar;
use crate::error::{RagError, Result};

/// A user-defined value stored in Storage and VectorStore backends.
///
/// Blanket-implemented for every serializable, comparable type.
pub trait Record: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync + 'static {}

impl<T> Record for T where
    T: Serialize + DeserializeOwned + PartialEq + Clone + Send + Sync + 'static
{
}

/// Scalar metadata of a record, keyed by field name.
pub type Metadata = BTreeMap<String, Scalar>;

fn to_object<T: Record>(record: &T) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(RagError::invalid_record(format!(
            "expected a struct-like record, got {}",
            other
        ))),
    }
}

/// Extract the top-level fields of a record as scalar metadata.
///
/// Fails on the first field that is not a string, number or bool.
pub fn scalar_fields<T: Record>(record: &T) -> Result<Metadata> {
    to_object(record)?
        .into_iter()
        .map(|(key, value)| match Scalar::from_json(&value) {
            Some(scalar) => Ok((key, scalar)),
            None => Err(RagError::NonScalarField { field: key }),
        })
        .collect()
}

/// Read a top-level string field, used as the keyword search target.
pub fn text_field<T: Record>(record: &T, field: &str) -> Result<Option<String>> {
    Ok(match to_object(record)?.remove(field) {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Canonical fingerprint of a record.
///
/// Object keys are sorted before hashing, so equal records always share a
/// fingerprint regardless of field or map ordering.
pub fn fingerprint<T: Record>(record: &T) -> Result<String> {
    let canonical = serde_json::to_string(&serde_json::to_value(record)?)?;
    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}

/// Encode the full record as an opaque payload.
pub fn encode_payload<T: Record>(record: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Decode a payload produced by [`encode_payload`].
pub fn decode_payload<T: Record>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}
