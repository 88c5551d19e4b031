use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serializer};

pub fn canonical_serialize_hex<T: CanonicalSerialize>(value: &T) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    value
        .serialize_compressed(&mut buf)
        .map_err(|e| anyhow::anyhow!("canonical serialization failed: {e}"))?;
    Ok(format!("0x{}", hex::encode(buf)))
}

pub fn canonical_deserialize_hex<T: CanonicalDeserialize>(value: &str) -> anyhow::Result<T> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped)?;
    T::deserialize_compressed(bytes.as_slice())
        .map_err(|e| anyhow::anyhow!("canonical deserialization failed: {e}"))
}

/// Serde helpers for encoding curve points and field elements as 0x-prefixed
/// hex strings of their compressed canonical form.
pub mod canonical {
    use super::*;

    pub fn serialize<T, S>(value: &T, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        T: CanonicalSerialize,
        S: Serializer,
    {
        let hex = canonical_serialize_hex(value).map_err(SerError::custom)?;
        serializer.serialize_str(&hex)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> std::result::Result<T, D::Error>
    where
        T: CanonicalDeserialize,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        canonical_deserialize_hex(&s).map_err(DeError::custom)
    }
}
