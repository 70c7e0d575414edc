//! Hashing System - SHA-256 Content Addresses
//!
//! Same bytes, same hash. Manifests hash their canonical JSON form.

use sha2::{Sha256, Digest};
use serde::Serialize;
use serde_json::{Value, to_string};

/// Lowercase hex SHA-256 of `data`; the content address of stored objects.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Hash of the canonical form of any serializable manifest
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(manifest)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Fingerprint of everything that determines a run's output.
/// run_hash = sha256(canonical_config + seed + engine_version)
pub fn compute_run_hash(
    config: &impl Serialize,
    seed: u64,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical_config = canonical_json(config)?;
    let combined = format!("{}:{}:{}", canonical_config, seed, engine_version);
    Ok(sha256_hex(combined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": [{"y": 1, "b": 0}]});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":[{"b":0,"y":1}],"z":1}"#);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let empty = sha256_hex(b"");
        assert_eq!(empty.len(), 64);
        assert_eq!(hex::decode(&empty).unwrap().len(), 32);
        assert!(empty.starts_with("e3b0c442"));
    }

    #[test]
    fn test_run_hash_depends_on_seed() {
        let config = json!({"name": "Survivors", "layers": 3});
        let a = compute_run_hash(&config, 1, "1.0.0").unwrap();
        let b = compute_run_hash(&config, 2, "1.0.0").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, compute_run_hash(&config, 1, "1.0.0").unwrap());
    }
}
