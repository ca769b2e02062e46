//! Material-name derivation.
//!
//! Every logical item is tied to its wrapped-keyset records by a stable
//! identifier: the hex SHA-256 of `table "-" partition [ "-" sort ]`,
//! where key values are rendered with the string projection. The name is
//! identical for every version stored under it.

use crate::error::{Error, Result};
use crate::projection::projection_string;
use crate::store::{Item, KeySchema};
use sha2::{Digest, Sha256};

/// Derive the material name for an item (or bare primary key).
///
/// `item` must carry the partition-key attribute and, when the schema
/// declares one, the sort-key attribute.
///
/// # Errors
///
/// Returns `Error::InvalidValue` if a declared key attribute is missing.
pub fn material_name(schema: &KeySchema, item: &Item) -> Result<String> {
    let partition_value = item.get(&schema.partition_key).ok_or_else(|| {
        Error::invalid_value(format!(
            "item missing partition key attribute {:?}",
            schema.partition_key
        ))
    })?;

    let mut raw = format!("{}-{}", schema.table, projection_string(partition_value)?);

    if let Some(sort_key) = &schema.sort_key {
        let sort_value = item.get(sort_key).ok_or_else(|| {
            Error::invalid_value(format!("item missing sort key attribute {sort_key:?}"))
        })?;
        let projected = projection_string(sort_value)?;
        if !projected.is_empty() {
            raw.push('-');
            raw.push_str(&projected);
        }
    }

    Ok(sha256_hex(raw.as_bytes()))
}

/// Hex-encoded SHA-256 of the input bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::AttrValue;
    use std::collections::HashMap;

    fn schema(sort: Option<&str>) -> KeySchema {
        KeySchema {
            table: "users".to_string(),
            partition_key: "PK".to_string(),
            sort_key: sort.map(str::to_string),
        }
    }

    #[test]
    fn test_name_is_stable_and_hex() {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttrValue::string("u#1"));
        let name = material_name(&schema(None), &item).unwrap();
        assert_eq!(name.len(), 64);
        assert_eq!(name, material_name(&schema(None), &item).unwrap());
        assert_eq!(name, sha256_hex(b"users-u#1"));
    }

    #[test]
    fn test_sort_key_changes_name() {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttrValue::string("u#1"));
        item.insert("SK".to_string(), AttrValue::string("v#1"));
        let with_sort = material_name(&schema(Some("SK")), &item).unwrap();
        let without = material_name(&schema(None), &item).unwrap();
        assert_ne!(with_sort, without);
        assert_eq!(with_sort, sha256_hex(b"users-u#1-v#1"));
    }

    #[test]
    fn test_missing_partition_key_rejected() {
        let item = HashMap::new();
        assert!(matches!(
            material_name(&schema(None), &item),
            Err(Error::InvalidValue(_))
        ));
    }

    #[test]
    fn test_missing_sort_key_rejected() {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttrValue::string("u#1"));
        assert!(material_name(&schema(Some("SK")), &item).is_err());
    }

    #[test]
    fn test_ignores_non_key_attributes() {
        let mut a = HashMap::new();
        a.insert("PK".to_string(), AttrValue::string("u#1"));
        let mut b = a.clone();
        b.insert("Email".to_string(), AttrValue::string("a@x"));
        assert_eq!(
            material_name(&schema(None), &a).unwrap(),
            material_name(&schema(None), &b).unwrap()
        );
    }
}
