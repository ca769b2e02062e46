//! Conversion between core attribute values and DynamoDB SDK values.

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use veildb_core::{AttrValue, Error, Item, Result};

/// Core value → SDK value.
pub fn to_dynamo(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::B(bytes) => AttributeValue::B(Blob::new(bytes.clone())),
        AttrValue::N(text) => AttributeValue::N(text.clone()),
        AttrValue::S(text) => AttributeValue::S(text.clone()),
        AttrValue::Bool(flag) => AttributeValue::Bool(*flag),
        AttrValue::Null => AttributeValue::Null(true),
        AttrValue::L(members) => AttributeValue::L(members.iter().map(to_dynamo).collect()),
        AttrValue::M(entries) => AttributeValue::M(
            entries
                .iter()
                .map(|(key, member)| (key.clone(), to_dynamo(member)))
                .collect(),
        ),
        AttrValue::Bs(members) => {
            AttributeValue::Bs(members.iter().map(|m| Blob::new(m.clone())).collect())
        }
        AttrValue::Ns(members) => AttributeValue::Ns(members.iter().cloned().collect()),
        AttrValue::Ss(members) => AttributeValue::Ss(members.iter().cloned().collect()),
    }
}

/// SDK value → core value.
pub fn from_dynamo(value: &AttributeValue) -> Result<AttrValue> {
    match value {
        AttributeValue::B(blob) => Ok(AttrValue::B(blob.as_ref().to_vec())),
        AttributeValue::N(text) => Ok(AttrValue::N(text.clone())),
        AttributeValue::S(text) => Ok(AttrValue::S(text.clone())),
        AttributeValue::Bool(flag) => Ok(AttrValue::Bool(*flag)),
        AttributeValue::Null(_) => Ok(AttrValue::Null),
        AttributeValue::L(members) => Ok(AttrValue::L(
            members.iter().map(from_dynamo).collect::<Result<_>>()?,
        )),
        AttributeValue::M(entries) => {
            let mut converted = BTreeMap::new();
            for (key, member) in entries {
                converted.insert(key.clone(), from_dynamo(member)?);
            }
            Ok(AttrValue::M(converted))
        }
        AttributeValue::Bs(members) => Ok(AttrValue::Bs(
            members.iter().map(|b| b.as_ref().to_vec()).collect(),
        )),
        AttributeValue::Ns(members) => Ok(AttrValue::Ns(members.iter().cloned().collect())),
        AttributeValue::Ss(members) => Ok(AttrValue::Ss(members.iter().cloned().collect())),
        other => Err(Error::storage(format!(
            "unsupported DynamoDB attribute value: {other:?}"
        ))),
    }
}

/// Core item → SDK item.
pub fn item_to_dynamo(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_dynamo(value)))
        .collect()
}

/// SDK item → core item.
pub fn item_from_dynamo(item: &HashMap<String, AttributeValue>) -> Result<Item> {
    let mut converted = Item::new();
    for (name, value) in item {
        converted.insert(name.clone(), from_dynamo(value)?);
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversion_roundtrip() {
        let values = vec![
            AttrValue::string("text"),
            AttrValue::N("1.5".to_string()),
            AttrValue::binary(vec![1u8, 2, 3]),
            AttrValue::Bool(true),
            AttrValue::Null,
        ];
        for value in values {
            assert_eq!(from_dynamo(&to_dynamo(&value)).unwrap(), value);
        }
    }

    #[test]
    fn test_composite_conversion_roundtrip() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "list".to_string(),
            AttrValue::L(vec![AttrValue::string("a"), AttrValue::Null]),
        );
        entries.insert(
            "set".to_string(),
            AttrValue::Ss(BTreeSet::from(["x".to_string(), "y".to_string()])),
        );
        let value = AttrValue::M(entries);
        assert_eq!(from_dynamo(&to_dynamo(&value)).unwrap(), value);
    }

    #[test]
    fn test_binary_set_roundtrip() {
        let value = AttrValue::Bs(BTreeSet::from([vec![1u8], vec![2u8, 3]]));
        assert_eq!(from_dynamo(&to_dynamo(&value)).unwrap(), value);
    }
}
