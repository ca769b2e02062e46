//! String projection of attribute values.
//!
//! Used solely for material-name construction: scalars render as their
//! canonical text, binary as standard base64, composites as JSON built
//! from the recursive projection. Deliberately separate from the binary
//! codec so material names stay stable across codec changes.

use crate::error::Result;
use crate::value::{canonical_number, AttrValue};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::BTreeMap;

/// Render an attribute value as its projection string.
///
/// Total over all variants. Composite members are projected recursively
/// and embedded as JSON strings, so the output for a composite is a JSON
/// document whose leaves are projection strings.
pub fn projection_string(value: &AttrValue) -> Result<String> {
    match value {
        AttrValue::S(text) => Ok(text.clone()),
        AttrValue::N(text) => canonical_number(text),
        AttrValue::B(bytes) => Ok(BASE64.encode(bytes)),
        AttrValue::Bool(flag) => Ok(flag.to_string()),
        AttrValue::Null => Ok(String::new()),
        AttrValue::L(members) => {
            let projected: Vec<String> = members
                .iter()
                .map(projection_string)
                .collect::<Result<_>>()?;
            Ok(serde_json::to_string(&projected).expect("string array serializes"))
        }
        AttrValue::M(entries) => {
            let mut projected = BTreeMap::new();
            for (key, member) in entries {
                projected.insert(key.as_str(), projection_string(member)?);
            }
            Ok(serde_json::to_string(&projected).expect("string map serializes"))
        }
        AttrValue::Bs(members) => {
            let projected: Vec<String> = members.iter().map(|m| BASE64.encode(m)).collect();
            Ok(serde_json::to_string(&projected).expect("string array serializes"))
        }
        AttrValue::Ns(members) => {
            let mut projected: Vec<String> = members
                .iter()
                .map(|m| canonical_number(m))
                .collect::<Result<_>>()?;
            projected.sort();
            Ok(serde_json::to_string(&projected).expect("string array serializes"))
        }
        AttrValue::Ss(members) => {
            let projected: Vec<&str> = members.iter().map(String::as_str).collect();
            Ok(serde_json::to_string(&projected).expect("string array serializes"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_projections() {
        assert_eq!(projection_string(&AttrValue::string("u#1")).unwrap(), "u#1");
        assert_eq!(
            projection_string(&AttrValue::N("7.10".to_string())).unwrap(),
            "7.1"
        );
        assert_eq!(
            projection_string(&AttrValue::binary(vec![1u8, 2, 3])).unwrap(),
            "AQID"
        );
        assert_eq!(projection_string(&AttrValue::Bool(true)).unwrap(), "true");
        assert_eq!(projection_string(&AttrValue::Null).unwrap(), "");
    }

    #[test]
    fn test_composite_projection_is_json() {
        let list = AttrValue::L(vec![
            AttrValue::string("a"),
            AttrValue::number("2").unwrap(),
        ]);
        assert_eq!(projection_string(&list).unwrap(), r#"["a","2"]"#);

        let mut entries = std::collections::BTreeMap::new();
        entries.insert("k".to_string(), AttrValue::string("v"));
        assert_eq!(
            projection_string(&AttrValue::M(entries)).unwrap(),
            r#"{"k":"v"}"#
        );
    }

    #[test]
    fn test_projection_stable_under_set_order() {
        let a = AttrValue::Ss(["b".to_string(), "a".to_string()].into());
        let b = AttrValue::Ss(["a".to_string(), "b".to_string()].into());
        assert_eq!(
            projection_string(&a).unwrap(),
            projection_string(&b).unwrap()
        );
    }
}
