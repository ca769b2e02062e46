//! AttrValue - polymorphic attribute value type
//!
//! Wide-column items map attribute names to dynamically typed values. The
//! full type set is modeled as a tagged union and all traversal is by
//! variant discrimination.
//!
//! ## Canonical form
//!
//! Maps are `BTreeMap` and sets are `BTreeSet`, so member order is
//! canonical by construction: two values that differ only in insertion
//! order compare equal and serialize to identical bytes. Number values are
//! decimal text; [`AttrValue::number`] canonicalizes on construction and
//! the codec canonicalizes again before emitting.

use crate::error::{Error, Result};
use bigdecimal::BigDecimal;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Attribute value for wide-column items
///
/// Variant names follow the storage service's type tags: `B` binary,
/// `N` number, `S` string, plus boolean, null, list, map, and the three
/// set types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    /// Binary blob
    B(Vec<u8>),
    /// Number as canonical decimal text
    N(String),
    /// UTF-8 string
    S(String),
    /// Boolean
    Bool(bool),
    /// Null
    Null,
    /// Ordered list of values
    L(Vec<AttrValue>),
    /// Map of string keys to values; key order is canonical (bytewise)
    M(BTreeMap<String, AttrValue>),
    /// Set of binary blobs
    Bs(BTreeSet<Vec<u8>>),
    /// Set of numbers (decimal text members)
    Ns(BTreeSet<String>),
    /// Set of strings
    Ss(BTreeSet<String>),
}

impl AttrValue {
    /// String value
    pub fn string(value: impl Into<String>) -> Self {
        AttrValue::S(value.into())
    }

    /// Binary value
    pub fn binary(value: impl Into<Vec<u8>>) -> Self {
        AttrValue::B(value.into())
    }

    /// Number value from decimal text, canonicalized
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidValue` if `text` is not parseable as a
    /// decimal number.
    pub fn number(text: impl AsRef<str>) -> Result<Self> {
        Ok(AttrValue::N(canonical_number(text.as_ref())?))
    }

    /// Number value from an integer
    pub fn number_from_i64(value: i64) -> Self {
        AttrValue::N(value.to_string())
    }

    /// Short type name used in error context
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::B(_) => "B",
            AttrValue::N(_) => "N",
            AttrValue::S(_) => "S",
            AttrValue::Bool(_) => "BOOL",
            AttrValue::Null => "NULL",
            AttrValue::L(_) => "L",
            AttrValue::M(_) => "M",
            AttrValue::Bs(_) => "BS",
            AttrValue::Ns(_) => "NS",
            AttrValue::Ss(_) => "SS",
        }
    }

    /// True if this value is a binary blob
    pub fn is_binary(&self) -> bool {
        matches!(self, AttrValue::B(_))
    }

    /// Borrow the string payload, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the number text, if this is a number value
    pub fn as_number(&self) -> Option<&str> {
        match self {
            AttrValue::N(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow the binary payload, if this is a binary value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttrValue::B(b) => Some(b),
            _ => None,
        }
    }
}

/// Canonicalize decimal number text
///
/// Parses with arbitrary precision and re-emits the minimal plain form:
/// no exponent, no `+` sign, no trailing fractional zeros, no redundant
/// leading zeros.
pub fn canonical_number(text: &str) -> Result<String> {
    let parsed = BigDecimal::from_str(text.trim())
        .map_err(|e| Error::invalid_value(format!("unparseable number {text:?}: {e}")))?;
    Ok(parsed.normalized().to_plain_string())
}
