//! # Service properties.
//!
//! Every registration carries a [`Properties`] dictionary. Values are either
//! scalars or lists of strings; lists take part in filters through membership
//! ("contains") clauses, scalars through equality clauses.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Property always present on a registered service: the owning session id.
pub const PROP_SESSION_ID: &str = "servisor.session_id";

/// Property set by the registry on every reference: the registered type tags.
pub const OBJECT_CLASS: &str = "objectClass";

/// Property dictionary, ordered by key so rendered filters are stable.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Value of a single property.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyValue {
    /// Text scalar.
    Str(String),
    /// Integer scalar.
    Int(i64),
    /// Boolean scalar.
    Bool(bool),
    /// Multi-valued property.
    List(Vec<String>),
}

impl PropertyValue {
    /// Returns the text when this is a [`PropertyValue::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items when this is a [`PropertyValue::List`].
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// True when the property holds `item`: list membership or scalar equality
    /// on the rendered text.
    pub fn contains(&self, item: &str) -> bool {
        match self {
            PropertyValue::List(items) => items.iter().any(|i| i == item),
            scalar => scalar.render() == item,
        }
    }

    /// Text form used in rendered filters.
    pub(crate) fn render(&self) -> Cow<'_, str> {
        match self {
            PropertyValue::Str(s) => Cow::Borrowed(s),
            PropertyValue::Int(n) => Cow::Owned(n.to_string()),
            PropertyValue::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            PropertyValue::List(items) => Cow::Owned(items.join(",")),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::List(value)
    }
}

impl From<Vec<&str>> for PropertyValue {
    fn from(value: Vec<&str>) -> Self {
        PropertyValue::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Builds a [`Properties`] map from `(key, value)` pairs.
///
/// ```rust
/// use servisor::{PropertyValue, properties};
///
/// let props = properties([("x", PropertyValue::from(1)), ("kind", "gdb".into())]);
/// assert_eq!(props["x"], PropertyValue::Int(1));
/// ```
pub fn properties<K, I>(pairs: I) -> Properties
where
    K: Into<String>,
    I: IntoIterator<Item = (K, PropertyValue)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(PropertyValue::from(vec!["a", "b"]), "b", true)]
    #[case(PropertyValue::from(vec!["a", "b"]), "c", false)]
    #[case(PropertyValue::from("gdb"), "gdb", true)]
    #[case(PropertyValue::from(7), "7", true)]
    #[case(PropertyValue::from(true), "false", false)]
    fn contains_checks_membership_or_rendered_equality(
        #[case] value: PropertyValue,
        #[case] item: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(value.contains(item), expected);
    }

    #[test]
    fn display_renders_scalars_plainly() {
        assert_eq!(PropertyValue::from("x").to_string(), "x");
        assert_eq!(PropertyValue::from(-3).to_string(), "-3");
        assert_eq!(PropertyValue::from(true).to_string(), "true");
    }
}
