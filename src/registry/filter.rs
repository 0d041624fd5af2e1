//! # Typed property filters.
//!
//! A [`Filter`] is an AND of [`Clause`]s evaluated directly against a
//! [`Properties`] map. Its `Display` form is the LDAP-style text used by
//! OSGi-shaped registries:
//!
//! ```text
//! filter := "(&" clause+ ")" | clause
//! clause := "(" key "=" value ")"      equality
//!         | "(" key "=*" value ")"     membership ("contains value")
//! ```
//!
//! Values are escaped as in RFC 4515: `\`, `*`, `(`, `)` and NUL become
//! `\5c`, `\2a`, `\28`, `\29` and `\00`. Keys are written as they are.
//!
//! Two filters are equal when their clause lists are identical (structural
//! equality, not semantic equivalence).
//!
//! ## Example
//! ```rust
//! use servisor::{Filter, PropertyValue, properties};
//!
//! let props = properties([
//!     ("kind", PropertyValue::from("gdb")),
//!     ("roles", PropertyValue::from(vec!["a", "b"])),
//! ]);
//! let filter = Filter::from_properties(&props);
//!
//! assert_eq!(filter.to_string(), "(&(kind=gdb)(roles=*a)(roles=*b))");
//! assert!(filter.matches(&props));
//! ```

use std::fmt;

use super::properties::{PROP_SESSION_ID, Properties, PropertyValue};

/// One predicate over a property map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Clause {
    /// The property equals `value` (a list property matches when it holds `value`).
    Equals {
        /// Property key.
        key: String,
        /// Expected value.
        value: PropertyValue,
    },
    /// The property holds `value` (list membership, or scalar text equality).
    Contains {
        /// Property key.
        key: String,
        /// Expected item.
        value: String,
    },
}

impl Clause {
    /// Evaluates the clause against `props`. A missing key never matches.
    pub fn matches(&self, props: &Properties) -> bool {
        match self {
            Clause::Equals { key, value } => match (props.get(key), value) {
                (None, _) => false,
                (Some(PropertyValue::List(items)), PropertyValue::Str(item)) => {
                    items.iter().any(|i| i == item)
                }
                (Some(actual), expected) => actual == expected,
            },
            Clause::Contains { key, value } => {
                props.get(key).is_some_and(|actual| actual.contains(value))
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Equals { key, value } => {
                write!(f, "({key}=")?;
                write_escaped(f, &value.to_string())?;
                f.write_str(")")
            }
            Clause::Contains { key, value } => {
                write!(f, "({key}=*")?;
                write_escaped(f, value)?;
                f.write_str(")")
            }
        }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for c in value.chars() {
        match c {
            '\\' => f.write_str("\\5c")?,
            '*' => f.write_str("\\2a")?,
            '(' => f.write_str("\\28")?,
            ')' => f.write_str("\\29")?,
            '\0' => f.write_str("\\00")?,
            c => write!(f, "{c}")?,
        }
    }
    Ok(())
}

/// AND of clauses over a property map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    /// A single bare clause, rendered without `(&...)`.
    Clause(Clause),
    /// Conjunction, rendered as `(&...)`. An empty conjunction matches everything.
    All(Vec<Clause>),
}

impl Filter {
    /// Single equality clause.
    pub fn equals(key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Filter::Clause(Clause::Equals {
            key: key.into(),
            value: value.into(),
        })
    }

    /// Single membership clause.
    pub fn contains(key: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Clause(Clause::Contains {
            key: key.into(),
            value: value.into(),
        })
    }

    /// Conjunction of `clauses`.
    pub fn all(clauses: impl IntoIterator<Item = Clause>) -> Self {
        Filter::All(clauses.into_iter().collect())
    }

    /// Filter selecting everything owned by the session `id`: `(PROP_SESSION_ID=<id>)`.
    pub fn session(id: impl AsRef<str>) -> Self {
        Filter::equals(PROP_SESSION_ID, id.as_ref())
    }

    /// Derives the filter describing a property map: one equality clause per
    /// scalar and one membership clause per element of every list.
    pub fn from_properties(props: &Properties) -> Self {
        let mut clauses = Vec::with_capacity(props.len());
        for (key, value) in props {
            match value {
                PropertyValue::List(items) => {
                    clauses.extend(items.iter().map(|item| Clause::Contains {
                        key: key.clone(),
                        value: item.clone(),
                    }));
                }
                scalar => clauses.push(Clause::Equals {
                    key: key.clone(),
                    value: scalar.clone(),
                }),
            }
        }
        Filter::All(clauses)
    }

    /// Conjunction of `self` and `other`.
    pub fn and(self, other: Filter) -> Self {
        let mut clauses = self.into_clauses();
        clauses.extend(other.into_clauses());
        Filter::All(clauses)
    }

    /// The clauses of this filter.
    pub fn clauses(&self) -> &[Clause] {
        match self {
            Filter::Clause(clause) => std::slice::from_ref(clause),
            Filter::All(clauses) => clauses,
        }
    }

    /// True when every clause matches `props`.
    pub fn matches(&self, props: &Properties) -> bool {
        self.clauses().iter().all(|clause| clause.matches(props))
    }

    fn into_clauses(self) -> Vec<Clause> {
        match self {
            Filter::Clause(clause) => vec![clause],
            Filter::All(clauses) => clauses,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Clause(clause) => write!(f, "{clause}"),
            Filter::All(clauses) => {
                f.write_str("(&")?;
                for clause in clauses {
                    write!(f, "{clause}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::registry::properties;

    fn sample() -> Properties {
        properties([
            (PROP_SESSION_ID, PropertyValue::from("4")),
            ("kind", PropertyValue::from("gdb")),
            ("level", PropertyValue::from(2)),
            ("types", PropertyValue::from(vec!["IRunControl", "IStack"])),
        ])
    }

    #[test]
    fn session_filter_renders_a_bare_clause() {
        assert_eq!(Filter::session("12").to_string(), "(servisor.session_id=12)");
    }

    #[test]
    fn derived_filter_uses_membership_clauses_for_lists() {
        let filter = Filter::from_properties(&sample());
        assert_eq!(
            filter.to_string(),
            "(&(kind=gdb)(level=2)(servisor.session_id=4)(types=*IRunControl)(types=*IStack))"
        );
        assert!(filter.matches(&sample()));
    }

    #[rstest]
    #[case(Filter::equals("name", "a*b"), "(name=a\\2ab)")]
    #[case(Filter::equals("name", "(x)"), "(name=\\28x\\29)")]
    #[case(Filter::equals("path", "c:\\tmp"), "(path=c:\\5ctmp)")]
    #[case(Filter::contains("types", "Pair<(A, B)>"), "(types=*Pair<\\28A, B\\29>)")]
    #[case(Filter::equals("nul", "a\0b"), "(nul=a\\00b)")]
    fn special_characters_in_values_are_escaped(#[case] filter: Filter, #[case] text: &str) {
        assert_eq!(filter.to_string(), text);
    }

    #[rstest]
    #[case(Filter::equals("kind", "gdb"), true)]
    #[case(Filter::equals("kind", "lldb"), false)]
    #[case(Filter::equals("level", 2), true)]
    #[case(Filter::equals("level", "2"), false)]
    #[case(Filter::equals("types", "IStack"), true)]
    #[case(Filter::contains("types", "IRunControl"), true)]
    #[case(Filter::contains("types", "IMemory"), false)]
    #[case(Filter::contains("level", "2"), true)]
    #[case(Filter::equals("missing", "x"), false)]
    #[case(Filter::all(Vec::<Clause>::new()), true)]
    fn clauses_evaluate_against_properties(#[case] filter: Filter, #[case] expected: bool) {
        assert_eq!(filter.matches(&sample()), expected);
    }

    #[test]
    fn and_requires_both_sides() {
        let filter = Filter::session("4").and(Filter::contains("types", "IStack"));
        assert!(filter.matches(&sample()));

        let other_session = Filter::session("5").and(Filter::contains("types", "IStack"));
        assert!(!other_session.matches(&sample()));
    }

    #[test]
    fn equality_is_structural() {
        let a = Filter::all([Clause::Contains {
            key: "k".into(),
            value: "v".into(),
        }]);
        let b = Filter::contains("k", "v");
        assert_ne!(a, b);
        assert!(a.matches(&properties([("k", PropertyValue::from(vec!["v"]))])));
    }
}
