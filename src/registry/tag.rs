//! # Type tags.
//!
//! A [`TypeTag`] names a type a service is published under. Tags are plain
//! names, so a service can be published under its concrete type, under the
//! trait objects it implements, or under any agreed-upon interface name.

use std::any::type_name;
use std::borrow::Cow;
use std::fmt;

/// Name of a type a service is registered under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    /// Tag of the Rust type `T` (may be a trait object, e.g. `dyn RunControl`).
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Cow::Borrowed(type_name::<T>()))
    }

    /// Tag with an explicit name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The tag text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeTag {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}
