//! # Service events and their type hierarchy.
//!
//! Any `'static` type can be an [`Event`]. Event families are modelled by
//! composition: a more specific event embeds the general one and returns it
//! from [`Event::parent`]. A handler declared for type `E` receives every
//! event whose parent chain contains an `E`, viewed as that `E`.
//!
//! ## Example
//! ```rust
//! use servisor::Event;
//!
//! #[derive(Debug)]
//! struct Resumed { thread: u32 }
//! impl Event for Resumed {}
//!
//! #[derive(Debug)]
//! struct Stepped { base: Resumed, over: bool }
//! impl Event for Stepped {
//!     fn parent(&self) -> Option<&dyn Event> { Some(&self.base) }
//! }
//!
//! let ev = Stepped { base: Resumed { thread: 3 }, over: true };
//! let ev: &dyn Event = &ev;
//! assert_eq!(ev.view::<Resumed>().map(|r| r.thread), Some(3));
//! assert!(ev.view::<Stepped>().is_some_and(|s| s.over));
//! ```

use std::any::{Any, type_name};
use std::fmt;

/// Object-safe access to the concrete type behind a trait object.
pub trait AsAny: Any {
    /// Upcasts to `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Concrete type name (for logs).
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A value published through [`Session::dispatch_event`](crate::Session::dispatch_event).
pub trait Event: AsAny + Send + Sync + fmt::Debug {
    /// The more general event this one specialises, if any.
    fn parent(&self) -> Option<&dyn Event> {
        None
    }
}

impl dyn Event {
    /// Returns the first event in the parent chain (starting with `self`)
    /// whose concrete type is `E`.
    pub fn view<E: Event>(&self) -> Option<&E> {
        let mut current: Option<&dyn Event> = Some(self);
        while let Some(ev) = current {
            if let Some(found) = AsAny::as_any(ev).downcast_ref::<E>() {
                return Some(found);
            }
            current = ev.parent();
        }
        None
    }

    /// True when a handler for `E` would receive this event.
    #[inline]
    pub fn is<E: Event>(&self) -> bool {
        self.view::<E>().is_some()
    }

    /// Concrete type name of the event.
    #[inline]
    pub fn event_name(&self) -> &'static str {
        AsAny::type_name(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Base(u8);
    impl Event for Base {}

    #[derive(Debug)]
    struct Mid {
        base: Base,
    }
    impl Event for Mid {
        fn parent(&self) -> Option<&dyn Event> {
            Some(&self.base)
        }
    }

    #[derive(Debug)]
    struct Leaf {
        mid: Mid,
    }
    impl Event for Leaf {
        fn parent(&self) -> Option<&dyn Event> {
            Some(&self.mid)
        }
    }

    #[derive(Debug)]
    struct Unrelated;
    impl Event for Unrelated {}

    #[test]
    fn view_walks_the_whole_parent_chain() {
        let leaf = Leaf {
            mid: Mid { base: Base(9) },
        };
        let ev: &dyn Event = &leaf;

        assert!(ev.is::<Leaf>());
        assert!(ev.is::<Mid>());
        assert_eq!(ev.view::<Base>().map(|b| b.0), Some(9));
        assert!(!ev.is::<Unrelated>());
    }

    #[test]
    fn supertype_event_is_not_a_subtype() {
        let ev: &dyn Event = &Base(1);
        assert!(ev.is::<Base>());
        assert!(!ev.is::<Mid>());
        assert!(!ev.is::<Leaf>());
    }

    #[test]
    fn event_name_reports_the_concrete_type() {
        let ev: &dyn Event = &Unrelated;
        assert!(ev.event_name().ends_with("Unrelated"));
    }
}
