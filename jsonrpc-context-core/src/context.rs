//! Request-scoped context.
//!
//! A [`Context`] is an immutable chain of entries. Every derivation allocates
//! one node that points at its parent, so deriving never touches the parent
//! and contexts that share an ancestor can be used from any number of threads.
//! Lookups walk from the newest node back to the root.
//!
//! ```
//! use jsonrpc_context_core::Context;
//! use std::time::Duration;
//!
//! #[derive(Debug, PartialEq)]
//! struct RequestId(u64);
//!
//! let root = Context::background();
//! let ctx = root.with_value(RequestId(7)).with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(ctx.value::<RequestId>(), Some(&RequestId(7)));
//! assert!(ctx.deadline().is_some());
//! assert!(root.deadline().is_none());
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};

/// Immutable, hierarchically derived carrier of request-scoped values.
///
/// Cloning is a reference-count bump.
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

struct Node {
    parent: Option<Arc<Node>>,
    entry: Entry,
}

enum Entry {
    Value {
        key: TypeId,
        value: Box<dyn Any + Send + Sync>,
    },
    Deadline(DateTime<FixedOffset>),
}

impl Context {
    /// Create an empty root context with no deadline and no values.
    pub fn background() -> Self {
        Self::default()
    }

    fn derive(&self, entry: Entry) -> Self {
        Self {
            head: Some(Arc::new(Node {
                parent: self.head.clone(),
                entry,
            })),
        }
    }

    fn nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::successors(self.head.as_deref(), |node| node.parent.as_deref())
    }

    /// Derive a context holding `value`, keyed by its type.
    ///
    /// A value of the same type attached further up the chain is shadowed,
    /// not replaced. Use a private type as the key to get a private slot.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.derive(Entry::Value {
            key: TypeId::of::<T>(),
            value: Box::new(value),
        })
    }

    /// Look up the nearest value of type `T`.
    pub fn value<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        let key = TypeId::of::<T>();
        self.nodes().find_map(|node| match &node.entry {
            Entry::Value { key: k, value } if *k == key => value.downcast_ref::<T>(),
            _ => None,
        })
    }

    /// Derive a context that expires at `deadline`.
    ///
    /// If this context already expires earlier, the earlier deadline stays in
    /// effect and the returned context is equivalent to `self`.
    pub fn with_deadline<Tz: TimeZone>(&self, deadline: DateTime<Tz>) -> Self {
        let deadline = deadline.fixed_offset();
        match self.deadline() {
            Some(current) if current < deadline => self.clone(),
            _ => self.derive(Entry::Deadline(deadline)),
        }
    }

    /// Derive a context that expires `timeout` from now.
    ///
    /// A timeout too large to represent as a timestamp leaves the context
    /// without a new deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = TimeDelta::from_std(timeout)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta));
        match deadline {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// The deadline in effect for this context, in the offset it was set with.
    pub fn deadline(&self) -> Option<DateTime<FixedOffset>> {
        self.nodes().find_map(|node| match node.entry {
            Entry::Deadline(deadline) => Some(deadline),
            _ => None,
        })
    }

    /// Time left until the deadline, or `None` if there is no deadline.
    ///
    /// Returns [`Duration::ZERO`] once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let deadline = self.deadline()?.with_timezone(&Utc);
        Some((deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Whether the deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline()
            .is_some_and(|deadline| deadline.with_timezone(&Utc) <= Utc::now())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.nodes().count())
            .field("deadline", &self.deadline())
            .finish()
    }
}
