//! Step identifiers
//!
//! Each workflow names its steps with a closed enum implementing [`StepKey`].
//! Routers return [`Next`] values built from that enum, so a transition to a
//! step that does not exist cannot be expressed; the builder then checks that
//! every variant has an implementation and an outgoing edge.
//!
//! The [`step_keys!`](crate::step_keys) macro derives the enum and its
//! string labels in one place:
//!
//! ```rust
//! use hitl_core::{step_keys, StepKey};
//!
//! step_keys! {
//!     pub enum Approval {
//!         Propose => "propose",
//!         Review => "review",
//!     }
//! }
//!
//! assert_eq!(Approval::Review.name(), "review");
//! assert_eq!(Approval::from_name("propose"), Some(Approval::Propose));
//! assert_eq!(Approval::all().len(), 2);
//! ```

use std::fmt::Debug;
use std::hash::Hash;

/// A closed set of step names for one workflow
pub trait StepKey: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Label persisted in checkpoints
    fn name(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self>;

    /// Every variant, in declaration order
    fn all() -> &'static [Self];
}

/// Where execution goes after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Next<K> {
    Step(K),
    End,
}

impl<K: StepKey> Next<K> {
    /// Persisted form: the step label, or `None` for the end
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Next::Step(key) => Some(key.name()),
            Next::End => None,
        }
    }

    pub fn step(&self) -> Option<K> {
        match self {
            Next::Step(key) => Some(*key),
            Next::End => None,
        }
    }
}

impl<K: StepKey> From<K> for Next<K> {
    fn from(key: K) -> Self {
        Next::Step(key)
    }
}

/// Declare a step enum together with its [`StepKey`] implementation
#[macro_export]
macro_rules! step_keys {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $crate::StepKey for $name {
            fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn all() -> &'static [Self] {
                &[$($name::$variant),+]
            }
        }
    };
}
