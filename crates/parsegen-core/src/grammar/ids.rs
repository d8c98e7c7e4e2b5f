//! Arena index handles for every entity the [`Grammar`](super::Grammar) owns.
//!
//! The reference implementation wires everything together with raw pointers
//! (`State*`, `Transition*`, `RuleSet*`, …) inside one owning arena. Rust
//! realises the same "owned once, referenced everywhere by id" shape with
//! newtype indices into `Vec` arenas — no cycles, no lifetimes to thread
//! through four compiler phases.
//!
//! Every id type carries a reserved `NIL` value (index 0) rather than being
//! wrapped in `Option` at every use site. This resolves the first Open
//! Question of the design notes: the reference's `errorizeState` path sets a
//! transition's `next` to a null pointer when a state is retired, but the
//! emitter does not uniformly null-check before dereferencing `next->id`.
//! Carrying a real, dereferencable "no state" id sentinel end to end makes
//! that class of bug unrepresentable.

use std::fmt;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(u32);

        impl $name {
            /// Reserved sentinel meaning "no entity" (e.g. a retired transition target).
            pub const NIL: Self = Self(0);

            #[inline]
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub fn is_nil(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_id!(StateId);
arena_id!(RegexId);
arena_id!(RegexSetId);
arena_id!(ModeId);
arena_id!(RuleId);
arena_id!(RuleSetId);
arena_id!(WalkerId);
arena_id!(ItemSetId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_index_zero() {
        assert!(StateId::NIL.is_nil());
        assert!(!StateId::new(1).is_nil());
    }
}
