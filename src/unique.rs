//! Unique-by-construction numeric IDs and the fresh names derived from them.
//!
//! # Uniqueness
//! If a pair of [`Uid`] values are equal, then they are copies of each other:
//! one was created by [`Uid::fresh`], and the other is a copy of that
//! original. Free variables introduced during type attachment carry a [`Uid`]
//! suffix in their name, which is what lets the rest of the engine compare
//! variables by name alone.
//!
//! # Practical Implementation
//! The counter is a process-wide atomic, so independent compilations running
//! on separate threads never hand out the same name. We're using `u32` values,
//! which is plenty for a single process: even a pathological program would
//! need billions of fresh variables before the counter wraps.

use std::{
    num::NonZeroU32,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::value::Name;

static COUNTER: AtomicU32 = AtomicU32::new(1);

/// The character separating the user-facing part of a fresh name from its
/// [`Uid`] suffix.
pub const FRESH_SEPARATOR: char = '#';

/// A unique-by-construction numeric identifier.
#[derive(Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Uid(NonZeroU32);

impl std::fmt::Debug for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "⟨{}⟩", self.0)
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uid> for u32 {
    fn from(value: Uid) -> Self {
        value.0.into()
    }
}

impl Uid {
    /// Returns a new unique [`Uid`].
    pub fn fresh() -> Uid {
        let raw_id = COUNTER.fetch_add(1, Ordering::Relaxed);

        // SAFETY: COUNTER is initialized to 1, and will monotonically increase
        // for the (practical) lifetime of the program; hence raw_id is never 0
        let uid = unsafe { NonZeroU32::new_unchecked(raw_id) };
        Uid(uid)
    }
}

/// Returns a fresh variable name derived from `base`.
///
/// Any existing [`Uid`] suffix on `base` is dropped first, so renaming an
/// already-fresh name keeps the name readable (`a#3` becomes `a#17` rather
/// than `a#3#17`).
pub fn fresh_name(base: &str) -> Name {
    let stem = base_name(base);
    let stem = if stem.is_empty() { "t" } else { stem };
    format!("{stem}{FRESH_SEPARATOR}{}", Uid::fresh()).into()
}

/// Returns the user-facing part of a (possibly fresh) name.
pub fn base_name(name: &str) -> &str {
    match name.split_once(FRESH_SEPARATOR) {
        Some((stem, _)) => stem,
        None => name,
    }
}
