//! Weight functions used to size entries for the generation budgets.
//!
//! The engine never re-derives a weight after admission (see `DESIGN.md`): a
//! weigher is consulted once, at `set` time, and the resulting integer is
//! cached on the entry for the rest of its life.

use std::rc::Rc;

/// A caller-supplied function from a key (or value) to a non-negative weight.
pub(crate) type Weigher<T> = Rc<dyn Fn(&T) -> u64>;

/// The default weigher: every key/value contributes a weight of `1`, i.e. the
/// cache is sized by entry count unless the builder is given explicit
/// `key_weight`/`value_weight` functions.
pub(crate) fn constant_weigher<T>() -> Weigher<T> {
    Rc::new(|_: &T| 1)
}

/// A ready-made weigher for byte-string-like keys/values, mirroring the
/// original cache's default of "length of the key"/"length of the value".
/// Not wired in automatically (the core must not impose structure on `K`/`V`
/// — see spec's "Duck-typed key/value" design note) but exposed so callers
/// whose keys/values are byte-like can opt in with one line.
pub fn byte_length_weigher<T: AsRef<[u8]>>(value: &T) -> u64 {
    value.as_ref().len() as u64
}
