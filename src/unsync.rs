//! Provides a *not* thread-safe cache implementation built upon
//! [`std::collections::HashMap`][std-hashmap].
//!
//! [std-hashmap]: https://doc.rust-lang.org/std/collections/struct.HashMap.html

mod builder;
mod cache;
mod codec;
mod entry;
mod iter;
mod ring;
mod stats;

pub use builder::CacheBuilder;
pub use cache::Cache;
pub use codec::GenerationSelector;
pub use iter::Iter;
pub use stats::{GenerationStats, Stats};
