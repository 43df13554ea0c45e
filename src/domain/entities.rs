//! Records mirrored from the durable store and the cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One row of the append-only `values` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub number: i32,
}

/// Cache hash contents keyed by the decimal index.
///
/// Values are opaque: the placeholder until a worker stores its result.
pub type CacheSnapshot = BTreeMap<String, String>;
