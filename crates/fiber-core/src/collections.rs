#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};

    pub type FastMap<K, V> = HashMap<K, V>;
    pub type FastSet<K> = HashSet<K>;
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};

    pub type FastMap<K, V> = HashMap<K, V, ahash::RandomState>;
    pub type FastSet<K> = HashSet<K, ahash::RandomState>;
}
