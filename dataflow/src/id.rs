// id.rs — Node keys for dataflow graphs
//
// Keys are allocated in traversal order during one graph build, so the same
// value tree always yields the same keys. Value nodes and operation nodes
// are numbered independently.

use std::fmt;

use serde::{Serialize, Serializer};

/// Key of a value node (`n0`, `n1`, …) or an operation node (`p0`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    Value(u32),
    Operation(u32),
}

impl NodeKey {
    pub fn is_operation(self) -> bool {
        matches!(self, NodeKey::Operation(_))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Value(n) => write!(f, "n{n}"),
            NodeKey::Operation(n) => write!(f, "p{n}"),
        }
    }
}

impl Serialize for NodeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Monotonic allocator for one graph build.
#[derive(Debug, Default)]
pub struct NodeKeyAllocator {
    next_value: u32,
    next_operation: u32,
}

impl NodeKeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_value(&mut self) -> NodeKey {
        let key = NodeKey::Value(self.next_value);
        self.next_value += 1;
        key
    }

    pub fn alloc_operation(&mut self) -> NodeKey {
        let key = NodeKey::Operation(self.next_operation);
        self.next_operation += 1;
        key
    }

    pub fn values_allocated(&self) -> u32 {
        self.next_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_numbered_per_kind() {
        let mut ids = NodeKeyAllocator::new();
        assert_eq!(ids.alloc_value().to_string(), "n0");
        assert_eq!(ids.alloc_operation().to_string(), "p0");
        assert_eq!(ids.alloc_value().to_string(), "n1");
        assert_eq!(ids.values_allocated(), 2);
        assert!(NodeKey::Operation(3).is_operation());
    }

    #[test]
    fn keys_serialize_as_strings() {
        let json = serde_json::to_string(&NodeKey::Value(7)).unwrap();
        assert_eq!(json, "\"n7\"");
    }
}
