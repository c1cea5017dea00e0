use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque token pairing a call with its acknowledgments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(value: impl Into<String>) -> Self {
        CorrelationId(value.into())
    }

    /// Fresh random (UUID v4) id.
    pub fn generate() -> Self {
        CorrelationId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        CorrelationId(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        CorrelationId(value.to_string())
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of correlation ids for outbound calls.
pub trait IdAllocator: Send + Sync + fmt::Debug {
    fn allocate(&self) -> CorrelationId;
}

/// Default allocator: UUID v4, collision resistant without coordination.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidAllocator;

impl IdAllocator for UuidAllocator {
    fn allocate(&self) -> CorrelationId {
        CorrelationId::generate()
    }
}

/// Deterministic allocator producing `<prefix>-1`, `<prefix>-2`, ...
///
/// Only unique within one allocator; two bridges sharing a prefix will collide.
#[derive(Debug)]
pub struct SequentialAllocator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        SequentialAllocator {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    pub fn peek_next(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl IdAllocator for SequentialAllocator {
    fn allocate(&self) -> CorrelationId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        CorrelationId(format!("{}-{}", self.prefix, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_correlation_id_display() {
        let id = CorrelationId::new("abc");
        assert_eq!(id.to_string(), "abc");
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn test_uuid_allocator_unique() {
        let alloc = UuidAllocator;
        let ids: HashSet<_> = (0..1000).map(|_| alloc.allocate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_uuid_ids_have_no_delimiter() {
        let id = CorrelationId::generate();
        assert!(!id.as_str().contains('|'));
        assert_eq!(id.as_str().len(), 36);
    }

    #[test]
    fn test_sequential_allocator() {
        let alloc = SequentialAllocator::new("call");
        assert_eq!(alloc.peek_next(), 1);
        assert_eq!(alloc.allocate().as_str(), "call-1");
        assert_eq!(alloc.allocate().as_str(), "call-2");
        assert_eq!(alloc.peek_next(), 3);
    }

    #[test]
    fn test_serde_transparent() {
        let id = CorrelationId::new("x-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"x-1\"");
    }
}
