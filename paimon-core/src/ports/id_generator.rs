//! Identifier generator port

/// Produces opaque, collision-resistant identifiers for ledger entries
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}
