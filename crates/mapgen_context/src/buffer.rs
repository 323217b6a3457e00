//! Named per-tile field buffers owned by a map context.

use mapgen_schema::{Buffer, BufferKind};
use std::collections::BTreeMap;

/// Named typed buffers, ordered by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldBuffers {
    fields: BTreeMap<String, Buffer>,
}

impl FieldBuffers {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a buffer, returning the one it replaces
    pub fn insert(&mut self, name: impl Into<String>, buffer: Buffer) -> Option<Buffer> {
        self.fields.insert(name.into(), buffer)
    }

    /// Borrow a buffer
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Buffer> {
        self.fields.get(name)
    }

    /// Mutably borrow a buffer
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Buffer> {
        self.fields.get_mut(name)
    }

    /// Borrow a buffer, creating a zeroed one if absent or mis-shaped
    pub fn ensure(&mut self, name: &str, kind: BufferKind, len: usize) -> &mut Buffer {
        let fits = self
            .fields
            .get(name)
            .is_some_and(|b| b.kind() == kind && b.len() == len);
        if !fits {
            self.fields.insert(name.to_string(), Buffer::zeroed(kind, len));
        }
        self.fields
            .entry(name.to_string())
            .or_insert_with(|| Buffer::zeroed(kind, len))
    }

    /// Remove a buffer
    pub fn remove(&mut self, name: &str) -> Option<Buffer> {
        self.fields.remove(name)
    }

    /// Check a buffer is present with the right length and, if given, kind
    #[must_use]
    pub fn is_present(&self, name: &str, kind: Option<BufferKind>, len: usize) -> bool {
        self.fields
            .get(name)
            .is_some_and(|b| b.len() == len && kind.is_none_or(|k| b.kind() == k))
    }

    /// Buffer names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of buffers
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
