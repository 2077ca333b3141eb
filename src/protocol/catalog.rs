//! Authorized games catalog.
//!
//! Populated from a successful login response. The whole set is replaced in
//! one assignment every time; there is no partial update.

use serde::{Deserialize, Serialize};

/// One authorized game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEntry {
    /// Numeric game id
    pub id: u32,
    /// Game build version
    pub version: String,
    /// Display name (the key in the login response)
    pub name: String,
    /// Executable the game runs as
    pub process_name: String,
    /// Whether the process is 64-bit
    pub is_64bit: bool,
}

/// Games the session is authorized for, in response order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<GameEntry>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop prior contents and install `entries` in iteration order.
    pub(crate) fn replace<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = GameEntry>,
    {
        self.entries = entries.into_iter().collect();
    }

    /// Iterate entries in response order
    pub fn iter(&self) -> std::slice::Iter<'_, GameEntry> {
        self.entries.iter()
    }

    /// Entries as a slice
    pub fn as_slice(&self) -> &[GameEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by name
    pub fn get(&self, name: &str) -> Option<&GameEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entry names in response order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a GameEntry;
    type IntoIter = std::slice::Iter<'a, GameEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
