//! Structural-key memoization of compiled cursors.
//!
//! Compiling a chain is cheap, but view caching keys off cursor *identity*:
//! two independently built chains with identical clause sequences must
//! resolve to the same `Rc<Cursor>` so they share one view per collection
//! instead of materializing duplicates.

use crate::clause::QueryData;
use crate::compile::{Cursor, CursorId};
use alloc::rc::Rc;
use alloc::string::ToString;
use hashbrown::HashMap;

/// Memoization cache from structural chain key to compiled cursor.
pub struct CursorCache {
    cursors: HashMap<alloc::string::String, Rc<Cursor>>,
    next_id: CursorId,
}

impl Default for CursorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            cursors: HashMap::new(),
            next_id: 0,
        }
    }

    /// Resolves the cursor for `key`, compiling the chain on first use.
    ///
    /// `data` is only invoked on a cache miss.
    pub fn resolve<F>(&mut self, key: &str, data: F) -> Rc<Cursor>
    where
        F: FnOnce() -> QueryData,
    {
        if let Some(cursor) = self.cursors.get(key) {
            return cursor.clone();
        }

        let id = self.next_id;
        self.next_id += 1;

        let cursor = Rc::new(Cursor::new(id, key, data()));
        self.cursors.insert(key.to_string(), cursor.clone());
        cursor
    }

    /// Returns the number of compiled cursors.
    #[inline]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Returns true if nothing has been compiled yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
