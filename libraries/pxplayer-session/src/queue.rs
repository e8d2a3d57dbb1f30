//! Playback queue with a wrap-around cursor
//!
//! ```text
//! items:   [A] [B] [C] [D]
//!                   ^
//!                 cursor (current item)
//! ```
//!
//! The cursor is unset exactly when the queue is empty. Navigation wraps in
//! both directions, so skipping past the last item lands on the first one.

use crate::error::{Result, SessionError};
use crate::types::{MediaDescriptor, QueueItem};

/// Ordered playback queue
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    /// Items in insertion order (duplicates allowed)
    items: Vec<QueueItem>,

    /// Index of the current item, `None` iff `items` is empty
    cursor: Option<usize>,

    /// Next queue-local id to hand out
    next_queue_id: u64,
}

impl PlaybackQueue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append media to the end of the queue
    ///
    /// Inserting into an empty queue puts the cursor on the new item; any
    /// other insert leaves the cursor where it was.
    pub fn enqueue(&mut self, description: MediaDescriptor) -> &QueueItem {
        let item = QueueItem {
            queue_id: self.next_queue_id,
            description,
        };
        self.next_queue_id += 1;
        self.items.push(item);

        if self.cursor.is_none() {
            self.cursor = Some(0);
        }

        &self.items[self.items.len() - 1]
    }

    /// Current cursor position
    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    /// Item under the cursor
    pub fn current_item(&self) -> Option<&QueueItem> {
        self.cursor.and_then(|index| self.items.get(index))
    }

    /// Move the cursor forward, wrapping to the first item
    ///
    /// Returns the new cursor, or `None` on an empty queue (no-op).
    pub fn advance(&mut self) -> Option<usize> {
        let len = self.items.len();
        let cursor = self.cursor?;
        let next = (cursor + 1) % len;
        self.cursor = Some(next);
        Some(next)
    }

    /// Move the cursor backward, wrapping to the last item
    ///
    /// Returns the new cursor, or `None` on an empty queue (no-op).
    pub fn retreat(&mut self) -> Option<usize> {
        let len = self.items.len();
        let cursor = self.cursor?;
        let previous = if cursor > 0 { cursor - 1 } else { len - 1 };
        self.cursor = Some(previous);
        Some(previous)
    }

    /// Jump the cursor to an explicit index
    pub fn set_cursor(&mut self, index: usize) -> Result<()> {
        if self.items.is_empty() {
            return Err(SessionError::QueueEmpty);
        }
        if index >= self.items.len() {
            return Err(SessionError::IndexOutOfBounds(index));
        }
        self.cursor = Some(index);
        Ok(())
    }

    /// Get item at index
    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    /// All items in queue order
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
