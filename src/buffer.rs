//! The input buffer: a bounded FIFO of pending stream bytes over
//! caller-supplied storage.
//!
//! The decoder reads through a cursor without committing; bytes are
//! consumed only once a complete packet has been recognized. Unread
//! bytes are moved to the front of the storage before new data is
//! appended, so the free space reported to callers is always the full
//! capacity minus the pending bytes.

use crate::error::Error;

pub(crate) struct Buffer<'a> {
    storage: &'a mut [u8],

    /// Read cursor; bytes below it have been consumed.
    head: usize,

    /// End of the valid bytes.
    tail: usize,
}

impl<'a> Buffer<'a> {
    pub fn new(storage: &'a mut [u8]) -> Buffer<'a> {
        Buffer {
            storage,
            head: 0,
            tail: 0,
        }
    }

    /// Appends `data` behind the pending bytes. Fails when the chunk is
    /// larger than [`Buffer::free_space`]; nothing is appended then.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), Error> {
        self.compact();

        if data.len() > self.storage.len() - self.tail {
            return Err(Error::InvalidArgument);
        }

        self.storage[self.tail..self.tail + data.len()].copy_from_slice(data);
        self.tail += data.len();

        Ok(())
    }

    /// The byte `offset` positions past the cursor, if present.
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        if self.head + offset < self.tail {
            Some(self.storage[self.head + offset])
        } else {
            None
        }
    }

    /// The byte at the cursor, if present.
    pub fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    /// All pending bytes, cursor first.
    pub fn pending(&self) -> &[u8] {
        &self.storage[self.head..self.tail]
    }

    /// Consumes `count` bytes.
    pub fn advance(&mut self, count: usize) {
        debug_assert!(count <= self.len());
        self.head = (self.head + count).min(self.tail);

        if self.head == self.tail {
            self.head = 0;
            self.tail = 0;
        }
    }

    /// Number of pending bytes.
    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    /// Capacity still available to [`Buffer::feed`].
    pub fn free_space(&self) -> usize {
        self.storage.len() - self.len()
    }

    fn compact(&mut self) {
        if self.head > 0 {
            self.storage.copy_within(self.head..self.tail, 0);
            self.tail -= self.head;
            self.head = 0;
        }
    }
}
