//! Limited chunk buffer.

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// Chunk configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Chunk capacity must hold at least one record.
    ZeroCapacity,
}

impl Error for ConfigError {}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ConfigError::ZeroCapacity => write!(f, "chunk capacity must be at least 1 record"),
        }
    }
}

/// Buffer limited by elements count.
///
/// The backing vector is reused between chunks: [`LimitedBuffer::drain`] empties the buffer but keeps its allocation.
pub struct LimitedBuffer<T> {
    limit: usize,
    inner: Vec<T>,
}

impl<T> LimitedBuffer<T> {
    /// Creates a buffer holding at most `limit` elements.
    pub fn new(limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        return Ok(LimitedBuffer {
            limit,
            inner: Vec::new(),
        });
    }

    /// Adds a new element to the buffer.
    ///
    /// # Panics
    /// Panics if the buffer is already full.
    pub fn push(&mut self, item: T) {
        assert!(
            !self.is_full(),
            "buffer limit exceeded (limit: {})",
            self.limit
        );
        self.inner.push(item);
    }

    /// Returns buffer length
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    /// Stable-sorts buffered elements.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.inner.sort_by(compare);
    }

    /// Removes all elements, yielding them in buffer order.
    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.inner.drain(..)
    }
}

#[cfg(test)]
mod test {
    use super::{ConfigError, LimitedBuffer};

    #[test]
    fn test_limited_buffer() {
        let mut buffer = LimitedBuffer::new(2).unwrap();

        buffer.push(0);
        assert_eq!(buffer.is_full(), false);
        buffer.push(1);
        assert_eq!(buffer.is_full(), true);

        let data = Vec::from_iter(buffer.drain());
        assert_eq!(data, vec![0, 1]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.is_full(), false);
    }

    #[test]
    fn test_zero_limit() {
        assert_eq!(LimitedBuffer::<i32>::new(0).err(), Some(ConfigError::ZeroCapacity));
    }

    #[test]
    #[should_panic(expected = "buffer limit exceeded")]
    fn test_push_beyond_limit() {
        let mut buffer = LimitedBuffer::new(1).unwrap();
        buffer.push(0);
        buffer.push(1);
    }

    #[test]
    fn test_stable_sort() {
        let mut buffer = LimitedBuffer::new(4).unwrap();
        for item in [(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')] {
            buffer.push(item);
        }

        buffer.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(Vec::from_iter(buffer.drain()), vec![(1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')]);
    }
}
