//! Bounded read buffer shared between the socket and the request parser.
//!
//! The connection appends whatever the socket returns, hands the unconsumed
//! region to the parser, and discards exactly the bytes the parser reports
//! as consumed. Unconsumed bytes (the start of a pipelined or partially read
//! request) survive to the next turn.

use bytes::{Buf, BytesMut};

pub struct ReadBuffer {
    inner: BytesMut,
    limit: usize,
}

impl ReadBuffer {
    /// Creates an empty buffer that will never hold more than `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: BytesMut::with_capacity(limit.min(4096)),
            limit,
        }
    }

    /// Appends freshly read bytes.
    ///
    /// Callers size their reads with [`ReadBuffer::remaining`]; anything
    /// beyond the limit is dropped.
    pub fn append(&mut self, data: &[u8]) {
        let take = data.len().min(self.remaining());
        self.inner.extend_from_slice(&data[..take]);
    }

    /// Bytes received but not yet consumed by the parser.
    pub fn unconsumed(&self) -> &[u8] {
        &self.inner
    }

    /// Discards the first `n` unconsumed bytes.
    pub fn consume(&mut self, n: usize) {
        self.inner.advance(n.min(self.inner.len()));
    }

    /// How many more bytes may be appended before the limit is hit.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.inner.len())
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_slides_remaining_bytes_forward() {
        let mut buf = ReadBuffer::with_limit(16);
        buf.append(b"GET / HTTP/1.1\r\n");
        buf.consume(4);
        assert_eq!(buf.unconsumed(), b"/ HTTP/1.1\r\n");
        assert_eq!(buf.remaining(), 4);
    }

    #[test]
    fn append_stops_at_limit() {
        let mut buf = ReadBuffer::with_limit(4);
        buf.append(b"abcdef");
        assert_eq!(buf.unconsumed(), b"abcd");
        assert!(buf.is_full());

        buf.consume(10);
        assert!(buf.is_empty());
        assert_eq!(buf.remaining(), 4);
    }
}
