use super::write_line;
use crate::model::InsertPointRequest;
use bytes::{Bytes, BytesMut};
use std::io::{self, Read};

/// Lazily encodes insertion requests as newline-terminated lines.
///
/// Each `read` fills the caller's buffer with as many whole lines as fit. A
/// line that does not fit in the remaining space is kept for the next call.
/// Only a line longer than the entire buffer is split across calls.
pub struct PointReader {
    requests: Vec<InsertPointRequest>,
    next: usize,
    // Encoded form of `requests[next]`, with its newline, once staged.
    line: Vec<u8>,
    line_pos: usize,
    staged: bool,
}

impl PointReader {
    pub fn new(requests: Vec<InsertPointRequest>) -> Self {
        Self {
            requests,
            next: 0,
            line: Vec::new(),
            line_pos: 0,
            staged: false,
        }
    }

    /// Number of requests not yet fully written out.
    pub fn remaining(&self) -> usize {
        self.requests.len() - self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.requests.len()
    }

    fn stage(&mut self) -> bool {
        if self.staged {
            return true;
        }
        let Some(request) = self.requests.get(self.next) else {
            return false;
        };
        self.line.clear();
        write_line(request, &mut self.line);
        self.line.push(b'\n');
        self.line_pos = 0;
        self.staged = true;
        true
    }
}

impl From<Vec<InsertPointRequest>> for PointReader {
    fn from(requests: Vec<InsertPointRequest>) -> Self {
        Self::new(requests)
    }
}

impl Read for PointReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut offset = 0;
        while self.stage() {
            let start = self.line_pos;
            let pending = self.line.len() - start;
            let room = buf.len() - offset;

            if pending > room {
                if offset == 0 {
                    buf.copy_from_slice(&self.line[start..start + room]);
                    self.line_pos += room;
                    return Ok(room);
                }
                break;
            }

            buf[offset..offset + pending].copy_from_slice(&self.line[start..]);
            offset += pending;
            self.staged = false;
            self.next += 1;
        }

        Ok(offset)
    }
}

/// Adapts a [`PointReader`] into a sequence of body chunks of at most
/// `chunk_size` bytes, suitable for a streaming HTTP body.
pub struct PointChunks {
    reader: PointReader,
    chunk_size: usize,
    buf: BytesMut,
}

impl PointChunks {
    pub fn new(reader: PointReader, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            reader,
            chunk_size,
            buf: BytesMut::with_capacity(chunk_size),
        }
    }
}

impl Iterator for PointChunks {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.resize(self.chunk_size, 0);
        match self.reader.read(&mut self.buf[..]) {
            Ok(0) => None,
            Ok(n) => Some(Ok(self.buf.split_to(n).freeze())),
            Err(e) => Some(Err(e)),
        }
    }
}
