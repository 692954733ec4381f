//! FILENAME: core/connect/src/chunk.rs
//! PURPOSE: Splits CSV input into chunks that end on record boundaries.
//! CONTEXT: Each read pulls `chunk_size` bytes; whatever follows the last
//! complete record is carried into the next chunk. A newline inside a
//! quoted field is not a boundary, so a quoted multi-line value is never
//! split across chunks. Quotes only open a field at its first byte; a quote
//! inside an unquoted field is literal.

use std::io::{self, Read};

/// Default number of bytes pulled per read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// A run of complete CSV records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Vec<u8>,
    /// 1-based line number of the first byte of `data` in the whole input.
    pub first_line: u64,
    /// Bytes consumed from the source when this chunk was emitted.
    pub bytes_read: u64,
}

pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    delimiter: u8,
    carry: Vec<u8>,
    next_line: u64,
    bytes_read: u64,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        ChunkReader {
            reader,
            chunk_size: chunk_size.max(1),
            delimiter: b',',
            carry: Vec::new(),
            next_line: 1,
            bytes_read: 0,
            done: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn emit(&mut self, data: Vec<u8>) -> Chunk {
        let first_line = self.next_line;
        self.next_line += data.iter().filter(|&&b| b == b'\n').count() as u64;
        Chunk {
            data,
            first_line,
            bytes_read: self.bytes_read,
        }
    }

    /// Reads until `buf` is full or the source is exhausted.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            if self.done {
                if self.carry.is_empty() {
                    return None;
                }
                let data = std::mem::take(&mut self.carry);
                return Some(Ok(self.emit(data)));
            }

            let n = match self.fill(&mut buf) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    self.carry.clear();
                    return Some(Err(e));
                }
            };
            if n == 0 {
                self.done = true;
                continue;
            }
            self.bytes_read += n as u64;
            self.carry.extend_from_slice(&buf[..n]);

            if let Some(end) = last_record_boundary(&self.carry, self.delimiter) {
                let rest = self.carry.split_off(end);
                let data = std::mem::replace(&mut self.carry, rest);
                return Some(Ok(self.emit(data)));
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Scan {
    FieldStart,
    Unquoted,
    Quoted,
    /// A quote inside a quoted field: closes it, or escapes a second quote.
    QuotedQuote,
}

/// Index just past the last newline that ends a record. `buf` must start at
/// a record boundary.
pub fn last_record_boundary(buf: &[u8], delimiter: u8) -> Option<usize> {
    let mut state = Scan::FieldStart;
    let mut boundary = None;
    for (i, &b) in buf.iter().enumerate() {
        state = match state {
            Scan::Quoted => match b {
                b'"' => Scan::QuotedQuote,
                _ => Scan::Quoted,
            },
            Scan::QuotedQuote if b == b'"' => Scan::Quoted,
            Scan::FieldStart if b == b'"' => Scan::Quoted,
            _ if b == b'\n' => {
                boundary = Some(i + 1);
                Scan::FieldStart
            }
            _ if b == delimiter => Scan::FieldStart,
            _ => Scan::Unquoted,
        };
    }
    boundary
}
