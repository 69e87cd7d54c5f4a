use bytes::{Bytes, BytesMut};

/// Size of the Docker stream multiplexing header: one stream-type byte,
/// three zero bytes, then a big-endian u32 payload length.
pub const FRAME_HEADER_LEN: usize = 8;

/// Strips a leading multiplexing header if the line carries one.
///
/// Demultiplexed streams pass through untouched.
pub fn strip_frame_header(line: &[u8]) -> &[u8] {
    if has_frame_header(line) {
        &line[FRAME_HEADER_LEN..]
    } else {
        line
    }
}

fn has_frame_header(line: &[u8]) -> bool {
    line.len() >= FRAME_HEADER_LEN && line[0] <= 2 && line[1..4] == [0, 0, 0]
}

/// Longest line held back waiting for a terminator.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Reassembles lines from arbitrarily sized stream chunks.
///
/// Output longer than the line limit without a newline is cut into
/// limit-sized lines so the pending buffer stays bounded.
#[derive(Debug)]
pub struct LineSplitter {
    pending: BytesMut,
    max_line_len: usize,
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            max_line_len: max_line_len.max(1),
        }
    }

    /// Feeds a chunk and returns every line it completes, without the line
    /// terminator. A partial trailing line is held for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        loop {
            let window = self.pending.len().min(self.max_line_len + 1);
            match self.pending[..window].iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    let mut line = self.pending.split_to(pos + 1);
                    line.truncate(pos);
                    if line.last() == Some(&b'\r') {
                        line.truncate(pos - 1);
                    }
                    lines.push(line.freeze());
                }
                None if self.pending.len() > self.max_line_len => {
                    lines.push(self.pending.split_to(self.max_line_len).freeze());
                }
                None => break,
            }
        }
        lines
    }

    /// Returns the unterminated remainder once the stream has ended.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.split().freeze())
        }
    }
}
