/// Splits an event stream into frames. A frame ends at a blank line; its
/// `data:` lines are joined with newlines and `:` comment lines are dropped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one body chunk and returns the data payloads it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // CRLF and LF framing are treated alike.
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut out = Vec::new();
        while let Some(end) = find_blank_line(&self.buf) {
            let block: Vec<u8> = self.buf.drain(..end + 2).collect();
            if let Some(data) = block_data(&block[..end]) {
                out.push(data);
            }
        }
        out
    }

    /// Flushes a trailing frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let block = std::mem::take(&mut self.buf);
        block_data(&block)
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn block_data(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let mut data: Option<String> = None;
    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let Some(rest) = line.strip_prefix("data:") else {
            continue;
        };
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        match data.as_mut() {
            Some(d) => {
                d.push('\n');
                d.push_str(rest);
            }
            None => data = Some(rest.to_string()),
        }
    }
    data
}
