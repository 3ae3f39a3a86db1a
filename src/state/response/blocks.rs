const BLOCK_DELIMITER: &str = "\n\n";
const FENCE: &str = "```";

/// A completed unit of assistant output, ready to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEvent {
    /// A paragraph-level block with trailing newlines trimmed and CRLF normalized.
    Plain(String),
    /// A fenced code block, emitted only once its closing fence has arrived.
    Code(String),
}

impl BlockEvent {
    pub fn text(&self) -> &str {
        match self {
            BlockEvent::Plain(text) | BlockEvent::Code(text) => text,
        }
    }
}

/// Reassembles streamed tokens into blank-line delimited blocks.
///
/// Fence lines are only recognized inside completed blocks, so a fence split
/// across tokens is still seen once the block ends.
#[derive(Debug, Default)]
pub struct BlockAccumulator {
    pending: String,
    in_code_block: bool,
    code_buffer: String,
}

impl BlockAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_code_block(&self) -> bool {
        self.in_code_block
    }

    pub fn push(&mut self, token: &str) -> Vec<BlockEvent> {
        self.pending.push_str(token);
        let mut events = Vec::new();

        while let Some(idx) = self.pending.find(BLOCK_DELIMITER) {
            let block = self.pending[..idx].to_string();
            self.pending.drain(..idx + BLOCK_DELIMITER.len());

            let fence_lines = block
                .split('\n')
                .filter(|line| line.trim().starts_with(FENCE))
                .count();
            if fence_lines % 2 == 1 {
                self.in_code_block = !self.in_code_block;
            }

            if self.in_code_block {
                self.code_buffer.push_str(&block);
                self.code_buffer.push_str(BLOCK_DELIMITER);
            } else if !self.code_buffer.is_empty() {
                self.code_buffer.push_str(&block);
                events.push(BlockEvent::Code(std::mem::take(&mut self.code_buffer)));
            } else if fence_lines > 0 {
                events.push(BlockEvent::Code(normalize_block(&block)));
            } else {
                events.push(BlockEvent::Plain(normalize_block(&block)));
            }
        }

        events
    }

    /// Flushes whatever is left at end of stream, including an unterminated
    /// code block together with any pending tail.
    pub fn finish(&mut self) -> Option<BlockEvent> {
        let tail = std::mem::take(&mut self.pending);
        self.in_code_block = false;

        if !self.code_buffer.is_empty() {
            let mut code = std::mem::take(&mut self.code_buffer);
            code.push_str(&tail);
            return Some(BlockEvent::Code(normalize_block(&code)));
        }

        let text = normalize_block(&tail);
        if text.is_empty() {
            None
        } else {
            Some(BlockEvent::Plain(text))
        }
    }
}

pub fn normalize_block(block: &str) -> String {
    block
        .trim_end_matches(['\r', '\n'])
        .replace("\r\n", "\n")
}
