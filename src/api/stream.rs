use super::error::ApiError;
use crate::types::{NewFilesData, StreamChunk, UpdateFileContent, FILE_EDIT_START_EVENT};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Splits a byte stream of directly concatenated JSON objects into chunks.
///
/// Objects may arrive split across any number of network reads; incomplete
/// trailing bytes are kept until the next call. Object boundaries are found
/// by a brace scanner that resumes where the previous read stopped, so each
/// byte is scanned once and each complete object is parsed once.
#[derive(Default)]
pub struct ChunkDecoder {
    buffer: Vec<u8>,
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawChunk {
    #[serde(default)]
    event: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    token: Option<Value>,
    #[serde(default)]
    retrieved_file_paths: Option<Vec<String>>,
    #[serde(default)]
    updated_file_contents: Option<BTreeMap<String, UpdateFileContent>>,
    #[serde(default)]
    new_files: Option<Value>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, bytes: &[u8]) -> Result<Vec<StreamChunk>, ApiError> {
        self.buffer.extend_from_slice(bytes);
        let mut chunks = Vec::new();
        let mut start = 0;

        while self.scanned < self.buffer.len() {
            let byte = self.buffer[self.scanned];
            self.scanned += 1;

            if self.depth == 0 {
                if byte.is_ascii_whitespace() {
                    start = self.scanned;
                    continue;
                }
                if byte != b'{' {
                    return Err(ApiError::Decode(serde::de::Error::custom(format!(
                        "expected a JSON object, found {:?}",
                        char::from(byte)
                    ))));
                }
                self.depth = 1;
                continue;
            }

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let raw: RawChunk = serde_json::from_slice(&self.buffer[start..self.scanned])
                            .map_err(ApiError::Decode)?;
                        chunks.extend(raw.into_chunks());
                        start = self.scanned;
                    }
                }
                _ => {}
            }
        }

        self.buffer.drain(..start);
        self.scanned -= start;
        Ok(chunks)
    }

    /// Fails if the stream closed in the middle of an object.
    pub fn finish(&mut self) -> Result<(), ApiError> {
        let pending = self
            .buffer
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .count();
        self.buffer.clear();
        self.scanned = 0;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
        if pending > 0 {
            return Err(ApiError::Truncated { pending });
        }
        Ok(())
    }
}

impl RawChunk {
    fn into_chunks(self) -> Vec<StreamChunk> {
        if string_field(self.event).as_deref() == Some(FILE_EDIT_START_EVENT) {
            return vec![StreamChunk::FileEditStart];
        }
        if let Some(message) = string_field(self.error) {
            return vec![StreamChunk::Error(message)];
        }

        let mut chunks = Vec::new();
        if let Some(token) = string_field(self.token) {
            chunks.push(StreamChunk::Token(token));
        }
        if let Some(paths) = self.retrieved_file_paths {
            chunks.push(StreamChunk::RetrievedPaths(paths));
        }
        if let Some(updated) = self.updated_file_contents {
            chunks.push(StreamChunk::UpdatedFileContents(updated));
        }
        if let Some(value) = self.new_files {
            match serde_json::from_value::<NewFilesData>(value) {
                Ok(data) => chunks.push(StreamChunk::NewFiles(data.with_synthesized_paths())),
                Err(error) => tracing::warn!(%error, "skipping malformed new_files payload"),
            }
        }

        if chunks.is_empty() {
            chunks.push(StreamChunk::Unknown);
        }
        chunks
    }
}

/// Only string values count; other shapes fall through as unrecognized.
fn string_field(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    }
}
