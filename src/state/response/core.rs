use super::blocks::{normalize_block, BlockEvent};
use super::state::{
    conversation_header, retrieved_paths_trailer, GenerateOptions, GeneratedResponse,
    ResponseStreamer, StreamRun,
};
use crate::api::{ApiError, ByteStream, ChunkDecoder};
use crate::types::StreamChunk;
use anyhow::Result;
use futures::StreamExt;

const FILE_EDIT_NOTICE: &str = "\n\n\n→ waiting on file‑edits …";

impl ResponseStreamer {
    /// Consumes `stream` to the end and returns the assembled transcripts and
    /// file suggestions.
    ///
    /// A server `error` chunk, undecodable JSON, a transport failure or a stream
    /// that stops inside an object aborts the call with no partial result.
    pub async fn generate(
        &self,
        mut stream: ByteStream,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<GeneratedResponse> {
        let header = if options.answer_only {
            prompt.to_string()
        } else {
            conversation_header(prompt)
        };
        let mut run = StreamRun::new(options.answer_only, &header);

        if !options.answer_only {
            self.print_markdown(&header);
            self.spinner.start().await;
        }

        let outcome = self.drive(&mut stream, &mut run).await;
        if outcome.is_err() || options.answer_only || !options.defer_spinner_stop {
            self.spinner.stop().await;
        }
        outcome?;

        if options.answer_only {
            self.console.line(&run.answer_buffer);
        }
        Ok(run.into_response())
    }

    async fn drive(&self, stream: &mut ByteStream, run: &mut StreamRun) -> Result<()> {
        let mut decoder = ChunkDecoder::new();
        while let Some(item) = stream.next().await {
            let bytes = item?;
            for chunk in decoder.process(&bytes)? {
                self.handle_chunk(chunk, run).await?;
            }
        }
        decoder.finish()?;

        if run.answer_only {
            let tail = normalize_block(&run.answer_tokens);
            run.clean.push_str(&tail);
        } else if let Some(event) = run.blocks.finish() {
            self.emit_block(event, run).await;
        }

        if !run.retrieved_paths.is_empty() {
            let trailer = retrieved_paths_trailer(&run.retrieved_paths);
            run.clean.push_str(&trailer);
            run.raw.push_str(&trailer);
            if run.answer_only {
                run.answer_buffer.push_str(&trailer);
            } else {
                self.paused(|| self.print_markdown(&trailer)).await;
            }
        }

        Ok(())
    }

    async fn handle_chunk(&self, chunk: StreamChunk, run: &mut StreamRun) -> Result<()> {
        match chunk {
            StreamChunk::FileEditStart => {
                if !run.answer_only {
                    self.paused(|| self.console.line(FILE_EDIT_NOTICE)).await;
                }
            }
            StreamChunk::Error(message) => return Err(ApiError::Server(message).into()),
            StreamChunk::Token(token) => {
                run.raw.push_str(&token);
                if run.answer_only {
                    run.answer_buffer.push_str(&token);
                    run.answer_tokens.push_str(&token);
                } else {
                    for event in run.blocks.push(&token) {
                        self.emit_block(event, run).await;
                    }
                }
            }
            StreamChunk::RetrievedPaths(paths) => run.retrieved_paths.extend(paths),
            StreamChunk::UpdatedFileContents(updates) => run.file_updates.extend(updates),
            StreamChunk::NewFiles(data) => {
                if !run.answer_only {
                    let mut listing = String::from("\nSuggested new files:\n");
                    for path in &data.new_file_paths {
                        listing.push_str(&format!("- {path}\n"));
                    }
                    self.paused(|| self.console.write_str(&listing)).await;
                }
                run.new_files = Some(data);
            }
            StreamChunk::Unknown => tracing::debug!("ignoring chunk without known keys"),
        }
        Ok(())
    }

    async fn emit_block(&self, event: BlockEvent, run: &mut StreamRun) {
        let text = event.text();
        if !text.is_empty() {
            self.paused(|| self.print_markdown(text)).await;
        }
        run.clean.push_str(text);
    }

    /// Runs `print` with the spinner stopped, then resumes it.
    async fn paused(&self, print: impl FnOnce()) {
        self.spinner.stop().await;
        print();
        self.spinner.start().await;
    }

    fn print_markdown(&self, text: &str) {
        let rendered = match self.renderer.render(text) {
            Ok(rendered) => rendered,
            Err(error) => {
                tracing::warn!(%error, "markdown render failed, printing raw text");
                text.to_string()
            }
        };
        self.console
            .write_str(&format!("{}\n\n", rendered.trim_end_matches('\n')));
    }
}
