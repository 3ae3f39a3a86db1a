pub mod markdown;

pub use markdown::{MarkdownRender, PlainMarkdown, TerminalMarkdown};
