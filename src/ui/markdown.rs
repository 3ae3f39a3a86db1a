//! Markdown to terminal text.
//!
//! `TerminalMarkdown` walks pulldown-cmark events and emits ANSI-styled text
//! through crossterm's `ContentStyle`. `PlainMarkdown` returns its input
//! unchanged and is used when stdout is not a terminal.

use anyhow::Result;
use crossterm::style::{Attribute, Color, ContentStyle, Stylize};
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::fmt::Write as _;

pub trait MarkdownRender: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainMarkdown;

impl MarkdownRender for PlainMarkdown {
    fn render(&self, markdown: &str) -> Result<String> {
        Ok(markdown.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalMarkdown;

impl TerminalMarkdown {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
    }
}

impl MarkdownRender for TerminalMarkdown {
    fn render(&self, markdown: &str) -> Result<String> {
        let mut state = RenderState::default();
        for event in Parser::new_ext(markdown, Self::options()) {
            state.handle_event(event)?;
        }
        Ok(state.finish())
    }
}

#[derive(Default)]
struct RenderState {
    out: String,
    style_stack: Vec<ContentStyle>,
    /// `None` for bullet lists, the next number for ordered ones.
    list_stack: Vec<Option<u64>>,
    heading: Option<HeadingLevel>,
    in_code_block: bool,
    link_url: Option<String>,
    table_row: Vec<String>,
    table_cell: Option<String>,
    needs_blank_line: bool,
}

impl RenderState {
    fn handle_event(&mut self, event: Event<'_>) -> Result<()> {
        match event {
            Event::Start(tag) => self.start_tag(tag)?,
            Event::End(tag) => self.end_tag(tag)?,
            Event::Text(text) => self.text(&text)?,
            Event::Code(code) => {
                let styled = code_style().apply(format!("`{code}`"));
                self.push_inline(&styled.to_string());
            }
            Event::SoftBreak => self.push_inline(" "),
            Event::HardBreak => {
                self.out.push('\n');
                self.indent();
            }
            Event::Rule => {
                self.blank_line_if_needed();
                let rule = ContentStyle::new().dark_grey().apply("─".repeat(40));
                writeln!(self.out, "{rule}")?;
                self.needs_blank_line = true;
            }
            Event::TaskListMarker(checked) => {
                self.push_inline(if checked { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
        Ok(())
    }

    fn start_tag(&mut self, tag: Tag<'_>) -> Result<()> {
        match tag {
            Tag::Paragraph => {
                if self.list_stack.is_empty() {
                    self.blank_line_if_needed();
                }
            }
            Tag::Heading { level, .. } => {
                self.blank_line_if_needed();
                let marker = "#".repeat(heading_depth(level));
                let styled = heading_style(level).apply(format!("{marker} "));
                write!(self.out, "{styled}")?;
                self.style_stack.push(heading_style(level));
                self.heading = Some(level);
            }
            Tag::CodeBlock(kind) => {
                self.blank_line_if_needed();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        let label = ContentStyle::new().dark_grey().apply(format!("  {lang}"));
                        writeln!(self.out, "{label}")?;
                    }
                }
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.list_stack.is_empty() {
                    self.blank_line_if_needed();
                }
                self.list_stack.push(start);
            }
            Tag::Item => {
                if !self.out.is_empty() && !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
                let depth = self.list_stack.len().saturating_sub(1);
                let marker = match self.list_stack.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}. ");
                        *number += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                write!(self.out, "{}{}", "  ".repeat(depth), marker)?;
            }
            Tag::BlockQuote(_) => {
                self.blank_line_if_needed();
                self.out.push_str("│ ");
                self.style_stack.push(ContentStyle::new().italic());
            }
            Tag::Emphasis => self.style_stack.push(ContentStyle::new().italic()),
            Tag::Strong => self.style_stack.push(ContentStyle::new().bold()),
            Tag::Strikethrough => self.style_stack.push(ContentStyle::new().crossed_out()),
            Tag::Link { dest_url, .. } => {
                self.link_url = Some(dest_url.to_string());
                self.style_stack.push(ContentStyle::new().underlined().blue());
            }
            Tag::Table(_) => self.blank_line_if_needed(),
            Tag::TableHead | Tag::TableRow => self.table_row.clear(),
            Tag::TableCell => self.table_cell = Some(String::new()),
            _ => {}
        }
        Ok(())
    }

    fn end_tag(&mut self, tag: TagEnd) -> Result<()> {
        match tag {
            TagEnd::Paragraph => {
                self.out.push('\n');
                self.needs_blank_line = true;
            }
            TagEnd::Heading(_) => {
                self.style_stack.pop();
                self.heading = None;
                self.out.push('\n');
                self.needs_blank_line = true;
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.needs_blank_line = true;
            }
            TagEnd::List(_) => {
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    if !self.out.ends_with('\n') {
                        self.out.push('\n');
                    }
                    self.needs_blank_line = true;
                }
            }
            TagEnd::Item => {
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
            }
            TagEnd::BlockQuote(_) => {
                self.style_stack.pop();
                self.needs_blank_line = true;
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.style_stack.pop();
            }
            TagEnd::Link => {
                self.style_stack.pop();
                if let Some(url) = self.link_url.take() {
                    let styled = ContentStyle::new().dark_grey().apply(format!(" ({url})"));
                    self.push_inline(&styled.to_string());
                }
            }
            TagEnd::TableCell => {
                if let Some(cell) = self.table_cell.take() {
                    self.table_row.push(cell);
                }
            }
            TagEnd::TableHead => {
                let header = self.table_row.join(" │ ");
                let styled = ContentStyle::new().bold().apply(header.as_str());
                writeln!(self.out, "{styled}")?;
                let width = header.chars().count();
                writeln!(self.out, "{}", "─".repeat(width))?;
                self.table_row.clear();
            }
            TagEnd::TableRow => {
                writeln!(self.out, "{}", self.table_row.join(" │ "))?;
                self.table_row.clear();
            }
            TagEnd::Table => self.needs_blank_line = true,
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if self.in_code_block {
            for line in text.lines() {
                writeln!(self.out, "  {}", code_style().apply(line))?;
            }
            return Ok(());
        }
        let style = self.current_style();
        let styled = style.apply(text).to_string();
        self.push_inline(&styled);
        Ok(())
    }

    fn push_inline(&mut self, text: &str) {
        match self.table_cell.as_mut() {
            Some(cell) => cell.push_str(text),
            None => self.out.push_str(text),
        }
    }

    fn indent(&mut self) {
        let depth = self.list_stack.len();
        if depth > 0 {
            self.out.push_str(&"  ".repeat(depth));
        }
    }

    fn current_style(&self) -> ContentStyle {
        self.style_stack
            .iter()
            .fold(ContentStyle::new(), |mut acc, style| {
                if style.foreground_color.is_some() {
                    acc.foreground_color = style.foreground_color;
                }
                acc.attributes.extend(style.attributes);
                acc
            })
    }

    fn blank_line_if_needed(&mut self) {
        if self.needs_blank_line {
            if !self.out.ends_with('\n') {
                self.out.push('\n');
            }
            self.out.push('\n');
            self.needs_blank_line = false;
        }
    }

    fn finish(mut self) -> String {
        while self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out
    }
}

fn heading_depth(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn heading_style(level: HeadingLevel) -> ContentStyle {
    let mut style = ContentStyle::new().attribute(Attribute::Bold);
    style.foreground_color = Some(match level {
        HeadingLevel::H1 => Color::AnsiValue(205),
        HeadingLevel::H2 => Color::AnsiValue(39),
        _ => Color::AnsiValue(75),
    });
    style
}

fn code_style() -> ContentStyle {
    ContentStyle::new().with(Color::AnsiValue(215))
}
