// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tokenizes marked-up text into style start/end and plain character events.
//!
//! Grounded on `KText.cpp`'s markup scanner: a line style opened by a
//! delimiter character (default `#`) runs to the next newline; paired styles
//! are opened and closed by matching tokens (default `[` `]`), nest via a
//! stack, and an escape character (default `\`) passes the following
//! codepoint through literally.

use alloc::string::String;
use alloc::vec::Vec;

/// Identifies a registered style by the token that opens it.
pub type StyleId = u32;

/// One registered paired-style opener/closer pair, e.g. `[b]`...`[/b]`.
#[derive(Debug, Clone)]
pub struct StyleToken {
    pub id: StyleId,
    pub opener: String,
    pub closer: String,
}

/// Receives tokenized events as [`TextParser::parse`] scans the input.
pub trait TextParserSink {
    fn on_style_start(&mut self, id: StyleId);
    fn on_char(&mut self, c: char);
    /// `inner_text` is everything between the opener and closer, not
    /// including either; `arg_after_pipe` is the portion of `inner_text` after
    /// the first `|`, if any (used for e.g. ruby readings: `[ruby]base|yomi[/ruby]`).
    fn on_style_end(&mut self, id: StyleId, inner_text: &str, arg_after_pipe: Option<&str>);
}

/// Tokenizes marked-up text against a registered set of style tokens.
pub struct TextParser {
    line_style: Option<(char, StyleId)>,
    paired_styles: Vec<StyleToken>,
    escape_char: char,
}

struct OpenStyle {
    id: StyleId,
    inner_start: usize,
    /// `None` for the implicit line style, which closes on a bare newline
    /// rather than a textual closer token.
    closer: Option<String>,
}

impl Default for TextParser {
    fn default() -> Self {
        TextParser::new()
    }
}

impl TextParser {
    pub fn new() -> TextParser {
        TextParser {
            line_style: None,
            paired_styles: Vec::new(),
            escape_char: '\\',
        }
    }

    /// Registers the line-style delimiter, e.g. `#` opening a style that runs
    /// to the end of the current line.
    pub fn set_line_style(&mut self, delimiter: char, id: StyleId) {
        self.line_style = Some((delimiter, id));
    }

    /// Registers a paired style, e.g. `[b]`/`[/b]`.
    pub fn add_paired_style(&mut self, opener: &str, closer: &str, id: StyleId) {
        self.paired_styles.push(StyleToken {
            id,
            opener: String::from(opener),
            closer: String::from(closer),
        });
    }

    pub fn set_escape_char(&mut self, c: char) {
        self.escape_char = c;
    }

    /// Scans `text`, emitting events to `sink`. A style-end whose closer
    /// doesn't match the current top-of-stack opener is treated as a mismatch:
    /// [`TextParserSink::on_style_end`] is still called (so unbalanced markup
    /// isn't silently swallowed), but with an empty `inner_text`.
    pub fn parse(&self, text: &str, sink: &mut dyn TextParserSink) {
        let chars: Vec<char> = text.chars().collect();
        let mut stack: Vec<OpenStyle> = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if c == self.escape_char && i + 1 < chars.len() {
                sink.on_char(chars[i + 1]);
                i += 2;
                continue;
            }

            if let Some((delim, id)) = self.line_style {
                if c == delim && !stack.iter().any(|s| s.closer.is_none()) {
                    stack.push(OpenStyle {
                        id,
                        inner_start: i + 1,
                        closer: None,
                    });
                    sink.on_style_start(id);
                    i += 1;
                    continue;
                }
            }

            if c == '\n' {
                if let Some(top) = stack.last() {
                    if top.closer.is_none() {
                        let style = stack.pop().unwrap();
                        self.emit_end(sink, &style, &chars, style.inner_start, i);
                    }
                }
                sink.on_char(c);
                i += 1;
                continue;
            }

            if let Some(token) = self.matching_opener(&chars, i) {
                stack.push(OpenStyle {
                    id: token.id,
                    inner_start: i + token.opener.chars().count(),
                    closer: Some(token.closer.clone()),
                });
                sink.on_style_start(token.id);
                i += token.opener.chars().count();
                continue;
            }

            // A closer only ever matches the current top-of-stack opener;
            // a registered closer token appearing while a different (or no)
            // style is on top is a mismatch, matching KText.cpp's LIFO-only
            // nesting: still reported via `on_style_end`, but with empty text.
            if let Some(top) = stack.last() {
                if let Some(closer) = top.closer.clone() {
                    if chars_start_with(&chars, i, &closer) {
                        let style = stack.pop().unwrap();
                        self.emit_end(sink, &style, &chars, style.inner_start, i);
                        i += closer.chars().count();
                        continue;
                    }
                }
            }

            if let Some(token) = self.matching_closer(&chars, i) {
                sink.on_style_end(token.id, "", None);
                i += token.closer.chars().count();
                continue;
            }

            sink.on_char(c);
            i += 1;
        }

        // Unterminated styles at end of input: close them out with whatever
        // text remains, innermost first.
        while let Some(style) = stack.pop() {
            self.emit_end(sink, &style, &chars, style.inner_start, chars.len());
        }
    }

    fn emit_end(&self, sink: &mut dyn TextParserSink, style: &OpenStyle, chars: &[char], start: usize, end: usize) {
        if start > end {
            sink.on_style_end(style.id, "", None);
            return;
        }
        let inner: String = chars[start..end].iter().collect();
        match inner.find('|') {
            Some(byte_idx) => {
                let (before, after) = inner.split_at(byte_idx);
                sink.on_style_end(style.id, before, Some(&after[1..]));
            }
            None => sink.on_style_end(style.id, &inner, None),
        }
    }

    fn matching_opener(&self, chars: &[char], at: usize) -> Option<&StyleToken> {
        self.paired_styles
            .iter()
            .find(|token| chars_start_with(chars, at, &token.opener))
    }

    fn matching_closer(&self, chars: &[char], at: usize) -> Option<&StyleToken> {
        self.paired_styles
            .iter()
            .find(|token| chars_start_with(chars, at, &token.closer))
    }
}

fn chars_start_with(chars: &[char], at: usize, needle: &str) -> bool {
    let needle_chars: Vec<char> = needle.chars().collect();
    if at + needle_chars.len() > chars.len() {
        return false;
    }
    chars[at..at + needle_chars.len()] == needle_chars[..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        starts: Vec<StyleId>,
        ends: Vec<(StyleId, String, Option<String>)>,
        chars: String,
    }

    impl TextParserSink for Recorder {
        fn on_style_start(&mut self, id: StyleId) {
            self.starts.push(id);
        }
        fn on_char(&mut self, c: char) {
            self.chars.push(c);
        }
        fn on_style_end(&mut self, id: StyleId, inner_text: &str, arg_after_pipe: Option<&str>) {
            self.ends
                .push((id, String::from(inner_text), arg_after_pipe.map(String::from)));
        }
    }

    #[test]
    fn plain_text_has_no_style_events() {
        let parser = TextParser::new();
        let mut rec = Recorder::default();
        parser.parse("hello", &mut rec);
        assert_eq!("hello", rec.chars);
        assert!(rec.starts.is_empty());
        assert!(rec.ends.is_empty());
    }

    #[test]
    fn paired_style_reports_inner_text() {
        let mut parser = TextParser::new();
        parser.add_paired_style("[b]", "[/b]", 1);
        let mut rec = Recorder::default();
        parser.parse("a[b]bold[/b]c", &mut rec);
        assert_eq!("aboldc", rec.chars);
        assert_eq!(vec![1], rec.starts);
        assert_eq!(vec![(1, String::from("bold"), None)], rec.ends);
    }

    #[test]
    fn pipe_splits_ruby_argument() {
        let mut parser = TextParser::new();
        parser.add_paired_style("[ruby]", "[/ruby]", 2);
        let mut rec = Recorder::default();
        parser.parse("[ruby]漢字|かんじ[/ruby]", &mut rec);
        assert_eq!(
            vec![(2, String::from("漢字"), Some(String::from("かんじ")))],
            rec.ends
        );
    }

    #[test]
    fn line_style_closes_at_newline() {
        let mut parser = TextParser::new();
        parser.set_line_style('#', 3);
        let mut rec = Recorder::default();
        parser.parse("#red\nnormal", &mut rec);
        assert_eq!(vec![3], rec.starts);
        assert_eq!(vec![(3, String::from("red"), None)], rec.ends);
        assert_eq!("red\nnormal", rec.chars);
    }

    #[test]
    fn escape_char_passes_next_codepoint_literally() {
        let mut parser = TextParser::new();
        parser.add_paired_style("[b]", "[/b]", 1);
        let mut rec = Recorder::default();
        parser.parse(r"\[b]plain\[/b]", &mut rec);
        assert_eq!("[b]plain[/b]", rec.chars);
        assert!(rec.starts.is_empty());
    }

    #[test]
    fn mismatched_closer_reports_empty_text_instead_of_passing_through() {
        let mut parser = TextParser::new();
        parser.add_paired_style("[b]", "[/b]", 1);
        parser.add_paired_style("[i]", "[/i]", 2);
        let mut rec = Recorder::default();
        // [/i] shows up while [b] is on top of the stack: a mismatch.
        parser.parse("[b]bold[/i]end[/b]", &mut rec);

        assert_eq!((2, String::new(), None), rec.ends[0]);
        assert_eq!(1, rec.ends[1].0);
        assert_eq!("boldend", rec.chars);
    }

    #[test]
    fn unopened_closer_reports_empty_text() {
        let mut parser = TextParser::new();
        parser.add_paired_style("[b]", "[/b]", 1);
        let mut rec = Recorder::default();
        parser.parse("hi[/b]there", &mut rec);

        assert_eq!(vec![(1, String::new(), None)], rec.ends);
        assert_eq!("hithere", rec.chars);
        assert!(rec.starts.is_empty());
    }

    #[test]
    fn nested_styles_close_innermost_first() {
        let mut parser = TextParser::new();
        parser.add_paired_style("[b]", "[/b]", 1);
        parser.add_paired_style("[i]", "[/i]", 2);
        let mut rec = Recorder::default();
        parser.parse("[b]bold [i]both[/i][/b]", &mut rec);
        assert_eq!(2, rec.ends[0].0);
        assert_eq!(1, rec.ends[1].0);
    }
}
