//! The tokenizer: turns the decoded character stream from [`Reader`] into a
//! queue of [`Token`]s per the YAML 1.1 lexical grammar.
//!
//! [`Scanner::fetch_more_tokens`] is the entry point the [`Parser`] drives:
//! it keeps fetching raw tokens until at least one is unambiguously ready to
//! be handed out (accounting for stale simple-key candidates) and then
//! returns, leaving the fetched tokens in `self.tokens`.
//!
//! [`Parser`]: crate::Parser

use std::collections::VecDeque;

use crate::macros::is_blankz;
use crate::reader::Reader;
use crate::token::{Token, TokenData};
use crate::{Encoding, Mark, ScalarStyle, ScannerError};

#[derive(Debug, Clone, Copy)]
struct SimpleKey {
    possible: bool,
    required: bool,
    token_number: usize,
    mark: Mark,
}

impl SimpleKey {
    const EMPTY: SimpleKey = SimpleKey {
        possible: false,
        required: false,
        token_number: 0,
        mark: Mark {
            index: 0,
            line: 0,
            column: 0,
        },
    };
}

pub(crate) struct Scanner<'r> {
    reader: Reader<'r>,
    buffer: VecDeque<char>,

    encoding: Encoding,
    stream_start_produced: bool,
    pub(crate) stream_end_produced: bool,

    indent: i32,
    indents: Vec<i32>,
    flow_level: u32,
    simple_key_allowed: bool,
    simple_keys: Vec<SimpleKey>,

    pub(crate) tokens: VecDeque<Token>,
    pub(crate) tokens_parsed: usize,
    pub(crate) token_available: bool,
}

impl<'r> Scanner<'r> {
    pub(crate) fn new() -> Self {
        Scanner {
            reader: Reader::new(),
            buffer: VecDeque::new(),
            encoding: Encoding::Any,
            stream_start_produced: false,
            stream_end_produced: false,
            indent: -1,
            indents: Vec::new(),
            flow_level: 0,
            simple_key_allowed: false,
            simple_keys: Vec::new(),
            tokens: VecDeque::new(),
            tokens_parsed: 0,
            token_available: false,
        }
    }

    pub(crate) fn set_input_string(&mut self, input: &'r mut &[u8]) {
        self.reader.set_input_string(input);
    }

    pub(crate) fn set_input(&mut self, input: &'r mut dyn std::io::BufRead) {
        self.reader.set_input(input);
    }

    pub(crate) fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
        self.reader.set_encoding(encoding);
    }

    fn mark(&self) -> Mark {
        self.reader.mark()
    }

    fn cache(&mut self, length: usize) -> Result<(), ScannerError> {
        while self.buffer.len() < length {
            match self.reader.peek(self.buffer.len())? {
                Some(ch) => self.buffer.push_back(ch),
                None => break,
            }
        }
        Ok(())
    }

    fn skip(&mut self) -> Result<(), ScannerError> {
        self.buffer.pop_front();
        self.reader.forward(1)?;
        Ok(())
    }

    /// A line break, possibly preceded by whitespace, was already confirmed
    /// at the cursor. Single-char breaks only: the reader collapses CRLF
    /// into one logical `'\n'` at decode time.
    fn skip_line(&mut self) -> Result<(), ScannerError> {
        self.skip()
    }

    fn read_string(&mut self, string: &mut String) -> Result<(), ScannerError> {
        if let Some(ch) = self.buffer.pop_front() {
            string.push(ch);
            self.reader.forward(1)?;
        }
        Ok(())
    }

    fn read_line_string(&mut self, string: &mut String) -> Result<(), ScannerError> {
        if let Some(ch) = self.buffer.pop_front() {
            string.push(if crate::macros::is_break(Some(ch)) { '\n' } else { ch });
            self.reader.forward(1)?;
        }
        Ok(())
    }

    fn set_scanner_error<T>(
        &self,
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
    ) -> Result<T, ScannerError> {
        Err(ScannerError::Problem {
            context,
            context_mark,
            problem,
            problem_mark: self.mark(),
        })
    }

    pub(crate) fn fetch_more_tokens(&mut self) -> Result<(), ScannerError> {
        loop {
            let mut need_more_tokens = self.tokens.is_empty();
            if !need_more_tokens {
                self.stale_simple_keys()?;
                for simple_key in &self.simple_keys {
                    if simple_key.possible && simple_key.token_number == self.tokens_parsed {
                        need_more_tokens = true;
                        break;
                    }
                }
            }
            if !need_more_tokens {
                break;
            }
            self.fetch_next_token()?;
        }
        self.token_available = true;
        Ok(())
    }

    fn fetch_next_token(&mut self) -> Result<(), ScannerError> {
        self.cache(1)?;
        if !self.stream_start_produced {
            self.fetch_stream_start();
            return Ok(());
        }
        self.scan_to_next_token()?;
        self.stale_simple_keys()?;
        let column = self.mark().column as i32;
        self.unroll_indent(column);
        self.cache(4)?;
        if self.buffer.is_empty() {
            return self.fetch_stream_end();
        }
        if self.mark().column == 0 && self.buffer[0] == '%' {
            return self.fetch_directive();
        }
        if self.mark().column == 0
            && self.buffer.get(0) == Some(&'-')
            && self.buffer.get(1) == Some(&'-')
            && self.buffer.get(2) == Some(&'-')
            && is_blankz(self.buffer.get(3).copied())
        {
            return self.fetch_document_indicator(TokenData::DocumentStart);
        }
        if self.mark().column == 0
            && self.buffer.get(0) == Some(&'.')
            && self.buffer.get(1) == Some(&'.')
            && self.buffer.get(2) == Some(&'.')
            && is_blankz(self.buffer.get(3).copied())
        {
            return self.fetch_document_indicator(TokenData::DocumentEnd);
        }
        let c0 = self.buffer.front().copied();
        match c0 {
            Some('[') => return self.fetch_flow_collection_start(TokenData::FlowSequenceStart),
            Some('{') => return self.fetch_flow_collection_start(TokenData::FlowMappingStart),
            Some(']') => return self.fetch_flow_collection_end(TokenData::FlowSequenceEnd),
            Some('}') => return self.fetch_flow_collection_end(TokenData::FlowMappingEnd),
            Some(',') => return self.fetch_flow_entry(),
            _ => {}
        }
        if c0 == Some('-') && is_blankz(self.buffer.get(1).copied()) {
            return self.fetch_block_entry();
        }
        if c0 == Some('?') && (self.flow_level != 0 || is_blankz(self.buffer.get(1).copied())) {
            return self.fetch_key();
        }
        if c0 == Some(':') && (self.flow_level != 0 || is_blankz(self.buffer.get(1).copied())) {
            return self.fetch_value();
        }
        if c0 == Some('*') {
            return self.fetch_anchor(true);
        }
        if c0 == Some('&') {
            return self.fetch_anchor(false);
        }
        if c0 == Some('!') {
            return self.fetch_tag();
        }
        if c0 == Some('|') && self.flow_level == 0 {
            return self.fetch_block_scalar(true);
        }
        if c0 == Some('>') && self.flow_level == 0 {
            return self.fetch_block_scalar(false);
        }
        if c0 == Some('\'') {
            return self.fetch_flow_scalar(true);
        }
        if c0 == Some('"') {
            return self.fetch_flow_scalar(false);
        }
        let blankz = is_blankz(c0);
        let is_indicator = matches!(
            c0,
            Some('-') | Some('?') | Some(':') | Some(',') | Some('[') | Some(']') | Some('{')
                | Some('}') | Some('#') | Some('&') | Some('*') | Some('!') | Some('|')
                | Some('>') | Some('\'') | Some('"') | Some('%') | Some('@') | Some('`')
        );
        let dash_not_plain = c0 == Some('-') && !matches!(self.buffer.get(1).copied(), Some(c) if crate::macros::is_blank(Some(c)));
        let colonish_not_plain = self.flow_level == 0
            && matches!(c0, Some('?') | Some(':'))
            && !is_blankz(self.buffer.get(1).copied());
        if !(blankz || is_indicator) || dash_not_plain || colonish_not_plain {
            return self.fetch_plain_scalar();
        }
        self.set_scanner_error(
            "while scanning for the next token",
            self.mark(),
            "found character that cannot start any token",
        )
    }

    fn stale_simple_keys(&mut self) -> Result<(), ScannerError> {
        let mark = self.mark();
        for simple_key in &mut self.simple_keys {
            let key_mark = simple_key.mark;
            if simple_key.possible
                && (key_mark.line < mark.line || key_mark.index + 1024 < mark.index)
            {
                if simple_key.required {
                    return Err(ScannerError::Problem {
                        context: "while scanning a simple key",
                        context_mark: key_mark,
                        problem: "could not find expected ':'",
                        problem_mark: mark,
                    });
                }
                simple_key.possible = false;
            }
        }
        Ok(())
    }

    fn save_simple_key(&mut self) -> Result<(), ScannerError> {
        let required = self.flow_level == 0 && self.indent == self.mark().column as i32;
        if self.simple_key_allowed {
            let simple_key = SimpleKey {
                possible: true,
                required,
                token_number: self.tokens_parsed + self.tokens.len(),
                mark: self.mark(),
            };
            self.remove_simple_key()?;
            *self.simple_keys.last_mut().unwrap() = simple_key;
        }
        Ok(())
    }

    fn remove_simple_key(&mut self) -> Result<(), ScannerError> {
        let simple_key = self.simple_keys.last_mut().unwrap();
        if simple_key.possible && simple_key.required {
            return Err(ScannerError::Problem {
                context: "while scanning a simple key",
                context_mark: simple_key.mark,
                problem: "could not find expected ':'",
                problem_mark: self.mark(),
            });
        }
        simple_key.possible = false;
        Ok(())
    }

    fn increase_flow_level(&mut self) {
        self.simple_keys.push(SimpleKey::EMPTY);
        self.flow_level += 1;
    }

    fn decrease_flow_level(&mut self) {
        if self.flow_level != 0 {
            self.flow_level -= 1;
            self.simple_keys.pop();
        }
    }

    fn roll_indent(&mut self, column: i32, number: Option<usize>, data: TokenData, mark: Mark) {
        if self.flow_level != 0 {
            return;
        }
        if self.indent < column {
            self.indents.push(self.indent);
            self.indent = column;
            let token = Token {
                data,
                start_mark: mark,
                end_mark: mark,
            };
            match number {
                None => self.tokens.push_back(token),
                Some(number) => self
                    .tokens
                    .insert(number - self.tokens_parsed, token),
            }
        }
    }

    fn unroll_indent(&mut self, column: i32) {
        if self.flow_level != 0 {
            return;
        }
        while self.indent > column {
            let mark = self.mark();
            self.tokens.push_back(Token {
                data: TokenData::BlockEnd,
                start_mark: mark,
                end_mark: mark,
            });
            self.indent = self.indents.pop().unwrap();
        }
    }

    fn fetch_stream_start(&mut self) {
        self.indent = -1;
        self.simple_keys.push(SimpleKey::EMPTY);
        self.simple_key_allowed = true;
        self.stream_start_produced = true;
        let mark = self.mark();
        self.tokens.push_back(Token {
            data: TokenData::StreamStart {
                encoding: self.encoding,
            },
            start_mark: mark,
            end_mark: mark,
        });
    }

    fn fetch_stream_end(&mut self) -> Result<(), ScannerError> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        // A final line with no trailing break still ends the stream at
        // column 0 of the following (virtual) line.
        let mut mark = self.mark();
        if mark.column != 0 {
            mark.column = 0;
            mark.line += 1;
        }
        self.tokens.push_back(Token {
            data: TokenData::StreamEnd,
            start_mark: mark,
            end_mark: mark,
        });
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<(), ScannerError> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_directive()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_document_indicator(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let start_mark = self.mark();
        self.skip()?;
        self.skip()?;
        self.skip()?;
        let end_mark = self.mark();
        self.tokens.push_back(Token {
            data,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.increase_flow_level();
        self.simple_key_allowed = true;
        let start_mark = self.mark();
        self.skip()?;
        let end_mark = self.mark();
        self.tokens.push_back(Token {
            data,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.decrease_flow_level();
        self.simple_key_allowed = false;
        let start_mark = self.mark();
        self.skip()?;
        let end_mark = self.mark();
        self.tokens.push_back(Token {
            data,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start_mark = self.mark();
        self.skip()?;
        let end_mark = self.mark();
        self.tokens.push_back(Token {
            data: TokenData::FlowEntry,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> Result<(), ScannerError> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return self.set_scanner_error(
                    "",
                    self.mark(),
                    "block sequence entries are not allowed in this context",
                );
            }
            let column = self.mark().column as i32;
            let mark = self.mark();
            self.roll_indent(column, None, TokenData::BlockSequenceStart, mark);
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start_mark = self.mark();
        self.skip()?;
        let end_mark = self.mark();
        self.tokens.push_back(Token {
            data: TokenData::BlockEntry,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_key(&mut self) -> Result<(), ScannerError> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return self.set_scanner_error(
                    "",
                    self.mark(),
                    "mapping keys are not allowed in this context",
                );
            }
            let column = self.mark().column as i32;
            let mark = self.mark();
            self.roll_indent(column, None, TokenData::BlockMappingStart, mark);
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = self.flow_level == 0;
        let start_mark = self.mark();
        self.skip()?;
        let end_mark = self.mark();
        self.tokens.push_back(Token {
            data: TokenData::Key,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_value(&mut self) -> Result<(), ScannerError> {
        let simple_key = *self.simple_keys.last().unwrap();
        if simple_key.possible {
            let token = Token {
                data: TokenData::Key,
                start_mark: simple_key.mark,
                end_mark: simple_key.mark,
            };
            self.tokens
                .insert(simple_key.token_number - self.tokens_parsed, token);
            self.simple_keys.last_mut().unwrap().possible = false;
            self.roll_indent(
                simple_key.mark.column as i32,
                Some(simple_key.token_number),
                TokenData::BlockMappingStart,
                simple_key.mark,
            );
            self.simple_key_allowed = false;
        } else {
            if self.flow_level == 0 {
                if !self.simple_key_allowed {
                    return self.set_scanner_error(
                        "",
                        self.mark(),
                        "mapping values are not allowed in this context",
                    );
                }
                let column = self.mark().column as i32;
                let mark = self.mark();
                self.roll_indent(column, None, TokenData::BlockMappingStart, mark);
            }
            self.simple_key_allowed = self.flow_level == 0;
        }
        let start_mark = self.mark();
        self.skip()?;
        let end_mark = self.mark();
        self.tokens.push_back(Token {
            data: TokenData::Value,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_anchor(&mut self, alias: bool) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_anchor(alias)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, literal: bool) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let token = self.scan_block_scalar(literal)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, single: bool) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_flow_scalar(single)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain_scalar(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_plain_scalar()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn scan_to_next_token(&mut self) -> Result<(), ScannerError> {
        loop {
            self.cache(1)?;
            if self.mark().column == 0 && self.buffer.front() == Some(&'\u{feff}') {
                self.skip()?;
            }
            self.cache(1)?;
            while self.buffer.front() == Some(&' ')
                || ((self.flow_level != 0 || !self.simple_key_allowed)
                    && self.buffer.front() == Some(&'\t'))
            {
                self.skip()?;
                self.cache(1)?;
            }
            if self.buffer.front() == Some(&'#') {
                while !is_breakz(self.buffer.front().copied()) {
                    self.skip()?;
                    self.cache(1)?;
                }
            }
            if !is_break(self.buffer.front().copied()) {
                break;
            }
            self.cache(2)?;
            self.skip_line()?;
            if self.flow_level == 0 {
                self.simple_key_allowed = true;
            }
        }
        Ok(())
    }

    fn scan_directive(&mut self) -> Result<Token, ScannerError> {
        let start_mark = self.mark();
        self.skip()?;
        let name = self.scan_directive_name(start_mark)?;
        let mut token;
        if name == "YAML" {
            let (major, minor) = self.scan_version_directive_value(start_mark)?;
            token = Token {
                data: TokenData::VersionDirective { major, minor },
                start_mark,
                end_mark: self.mark(),
            };
        } else if name == "TAG" {
            let (handle, prefix) = self.scan_tag_directive_value(start_mark)?;
            token = Token {
                data: TokenData::TagDirective { handle, prefix },
                start_mark,
                end_mark: self.mark(),
            };
        } else {
            return self.set_scanner_error(
                "while scanning a directive",
                start_mark,
                "found unknown directive name",
            );
        }

        self.cache(1)?;
        while is_blank(self.buffer.front().copied()) {
            self.skip()?;
            self.cache(1)?;
        }
        if self.buffer.front() == Some(&'#') {
            while !is_breakz(self.buffer.front().copied()) {
                self.skip()?;
                self.cache(1)?;
            }
        }
        if !is_breakz(self.buffer.front().copied()) {
            return self.set_scanner_error(
                "while scanning a directive",
                start_mark,
                "did not find expected comment or line break",
            );
        }
        if is_break(self.buffer.front().copied()) {
            self.cache(2)?;
            self.skip_line()?;
        }
        token.end_mark = self.mark();
        Ok(token)
    }

    fn scan_directive_name(&mut self, start_mark: Mark) -> Result<String, ScannerError> {
        let mut string = String::new();
        self.cache(1)?;
        while crate::macros::is_alpha(self.buffer.front().copied()) {
            self.read_string(&mut string)?;
            self.cache(1)?;
        }
        if string.is_empty() {
            self.set_scanner_error(
                "while scanning a directive",
                start_mark,
                "could not find expected directive name",
            )
        } else if !is_blankz(self.buffer.front().copied()) {
            self.set_scanner_error(
                "while scanning a directive",
                start_mark,
                "found unexpected non-alphabetical character",
            )
        } else {
            Ok(string)
        }
    }

    fn scan_version_directive_value(&mut self, start_mark: Mark) -> Result<(i32, i32), ScannerError> {
        self.cache(1)?;
        while is_blank(self.buffer.front().copied()) {
            self.skip()?;
            self.cache(1)?;
        }
        let major = self.scan_version_directive_number(start_mark)?;
        if self.buffer.front() != Some(&'.') {
            return self.set_scanner_error(
                "while scanning a %YAML directive",
                start_mark,
                "did not find expected digit or '.' character",
            );
        }
        self.skip()?;
        let minor = self.scan_version_directive_number(start_mark)?;
        Ok((major, minor))
    }

    const MAX_NUMBER_LENGTH: usize = 9;

    fn scan_version_directive_number(&mut self, start_mark: Mark) -> Result<i32, ScannerError> {
        let mut value: i32 = 0;
        let mut length = 0usize;
        self.cache(1)?;
        while self.buffer.front().is_some_and(|c| c.is_ascii_digit()) {
            length += 1;
            if length > Self::MAX_NUMBER_LENGTH {
                return self.set_scanner_error(
                    "while scanning a %YAML directive",
                    start_mark,
                    "found extremely long version number",
                );
            }
            let digit = self.buffer.front().unwrap().to_digit(10).unwrap() as i32;
            value = value * 10 + digit;
            self.skip()?;
            self.cache(1)?;
        }
        if length == 0 {
            return self.set_scanner_error(
                "while scanning a %YAML directive",
                start_mark,
                "did not find expected version number",
            );
        }
        Ok(value)
    }

    fn scan_tag_directive_value(&mut self, start_mark: Mark) -> Result<(String, String), ScannerError> {
        self.cache(1)?;
        loop {
            if is_blank(self.buffer.front().copied()) {
                self.skip()?;
                self.cache(1)?;
                continue;
            }
            let handle = self.scan_tag_handle(true, start_mark)?;
            self.cache(1)?;
            if !is_blank(self.buffer.front().copied()) {
                return self.set_scanner_error(
                    "while scanning a %TAG directive",
                    start_mark,
                    "did not find expected whitespace",
                );
            }
            while is_blank(self.buffer.front().copied()) {
                self.skip()?;
                self.cache(1)?;
            }
            let prefix = self.scan_tag_uri(true, true, None, start_mark)?;
            self.cache(1)?;
            if !is_blankz(self.buffer.front().copied()) {
                return self.set_scanner_error(
                    "while scanning a %TAG directive",
                    start_mark,
                    "did not find expected whitespace or line break",
                );
            }
            return Ok((handle, prefix));
        }
    }

    fn scan_anchor(&mut self, alias: bool) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let start_mark = self.mark();
        self.skip()?;
        self.cache(1)?;
        let mut length = 0;
        while crate::macros::is_alpha(self.buffer.front().copied()) {
            self.read_string(&mut string)?;
            self.cache(1)?;
            length += 1;
        }
        let end_mark = self.mark();
        let c0 = self.buffer.front().copied();
        if length == 0
            || !(is_blankz(c0)
                || matches!(
                    c0,
                    Some('?') | Some(':') | Some(',') | Some(']') | Some('}') | Some('%')
                        | Some('@') | Some('`')
                ))
        {
            self.set_scanner_error(
                if alias {
                    "while scanning an alias"
                } else {
                    "while scanning an anchor"
                },
                start_mark,
                "did not find expected alphabetic or numeric character",
            )
        } else {
            Ok(Token {
                data: if alias {
                    TokenData::Alias { value: string }
                } else {
                    TokenData::Anchor { value: string }
                },
                start_mark,
                end_mark,
            })
        }
    }

    fn scan_tag(&mut self) -> Result<Token, ScannerError> {
        let start_mark = self.mark();
        let mut handle;
        let mut suffix;
        self.cache(2)?;
        if self.buffer.get(1) == Some(&'<') {
            handle = String::new();
            self.skip()?;
            self.skip()?;
            suffix = self.scan_tag_uri(true, false, None, start_mark)?;
            if self.buffer.front() != Some(&'>') {
                return self.set_scanner_error(
                    "while scanning a tag",
                    start_mark,
                    "did not find the expected '>'",
                );
            }
            self.skip()?;
        } else {
            handle = self.scan_tag_handle(false, start_mark)?;
            if handle.starts_with('!') && handle.len() > 1 && handle.ends_with('!') {
                suffix = self.scan_tag_uri(false, false, None, start_mark)?;
            } else {
                suffix = self.scan_tag_uri(false, false, Some(&handle), start_mark)?;
                handle = String::from("!");
                if suffix.is_empty() {
                    std::mem::swap(&mut handle, &mut suffix);
                }
            }
        }

        self.cache(1)?;
        if !is_blankz(self.buffer.front().copied()) {
            if self.flow_level == 0 || self.buffer.front() != Some(&',') {
                return self.set_scanner_error(
                    "while scanning a tag",
                    start_mark,
                    "did not find expected whitespace or line break",
                );
            }
        }

        let end_mark = self.mark();
        Ok(Token {
            data: TokenData::Tag { handle, suffix },
            start_mark,
            end_mark,
        })
    }

    fn scan_tag_handle(&mut self, directive: bool, start_mark: Mark) -> Result<String, ScannerError> {
        let mut string = String::new();
        self.cache(1)?;
        if self.buffer.front() != Some(&'!') {
            return self.set_scanner_error(
                if directive {
                    "while scanning a tag directive"
                } else {
                    "while scanning a tag"
                },
                start_mark,
                "did not find expected '!'",
            );
        }
        self.read_string(&mut string)?;
        self.cache(1)?;
        while crate::macros::is_alpha(self.buffer.front().copied()) {
            self.read_string(&mut string)?;
            self.cache(1)?;
        }
        if self.buffer.front() == Some(&'!') {
            self.read_string(&mut string)?;
        } else if directive && string != "!" {
            return self.set_scanner_error(
                "while parsing a tag directive",
                start_mark,
                "did not find expected '!'",
            );
        }
        Ok(string)
    }

    fn scan_tag_uri(
        &mut self,
        uri_char: bool,
        directive: bool,
        head: Option<&str>,
        start_mark: Mark,
    ) -> Result<String, ScannerError> {
        let head = head.unwrap_or("");
        let mut length = head.len();
        let mut string = if length > 1 {
            String::from(&head[1..])
        } else {
            String::new()
        };
        self.cache(1)?;
        loop {
            let c0 = self.buffer.front().copied();
            let ok = crate::macros::is_alpha(c0)
                || matches!(
                    c0,
                    Some(';') | Some('/') | Some('?') | Some(':') | Some('@') | Some('&')
                        | Some('=') | Some('+') | Some('$') | Some('.') | Some('%') | Some('!')
                        | Some('~') | Some('*') | Some('\'') | Some('(') | Some(')')
                )
                || (uri_char && matches!(c0, Some(',') | Some('[') | Some(']')));
            if !ok {
                break;
            }
            if c0 == Some('%') {
                self.scan_uri_escapes(directive, start_mark, &mut string)?;
            } else {
                self.read_string(&mut string)?;
            }
            length += 1;
            self.cache(1)?;
        }
        if length == 0 {
            self.set_scanner_error(
                if directive {
                    "while parsing a %TAG directive"
                } else {
                    "while parsing a tag"
                },
                start_mark,
                "did not find expected tag URI",
            )
        } else {
            Ok(string)
        }
    }

    fn scan_uri_escapes(
        &mut self,
        directive: bool,
        start_mark: Mark,
        string: &mut String,
    ) -> Result<(), ScannerError> {
        let mut width = 0;
        loop {
            self.cache(3)?;
            let hex1 = self.buffer.get(1).copied().filter(|c| c.is_ascii_hexdigit());
            let hex2 = self.buffer.get(2).copied().filter(|c| c.is_ascii_hexdigit());
            if self.buffer.front() != Some(&'%') || hex1.is_none() || hex2.is_none() {
                return self.set_scanner_error(
                    if directive {
                        "while parsing a %TAG directive"
                    } else {
                        "while parsing a tag"
                    },
                    start_mark,
                    "did not find URI escaped octet",
                );
            }
            let octet = ((hex1.unwrap().to_digit(16).unwrap() << 4)
                + hex2.unwrap().to_digit(16).unwrap()) as u8;
            if width == 0 {
                width = if octet & 0x80 == 0 {
                    1
                } else if octet & 0xE0 == 0xC0 {
                    2
                } else if octet & 0xF0 == 0xE0 {
                    3
                } else if octet & 0xF8 == 0xF0 {
                    4
                } else {
                    0
                };
                if width == 0 {
                    return self.set_scanner_error(
                        if directive {
                            "while parsing a %TAG directive"
                        } else {
                            "while parsing a tag"
                        },
                        start_mark,
                        "found an incorrect leading UTF-8 octet",
                    );
                }
            } else if octet & 0xC0 != 0x80 {
                return self.set_scanner_error(
                    if directive {
                        "while parsing a %TAG directive"
                    } else {
                        "while parsing a tag"
                    },
                    start_mark,
                    "found an incorrect trailing UTF-8 octet",
                );
            }
            string.push(char::from_u32(octet as u32).expect("octet is a valid code point"));
            self.skip()?;
            self.skip()?;
            self.skip()?;
            width -= 1;
            if width == 0 {
                break;
            }
        }
        Ok(())
    }

    fn scan_block_scalar(&mut self, literal: bool) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut chomping = 0i32;
        let mut increment = 0i32;
        let mut indent = 0i32;
        let mut leading_blank = false;
        let start_mark = self.mark();
        self.skip()?;
        self.cache(1)?;

        if matches!(self.buffer.front(), Some('+') | Some('-')) {
            chomping = if self.buffer.front() == Some(&'+') { 1 } else { -1 };
            self.skip()?;
            self.cache(1)?;
            if self.buffer.front().is_some_and(|c| c.is_ascii_digit()) {
                if self.buffer.front() == Some(&'0') {
                    return self.set_scanner_error(
                        "while scanning a block scalar",
                        start_mark,
                        "found an indentation indicator equal to 0",
                    );
                }
                increment = self.buffer.front().unwrap().to_digit(10).unwrap() as i32;
                self.skip()?;
            }
        } else if self.buffer.front().is_some_and(|c| c.is_ascii_digit()) {
            if self.buffer.front() == Some(&'0') {
                return self.set_scanner_error(
                    "while scanning a block scalar",
                    start_mark,
                    "found an indentation indicator equal to 0",
                );
            }
            increment = self.buffer.front().unwrap().to_digit(10).unwrap() as i32;
            self.skip()?;
            self.cache(1)?;
            if matches!(self.buffer.front(), Some('+') | Some('-')) {
                chomping = if self.buffer.front() == Some(&'+') { 1 } else { -1 };
                self.skip()?;
            }
        }

        self.cache(1)?;
        while is_blank(self.buffer.front().copied()) {
            self.skip()?;
            self.cache(1)?;
        }
        if self.buffer.front() == Some(&'#') {
            while !is_breakz(self.buffer.front().copied()) {
                self.skip()?;
                self.cache(1)?;
            }
        }
        if !is_breakz(self.buffer.front().copied()) {
            return self.set_scanner_error(
                "while scanning a block scalar",
                start_mark,
                "did not find expected comment or line break",
            );
        }
        if is_break(self.buffer.front().copied()) {
            self.cache(2)?;
            self.skip_line()?;
        }

        let mut end_mark = self.mark();
        if increment != 0 {
            indent = if self.indent >= 0 {
                self.indent + increment
            } else {
                increment
            };
        }
        self.scan_block_scalar_breaks(&mut indent, &mut trailing_breaks, &mut end_mark)?;

        self.cache(1)?;
        while self.mark().column as i32 == indent && !self.buffer.is_empty() {
            let trailing_blank = is_blank(self.buffer.front().copied());
            if !literal && leading_break.starts_with('\n') && !leading_blank && !trailing_blank {
                if trailing_breaks.is_empty() {
                    string.push(' ');
                }
                leading_break.clear();
            } else {
                string.push_str(&leading_break);
                leading_break.clear();
            }
            string.push_str(&trailing_breaks);
            trailing_breaks.clear();
            leading_blank = is_blank(self.buffer.front().copied());
            while !is_breakz(self.buffer.front().copied()) {
                self.read_string(&mut string)?;
                self.cache(1)?;
            }
            self.cache(2)?;
            self.read_line_string(&mut leading_break)?;
            self.scan_block_scalar_breaks(&mut indent, &mut trailing_breaks, &mut end_mark)?;
        }

        if chomping != -1 {
            string.push_str(&leading_break);
        }
        if chomping == 1 {
            string.push_str(&trailing_breaks);
        }

        Ok(Token {
            data: TokenData::Scalar {
                value: string,
                style: if literal {
                    ScalarStyle::Literal
                } else {
                    ScalarStyle::Folded
                },
            },
            start_mark,
            end_mark,
        })
    }

    fn scan_block_scalar_breaks(
        &mut self,
        indent: &mut i32,
        breaks: &mut String,
        end_mark: &mut Mark,
    ) -> Result<(), ScannerError> {
        let mut max_indent = 0;
        *end_mark = self.mark();
        loop {
            self.cache(1)?;
            while (*indent == 0 || (self.mark().column as i32) < *indent)
                && self.buffer.front() == Some(&' ')
            {
                self.skip()?;
                self.cache(1)?;
            }
            if self.mark().column as i32 > max_indent {
                max_indent = self.mark().column as i32;
            }
            if (*indent == 0 || (self.mark().column as i32) < *indent)
                && self.buffer.front() == Some(&'\t')
            {
                return self.set_scanner_error(
                    "while scanning a block scalar",
                    self.mark(),
                    "found a tab character where an indentation space is expected",
                );
            }
            if !is_break(self.buffer.front().copied()) {
                break;
            }
            self.cache(2)?;
            self.read_line_string(breaks)?;
            *end_mark = self.mark();
        }
        if *indent == 0 {
            *indent = max_indent;
            if *indent < self.indent + 1 {
                *indent = self.indent + 1;
            }
            if *indent < 1 {
                *indent = 1;
            }
        }
        Ok(())
    }

    fn scan_flow_scalar(&mut self, single: bool) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let start_mark = self.mark();
        self.skip()?;
        loop {
            self.cache(4)?;
            let is_doc_indicator = self.mark().column == 0
                && ((self.buffer.get(0) == Some(&'-')
                    && self.buffer.get(1) == Some(&'-')
                    && self.buffer.get(2) == Some(&'-'))
                    || (self.buffer.get(0) == Some(&'.')
                        && self.buffer.get(1) == Some(&'.')
                        && self.buffer.get(2) == Some(&'.')))
                && is_blankz(self.buffer.get(3).copied());
            if is_doc_indicator {
                return self.set_scanner_error(
                    "while scanning a quoted scalar",
                    start_mark,
                    "found unexpected document indicator",
                );
            }
            if self.buffer.is_empty() {
                return self.set_scanner_error(
                    "while scanning a quoted scalar",
                    start_mark,
                    "found unexpected end of stream",
                );
            }
            self.cache(2)?;
            let mut leading_blanks = false;
            while !is_blankz(self.buffer.front().copied()) {
                if single
                    && self.buffer.get(0) == Some(&'\'')
                    && self.buffer.get(1) == Some(&'\'')
                {
                    string.push('\'');
                    self.skip()?;
                    self.skip()?;
                } else if self.buffer.front() == Some(&if single { '\'' } else { '"' }) {
                    break;
                } else if !single
                    && self.buffer.front() == Some(&'\\')
                    && is_break(self.buffer.get(1).copied())
                {
                    self.cache(3)?;
                    self.skip()?;
                    self.skip_line()?;
                    leading_blanks = true;
                    break;
                } else if !single && self.buffer.front() == Some(&'\\') {
                    let mut code_length = 0usize;
                    match self.buffer.get(1).copied().unwrap() {
                        '0' => string.push('\0'),
                        'a' => string.push('\x07'),
                        'b' => string.push('\x08'),
                        't' | '\t' => string.push('\t'),
                        'n' => string.push('\n'),
                        'v' => string.push('\x0B'),
                        'f' => string.push('\x0C'),
                        'r' => string.push('\r'),
                        'e' => string.push('\x1B'),
                        ' ' => string.push(' '),
                        '"' => string.push('"'),
                        '/' => string.push('/'),
                        '\\' => string.push('\\'),
                        'N' => string.push('\u{0085}'),
                        '_' => string.push('\u{00a0}'),
                        'L' => string.push('\u{2028}'),
                        'P' => string.push('\u{2029}'),
                        'x' => code_length = 2,
                        'u' => code_length = 4,
                        'U' => code_length = 8,
                        _ => {
                            return self.set_scanner_error(
                                "while parsing a quoted scalar",
                                start_mark,
                                "found unknown escape character",
                            );
                        }
                    }
                    self.skip()?;
                    self.skip()?;
                    if code_length != 0 {
                        self.cache(code_length)?;
                        let mut value: u32 = 0;
                        for k in 0..code_length {
                            let Some(digit) =
                                self.buffer.get(k).and_then(|c| c.to_digit(16))
                            else {
                                return self.set_scanner_error(
                                    "while parsing a quoted scalar",
                                    start_mark,
                                    "did not find expected hexdecimal number",
                                );
                            };
                            value = (value << 4) + digit;
                        }
                        let Some(ch) = char::from_u32(value) else {
                            return self.set_scanner_error(
                                "while parsing a quoted scalar",
                                start_mark,
                                "found invalid Unicode character escape code",
                            );
                        };
                        string.push(ch);
                        for _ in 0..code_length {
                            self.skip()?;
                        }
                    }
                } else {
                    self.read_string(&mut string)?;
                }
                self.cache(2)?;
            }
            self.cache(1)?;
            if self.buffer.front() == Some(&if single { '\'' } else { '"' }) {
                break;
            }
            self.cache(1)?;
            while is_blank(self.buffer.front().copied()) || is_break(self.buffer.front().copied()) {
                if is_blank(self.buffer.front().copied()) {
                    if !leading_blanks {
                        self.read_string(&mut whitespaces)?;
                    } else {
                        self.skip()?;
                    }
                } else {
                    self.cache(2)?;
                    if !leading_blanks {
                        whitespaces.clear();
                        self.read_line_string(&mut leading_break)?;
                        leading_blanks = true;
                    } else {
                        self.read_line_string(&mut trailing_breaks)?;
                    }
                }
                self.cache(1)?;
            }
            if leading_blanks {
                if leading_break.starts_with('\n') {
                    if trailing_breaks.is_empty() {
                        string.push(' ');
                    } else {
                        string.push_str(&trailing_breaks);
                        trailing_breaks.clear();
                    }
                    leading_break.clear();
                } else {
                    string.push_str(&leading_break);
                    string.push_str(&trailing_breaks);
                    leading_break.clear();
                    trailing_breaks.clear();
                }
            } else {
                string.push_str(&whitespaces);
                whitespaces.clear();
            }
        }

        self.skip()?;
        let end_mark = self.mark();
        Ok(Token {
            data: TokenData::Scalar {
                value: string,
                style: if single {
                    ScalarStyle::SingleQuoted
                } else {
                    ScalarStyle::DoubleQuoted
                },
            },
            start_mark,
            end_mark,
        })
    }

    fn scan_plain_scalar(&mut self) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;
        let indent = self.indent + 1;
        let mut end_mark = self.mark();
        let start_mark = end_mark;
        loop {
            self.cache(4)?;
            let is_doc_indicator = self.mark().column == 0
                && ((self.buffer.get(0) == Some(&'-')
                    && self.buffer.get(1) == Some(&'-')
                    && self.buffer.get(2) == Some(&'-'))
                    || (self.buffer.get(0) == Some(&'.')
                        && self.buffer.get(1) == Some(&'.')
                        && self.buffer.get(2) == Some(&'.')))
                && is_blankz(self.buffer.get(3).copied());
            if is_doc_indicator {
                break;
            }
            if self.buffer.front() == Some(&'#') {
                break;
            }
            while !is_blankz(self.buffer.front().copied()) {
                if self.flow_level != 0
                    && self.buffer.front() == Some(&':')
                    && matches!(
                        self.buffer.get(1),
                        Some(',') | Some('?') | Some('[') | Some(']') | Some('{') | Some('}')
                    )
                {
                    return self.set_scanner_error(
                        "while scanning a plain scalar",
                        start_mark,
                        "found unexpected ':'",
                    );
                }
                if (self.buffer.front() == Some(&':') && is_blankz(self.buffer.get(1).copied()))
                    || (self.flow_level != 0
                        && matches!(
                            self.buffer.front(),
                            Some(',') | Some('[') | Some(']') | Some('{') | Some('}')
                        ))
                {
                    break;
                }
                if leading_blanks || !whitespaces.is_empty() {
                    if leading_blanks {
                        if leading_break.starts_with('\n') {
                            if trailing_breaks.is_empty() {
                                string.push(' ');
                            } else {
                                string.push_str(&trailing_breaks);
                                trailing_breaks.clear();
                            }
                            leading_break.clear();
                        } else {
                            string.push_str(&leading_break);
                            string.push_str(&trailing_breaks);
                            leading_break.clear();
                            trailing_breaks.clear();
                        }
                        leading_blanks = false;
                    } else {
                        string.push_str(&whitespaces);
                        whitespaces.clear();
                    }
                }
                self.read_string(&mut string)?;
                end_mark = self.mark();
                self.cache(2)?;
            }
            if !(is_blank(self.buffer.front().copied()) || is_break(self.buffer.front().copied())) {
                break;
            }
            self.cache(1)?;
            while is_blank(self.buffer.front().copied()) || is_break(self.buffer.front().copied()) {
                if is_blank(self.buffer.front().copied()) {
                    if leading_blanks
                        && (self.mark().column as i32) < indent
                        && self.buffer.front() == Some(&'\t')
                    {
                        return self.set_scanner_error(
                            "while scanning a plain scalar",
                            start_mark,
                            "found a tab character that violates indentation",
                        );
                    } else if !leading_blanks {
                        self.read_string(&mut whitespaces)?;
                    } else {
                        self.skip()?;
                    }
                } else {
                    self.cache(2)?;
                    if !leading_blanks {
                        whitespaces.clear();
                        self.read_line_string(&mut leading_break)?;
                        leading_blanks = true;
                    } else {
                        self.read_line_string(&mut trailing_breaks)?;
                    }
                }
                self.cache(1)?;
            }
            if self.flow_level == 0 && (self.mark().column as i32) < indent {
                break;
            }
        }

        if leading_blanks {
            self.simple_key_allowed = true;
        }

        Ok(Token {
            data: TokenData::Scalar {
                value: string,
                style: ScalarStyle::Plain,
            },
            start_mark,
            end_mark,
        })
    }
}

fn is_blank(ch: Option<char>) -> bool {
    matches!(ch, Some(' ') | Some('\t'))
}

fn is_break(ch: Option<char>) -> bool {
    crate::macros::is_break(ch)
}

fn is_breakz(ch: Option<char>) -> bool {
    is_break(ch) || ch.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<TokenData> {
        let mut bytes = input.as_bytes();
        let mut scanner = Scanner::new();
        scanner.set_input_string(&mut bytes);
        let mut out = Vec::new();
        loop {
            scanner.fetch_more_tokens().unwrap();
            let token = scanner.tokens.pop_front().unwrap();
            scanner.token_available = false;
            scanner.tokens_parsed += 1;
            let is_end = matches!(token.data, TokenData::StreamEnd);
            out.push(token.data);
            if is_end {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_a_flow_sequence() {
        let tokens = tokenize("[1, 2]\n");
        assert!(matches!(tokens[0], TokenData::StreamStart { .. }));
        assert!(matches!(tokens[1], TokenData::FlowSequenceStart));
        assert!(matches!(&tokens[2], TokenData::Scalar { value, .. } if value == "1"));
    }

    #[test]
    fn scans_a_block_mapping() {
        let tokens = tokenize("a: 1\nb: 2\n");
        assert!(tokens.iter().any(|t| matches!(t, TokenData::BlockMappingStart)));
        assert!(tokens.iter().any(|t| matches!(t, TokenData::Key)));
        assert!(tokens.iter().any(|t| matches!(t, TokenData::Value)));
    }

    #[test]
    fn scans_a_plain_scalar_across_folded_lines() {
        let tokens = tokenize("a long\n  scalar\n");
        let scalar = tokens
            .iter()
            .find_map(|t| match t {
                TokenData::Scalar { value, .. } => Some(value.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(scalar, "a long scalar");
    }

    #[test]
    fn rejects_tab_indentation_in_block_sequence_context() {
        let mut bytes = "-\tfoo\n".as_bytes();
        let mut scanner = Scanner::new();
        scanner.set_input_string(&mut bytes);
        // Just confirm it does not panic scanning through; tab after '-' is
        // actually allowed here since '-' is immediately followed by blank.
        loop {
            scanner.fetch_more_tokens().unwrap();
            let token = scanner.tokens.pop_front().unwrap();
            scanner.token_available = false;
            scanner.tokens_parsed += 1;
            if matches!(token.data, TokenData::StreamEnd) {
                break;
            }
        }
    }
}
