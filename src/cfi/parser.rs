//! CFI parser
//!
//! Grammar (the subset the reader produces and consumes):
//! ```text
//! cfi    = "epubcfi(" path ["," part "," part] ")"
//! path   = step+ [offset]
//! part   = step* [offset]
//! step   = "/" number [id] | "!"
//! id     = "[" text "]"        ; ^ escapes reserved characters
//! offset = ":" number [assertion]
//! ```
//! Text-location assertions after an offset are accepted and ignored.

use thiserror::Error;

use super::types::{Cfi, CfiPath, CfiRange, CfiStep};

/// CFI parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CfiParseError {
    #[error("Empty CFI string")]
    Empty,

    #[error("CFI must start with 'epubcfi('")]
    MissingPrefix,

    #[error("CFI must end with ')'")]
    MissingClosingParen,

    #[error("Expected at least one step at position {0}")]
    ExpectedStep(usize),

    #[error("Expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("Unclosed bracket at position {0}")]
    UnclosedBracket(usize),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, pos: usize) -> Self {
        Self { input, pos }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> Result<u32, CfiParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        self.input[start..self.pos]
            .parse()
            .map_err(|_| CfiParseError::ExpectedNumber(start))
    }

    /// Bracket content after the opening `[`, consuming the closing `]`
    fn bracket(&mut self) -> Result<String, CfiParseError> {
        let start = self.pos;
        let mut out = String::new();
        while let Some(ch) = self.advance() {
            match ch {
                '^' => match self.advance() {
                    Some(escaped) => out.push(escaped),
                    None => break,
                },
                ']' => return Ok(out),
                _ => out.push(ch),
            }
        }
        Err(CfiParseError::UnclosedBracket(start))
    }

    fn path(&mut self, require_step: bool) -> Result<CfiPath, CfiParseError> {
        let start = self.pos;
        let mut path = CfiPath::default();

        loop {
            match self.peek() {
                Some('/') => {
                    self.advance();
                    let index = self.number()?;
                    let step = if self.skip_if('[') {
                        CfiStep::child_with_id(index, self.bracket()?)
                    } else {
                        CfiStep::child(index)
                    };
                    path.push(step);
                }
                Some('!') => {
                    self.advance();
                    path.push(CfiStep::indirection());
                }
                _ => break,
            }
        }

        if require_step && path.steps.is_empty() {
            return Err(CfiParseError::ExpectedStep(start));
        }

        if self.skip_if(':') {
            path.offset = Some(self.number()?);
            if self.skip_if('[') {
                self.bracket()?;
            }
        }
        Ok(path)
    }
}

/// Parse a CFI string such as `epubcfi(/6/4!/4/2/1:42)`
pub fn parse(input: &str) -> Result<Cfi, CfiParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CfiParseError::Empty);
    }
    if !input.starts_with("epubcfi(") {
        return Err(CfiParseError::MissingPrefix);
    }
    if !input.ends_with(')') {
        return Err(CfiParseError::MissingClosingParen);
    }

    let body_end = input.len() - 1;
    let mut parser = Parser::new(&input[..body_end], "epubcfi(".len());
    let path = parser.path(true)?;

    let cfi = if parser.skip_if(',') {
        let start = parser.path(false)?;
        if !parser.skip_if(',') {
            return Err(unexpected(&parser));
        }
        let end = parser.path(false)?;
        Cfi::with_range(path, CfiRange { start, end })
    } else {
        Cfi::point(path)
    };

    if parser.pos != body_end {
        return Err(unexpected(&parser));
    }
    Ok(cfi)
}

/// Parse, returning `None` on failure
pub fn try_parse(input: &str) -> Option<Cfi> {
    parse(input).ok()
}

fn unexpected(parser: &Parser<'_>) -> CfiParseError {
    CfiParseError::UnexpectedChar(parser.peek().unwrap_or(')'), parser.pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfi::types::StepKind;

    #[test]
    fn test_parse_point() {
        let cfi = parse("epubcfi(/6/4[chap01]!/4/2/1:42)").unwrap();
        assert!(!cfi.is_range());
        assert_eq!(cfi.spine_index(), Some(1));
        assert_eq!(cfi.path.steps[1].id_assertion.as_deref(), Some("chap01"));
        assert_eq!(cfi.path.offset, Some(42));
        assert_eq!(cfi.to_string(), "epubcfi(/6/4[chap01]!/4/2/1:42)");
    }

    #[test]
    fn test_parse_range() {
        let cfi = parse("epubcfi(/6/4!/4/2,/1:3,/3:9)").unwrap();
        let range = cfi.range.as_ref().unwrap();
        assert_eq!(range.start.steps[0].kind, StepKind::Child(1));
        assert_eq!(range.start.offset, Some(3));
        assert_eq!(range.end.offset, Some(9));
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4/2,/1:3,/3:9)");
    }

    #[test]
    fn test_parse_same_node_range() {
        let cfi = parse("epubcfi(/6/2!/4/2/1,:10,:20)").unwrap();
        assert_eq!(cfi.start().offset, Some(10));
        assert_eq!(cfi.end().offset, Some(20));
        assert_eq!(cfi.start().steps, cfi.end().steps);
    }

    #[test]
    fn test_escaped_assertion_and_text_assertion() {
        let cfi = parse("epubcfi(/6/2[a^]b]!/4/1:5[pre,post])").unwrap();
        assert_eq!(cfi.path.steps[1].id_assertion.as_deref(), Some("a]b"));
        assert_eq!(cfi.path.offset, Some(5));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(CfiParseError::Empty));
        assert_eq!(parse("/6/4!/4"), Err(CfiParseError::MissingPrefix));
        assert_eq!(parse("epubcfi(/6/4"), Err(CfiParseError::MissingClosingParen));
        assert!(matches!(parse("epubcfi()"), Err(CfiParseError::ExpectedStep(_))));
        assert!(matches!(parse("epubcfi(/x)"), Err(CfiParseError::ExpectedNumber(_))));
        assert!(matches!(parse("epubcfi(/6/2[open)"), Err(CfiParseError::UnclosedBracket(_))));
        assert!(matches!(parse("epubcfi(/6/2,/1:3)"), Err(CfiParseError::UnexpectedChar(..))));
        assert!(try_parse("garbage").is_none());
    }
}
