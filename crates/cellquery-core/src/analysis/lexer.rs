//! Just enough of a Rhai lexer to find identifiers.
//!
//! Comments and literal contents are skipped. Interpolations inside
//! backtick strings are lexed as if they were parenthesized expressions.

use super::AnalysisError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Punct,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset in the source.
    pub offset: usize,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }

    /// True for tokens after which a `|` is a binary operator.
    pub fn ends_value(&self) -> bool {
        match self.kind {
            TokenKind::Ident => {
                !super::scope::is_keyword(&self.text)
                    || matches!(self.text.as_str(), "this" | "true" | "false")
            }
            TokenKind::Number | TokenKind::Str => true,
            TokenKind::Punct => matches!(self.text.as_str(), ")" | "]" | "}"),
        }
    }
}

// Longest first.
const MULTI_PUNCT: &[&str] = &[
    "..=", "**=", "<<=", ">>=", "::", "?.", "?[", "??", "=>", "==", "!=", "<=", ">=", "&&", "||",
    "..", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "**", "<<", ">>",
];

pub fn tokenize(src: &str) -> Result<Vec<Token>, AnalysisError> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().collect(),
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.run(false)?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(o, _)| o)
            .unwrap_or(self.src.len())
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let text = self.src[start..self.offset()].to_string();
        self.tokens.push(Token {
            kind,
            text,
            offset: start,
        });
    }

    fn push_synthetic(&mut self, text: &str, offset: usize) {
        self.tokens.push(Token {
            kind: TokenKind::Punct,
            text: text.to_string(),
            offset,
        });
    }

    /// Lex until the end of input, or when `in_interpolation` until the `}`
    /// closing the current `${`.
    fn run(&mut self, in_interpolation: bool) -> Result<(), AnalysisError> {
        let mut braces = 0usize;
        while let Some(c) = self.peek() {
            let start = self.offset();
            match c {
                c if c.is_whitespace() => self.pos += 1,
                '/' if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                }
                '/' if self.peek_at(1) == Some('*') => self.block_comment(start)?,
                '"' => {
                    self.quoted('"', start, "string")?;
                    self.push(TokenKind::Str, start);
                }
                '\'' => {
                    self.quoted('\'', start, "character literal")?;
                    self.push(TokenKind::Str, start);
                }
                '`' => self.backtick(start)?,
                c if c.is_ascii_digit() => {
                    self.number();
                    self.push(TokenKind::Number, start);
                }
                c if c.is_alphabetic() || c == '_' => {
                    while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                        self.pos += 1;
                    }
                    self.push(TokenKind::Ident, start);
                }
                '}' if in_interpolation && braces == 0 => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => {
                    if c == '{' {
                        braces += 1;
                    } else if c == '}' {
                        braces = braces.saturating_sub(1);
                    }
                    self.punct();
                    self.push(TokenKind::Punct, start);
                }
            }
        }
        if in_interpolation {
            return Err(AnalysisError::Unterminated {
                what: "string interpolation",
                offset: self.src.len(),
            });
        }
        Ok(())
    }

    fn block_comment(&mut self, start: usize) -> Result<(), AnalysisError> {
        self.pos += 2;
        let mut depth = 1usize;
        while depth > 0 {
            match (self.peek(), self.peek_at(1)) {
                (Some('/'), Some('*')) => {
                    depth += 1;
                    self.pos += 2;
                }
                (Some('*'), Some('/')) => {
                    depth -= 1;
                    self.pos += 2;
                }
                (Some(_), _) => self.pos += 1,
                (None, _) => {
                    return Err(AnalysisError::Unterminated {
                        what: "block comment",
                        offset: start,
                    });
                }
            }
        }
        Ok(())
    }

    fn quoted(&mut self, quote: char, start: usize, what: &'static str) -> Result<(), AnalysisError> {
        self.pos += 1;
        loop {
            match self.peek() {
                Some('\\') => self.pos += 2,
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
                None => return Err(AnalysisError::Unterminated { what, offset: start }),
            }
        }
    }

    fn backtick(&mut self, start: usize) -> Result<(), AnalysisError> {
        self.pos += 1;
        let mut segment = start;
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some('`'), _) => {
                    self.pos += 1;
                    self.push(TokenKind::Str, segment);
                    return Ok(());
                }
                (Some('$'), Some('{')) => {
                    self.push(TokenKind::Str, segment);
                    let open = self.offset();
                    self.pos += 2;
                    self.push_synthetic("(", open);
                    self.run(true)?;
                    self.push_synthetic(")", self.offset());
                    segment = self.offset();
                }
                (Some(_), _) => self.pos += 1,
                (None, _) => {
                    return Err(AnalysisError::Unterminated {
                        what: "string",
                        offset: start,
                    });
                }
            }
        }
    }

    fn number(&mut self) {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                self.pos += 1;
            }
            // Exponent sign, as in `1.5e-3`.
            if matches!(self.peek(), Some('-') | Some('+'))
                && self.after_exponent_marker()
                && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
            {
                self.pos += 1;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }
    }

    fn after_exponent_marker(&self) -> bool {
        self.pos > 0 && matches!(self.chars[self.pos - 1].1, 'e' | 'E')
    }

    fn punct(&mut self) {
        let rest = &self.src[self.offset()..];
        let len = MULTI_PUNCT
            .iter()
            .find(|p| rest.starts_with(**p))
            .map(|p| p.chars().count())
            .unwrap_or(1);
        self.pos += len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<String> {
        tokenize(src).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn skips_comments_and_literal_contents() {
        let tokens = tokenize("a /* b /* nested */ c */ + \"d.cell\" // e\n + 'f'").unwrap();
        let idents: Vec<_> = tokens.iter().filter(|t| t.is_ident()).map(|t| t.text.as_str()).collect();
        assert_eq!(idents, vec!["a"]);
    }

    #[test]
    fn multi_char_operators_and_ranges() {
        assert_eq!(texts("x?.y ?? 0..=3"), vec!["x", "?.", "y", "??", "0", "..=", "3"]);
        assert_eq!(texts("1.5 + t.0"), vec!["1.5", "+", "t", ".", "0"]);
    }

    #[test]
    fn interpolations_are_lexed() {
        let toks = texts("`Hi ${name.first} and ${ #{a: 1}.a }!`");
        assert!(toks.contains(&"name".to_string()));
        assert!(toks.contains(&"first".to_string()));
        assert_eq!(toks.iter().filter(|t| *t == "(").count(), 2);
    }

    #[test]
    fn unterminated_literals_fail() {
        assert!(matches!(
            tokenize("\"abc"),
            Err(AnalysisError::Unterminated { what: "string", .. })
        ));
        assert!(tokenize("/* x").is_err());
        assert!(tokenize("`a ${b").is_err());
    }
}
