//! The lexer.

use derive_more::Display;
use regex::Regex;

/// Tokens in the program
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display("kind: '{kind}', part of input: '{text}'")]
pub struct Token<'src> {
    /// What token class this token belongs to.
    pub kind: TokenKind,
    /// What part of the input this token carries.
    pub text: &'src str,
}

/// Token classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum TokenKind {
    #[display("#define")]
    Define,
    #[display("var")]
    Var,
    #[display("input")]
    Input,
    #[display("output")]
    Output,
    #[display("while")]
    While,
    #[display("if")]
    If,
    #[display("else")]
    Else,
    #[display("id")]
    Id,
    #[display("num")]
    Num,
    #[display("char")]
    Char,
    #[display("string")]
    Str,
    #[display("==")]
    EqEq,
    #[display("!=")]
    NotEq,
    #[display("=")]
    Assign,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display("{{")]
    LBrace,
    #[display("}}")]
    RBrace,
    #[display(";")]
    Semi,
}

pub struct LexError(pub usize, pub char);

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lexer error: unexpected character {:?} at {}", self.1, self.0)
    }
}

impl std::fmt::Debug for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lexer error: unexpected character {:?} at {}", self.1, self.0)
    }
}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    whitespace: Regex,
    matchers: Vec<(Regex, TokenKind)>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        use TokenKind::*;

        // Matchers are tried in order; the first that matches wins, so
        // keywords sit above `Id` and `==` above `=`.
        let matcher = |pattern, kind| (Regex::new(pattern).unwrap(), kind);
        Lexer {
            input,
            pos: 0,
            whitespace: Regex::new(r"\A(?:[ \t\f\r\n\v]|//[^\n]*|/\*(?s:.)*?\*/)*").unwrap(),
            matchers: vec![
                matcher(r"\A#define\b", Define),
                matcher(r"\Avar\b", Var),
                matcher(r"\Ainput\b", Input),
                matcher(r"\Aoutput\b", Output),
                matcher(r"\Awhile\b", While),
                matcher(r"\Aif\b", If),
                matcher(r"\Aelse\b", Else),
                matcher(r"\A[A-Za-z_][A-Za-z0-9_]*", Id),
                matcher(r"\A[0-9]+", Num),
                matcher(r"\A'(\\.|[^\\'])'", Char),
                matcher(r#"\A"(\\.|[^\\"])*""#, Str),
                matcher(r"\A==", EqEq),
                matcher(r"\A!=", NotEq),
                matcher(r"\A=", Assign),
                matcher(r"\A\+", Plus),
                matcher(r"\A-", Minus),
                matcher(r"\A\(", LParen),
                matcher(r"\A\)", RParen),
                matcher(r"\A\{", LBrace),
                matcher(r"\A\}", RBrace),
                matcher(r"\A;", Semi),
            ],
        }
    }

    /// Has the lexer reached the end of input?
    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    // Skip comments and whitespace.  A line whose first non-whitespace
    // character is `#` is a leftover preprocessor line and is skipped too,
    // unless it is a `#define` directive.
    fn skip_whitespace(&mut self) {
        loop {
            if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
                self.pos += m.end();
            }
            let rest = &self.input[self.pos..];
            if rest.starts_with('#') && !rest.starts_with("#define") {
                match rest.find('\n') {
                    Some(eol) => self.pos += eol,
                    None => self.pos = self.input.len(),
                }
                continue;
            }
            break;
        }
    }

    /// Get the next token if possible.
    ///
    /// The return type distinguishes between end-of-input and lexer error.
    pub fn next(&mut self) -> Result<Option<Token<'input>>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }
        let rest = &self.input[self.pos..];
        for (re, kind) in &self.matchers {
            if let Some(m) = re.find(rest) {
                let text = &rest[..m.end()];
                self.pos += m.end();
                return Ok(Some(Token { kind: *kind, text }));
            }
        }
        Err(LexError(self.pos, rest.chars().next().unwrap_or('\0')))
    }
}

/// Lex the whole input up front.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next()? {
        tokens.push(token);
    }
    Ok(tokens)
}
