//! The parser
//!
//! A hand-written recursive-descent parser over the token stream.  All four
//! binary operators share a single precedence level and associate to the
//! left; parenthesisation is the only disambiguator.

use std::fmt::Debug;

use derive_more::derive::Display;

use crate::common::Id;

use super::ast::*;
use super::lex::{tokenize, Token, TokenKind};

#[derive(Display)]
#[display("Parse error: {}", self.0)]
pub struct ParseError(pub(crate) String);

impl Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

pub fn parse(input: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(input).map_err(|e| ParseError(e.to_string()))?;
    Parser { tokens, pos: 0 }.program()
}

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self, lookahead: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + lookahead).map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind(0) == Some(kind)
    }

    fn advance(&mut self) -> Option<Token<'src>> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>, ParseError> {
        match self.peek() {
            Some(&token) if token.kind == kind => {
                self.pos += 1;
                Ok(token)
            }
            Some(token) => Err(ParseError(format!(
                "expected '{kind}', found '{}'",
                token.text
            ))),
            None => Err(ParseError(format!("expected '{kind}', found end of input"))),
        }
    }

    fn program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        while self.peek().is_some() {
            items.push(self.item()?);
        }
        if items.is_empty() {
            return Err(ParseError("empty program".to_owned()));
        }
        Ok(Program { items })
    }

    fn item(&mut self) -> Result<Item, ParseError> {
        if self.eat(TokenKind::Define) {
            let name = self.ident()?;
            let value = self.constant()?;
            Ok(Item::Define(name, value))
        } else {
            Ok(Item::Stmt(self.statement()?))
        }
    }

    fn ident(&mut self) -> Result<Id, ParseError> {
        let token = self.expect(TokenKind::Id)?;
        Ok(Id::new(token.text.to_owned()))
    }

    fn constant(&mut self) -> Result<Const, ParseError> {
        match self.advance() {
            Some(token) => match token.kind {
                TokenKind::Num => Ok(Const::Number(parse_number(token.text)?)),
                TokenKind::Char => Ok(Const::Character(unescape_char(token.text))),
                TokenKind::Str => Ok(Const::Str(token.text[1..token.text.len() - 1].to_owned())),
                _ => Err(ParseError(format!(
                    "expected a constant, found '{}'",
                    token.text
                ))),
            },
            None => Err(ParseError("expected a constant, found end of input".to_owned())),
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        use TokenKind::*;
        match self.peek_kind(0) {
            Some(Var) => self.var_decl(),
            Some(Input) => self.input_stmt(),
            Some(Output) => self.output_stmt(),
            Some(While) => self.while_stmt(),
            Some(If) => self.if_stmt(),
            // One token of lookahead separates `x = e;` from a bare
            // expression statement starting with an identifier.
            Some(Id) if self.peek_kind(1) == Some(Assign) => self.assign(),
            Some(_) => {
                let value = self.expression()?;
                self.expect(Semi)?;
                Ok(Stmt::Expr(value))
            }
            None => Err(ParseError("expected a statement, found end of input".to_owned())),
        }
    }

    fn var_decl(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Var)?;
        let name = self.ident()?;
        self.expect(TokenKind::Assign)?;
        let value = self.expression()?;
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::VarDecl(name, value))
    }

    fn assign(&mut self) -> Result<Stmt, ParseError> {
        let name = self.ident()?;
        self.expect(TokenKind::Assign)?;
        let value = self.expression()?;
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::Assign(name, value))
    }

    fn input_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Input)?;
        self.expect(TokenKind::LParen)?;
        let name = self.ident()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::Input(name))
    }

    fn output_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Output)?;
        self.expect(TokenKind::LParen)?;
        let value = self.expression()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::Output(value))
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let guard = self.expression()?;
        self.expect(TokenKind::RParen)?;
        let body = self.block()?;
        Ok(Stmt::While { guard, body })
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let guard = self.expression()?;
        self.expect(TokenKind::RParen)?;
        let tt = self.block()?;
        let ff = if self.eat(TokenKind::Else) {
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { guard, tt, ff })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        if self.at(TokenKind::RBrace) {
            return Err(ParseError("a block requires at least one statement".to_owned()));
        }
        let mut stmts = Vec::new();
        while !self.eat(TokenKind::RBrace) {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek_kind(0) {
                Some(TokenKind::Plus) => BOp::Add,
                Some(TokenKind::Minus) => BOp::Sub,
                Some(TokenKind::EqEq) => BOp::Eq,
                Some(TokenKind::NotEq) => BOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::BOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Some(token) => match token.kind {
                TokenKind::Id => Ok(Expr::Var(Id::new(token.text.to_owned()))),
                TokenKind::Num => Ok(Expr::Const(parse_number(token.text)?)),
                TokenKind::Char => Ok(Expr::Char(unescape_char(token.text))),
                TokenKind::LParen => {
                    let value = self.expression()?;
                    self.expect(TokenKind::RParen)?;
                    Ok(value)
                }
                _ => Err(ParseError(format!(
                    "expected an expression, found '{}'",
                    token.text
                ))),
            },
            None => Err(ParseError("expected an expression, found end of input".to_owned())),
        }
    }
}

fn parse_number(text: &str) -> Result<i64, ParseError> {
    text.parse()
        .map_err(|_| ParseError(format!("number literal '{text}' is too large")))
}

/// Decode a character literal token (quotes included) to the character it
/// denotes.  Unknown escapes `\x` collapse to `x`.
fn unescape_char(text: &str) -> char {
    let inner = &text[1..text.len() - 1];
    match inner.strip_prefix('\\') {
        Some(rest) => match rest.chars().next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('\\') => '\\',
            Some('\'') => '\'',
            Some('0') => '\0',
            Some(other) => other,
            None => '\\',
        },
        None => inner.chars().next().unwrap_or('\0'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Id {
        Id::new(name.to_owned())
    }

    fn bop(op: BOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::BOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[test]
    fn declaration_and_output() {
        let program = parse("var x = 5; output(x);").unwrap();
        assert_eq!(
            program.items,
            [
                Item::Stmt(Stmt::VarDecl(id("x"), Expr::Const(5))),
                Item::Stmt(Stmt::Output(Expr::Var(id("x")))),
            ]
        );
    }

    #[test]
    fn operators_associate_left_at_one_precedence() {
        let program = parse("a - b - c;").unwrap();
        let expected = bop(
            BOp::Sub,
            bop(BOp::Sub, Expr::Var(id("a")), Expr::Var(id("b"))),
            Expr::Var(id("c")),
        );
        assert_eq!(program.items, [Item::Stmt(Stmt::Expr(expected))]);

        // `==` binds exactly as tightly as `+`.
        let program = parse("a == b + 1;").unwrap();
        let expected = bop(
            BOp::Add,
            bop(BOp::Eq, Expr::Var(id("a")), Expr::Var(id("b"))),
            Expr::Const(1),
        );
        assert_eq!(program.items, [Item::Stmt(Stmt::Expr(expected))]);
    }

    #[test]
    fn parentheses_override_associativity() {
        let program = parse("a - (b - c);").unwrap();
        let expected = bop(
            BOp::Sub,
            Expr::Var(id("a")),
            bop(BOp::Sub, Expr::Var(id("b")), Expr::Var(id("c"))),
        );
        assert_eq!(program.items, [Item::Stmt(Stmt::Expr(expected))]);
    }

    #[test]
    fn if_with_and_without_else() {
        let program = parse("if (x) { y = 1; } else { y = 2; }").unwrap();
        match &program.items[0] {
            Item::Stmt(Stmt::If { tt, ff, .. }) => {
                assert_eq!(tt.len(), 1);
                assert_eq!(ff.len(), 1);
            }
            other => panic!("unexpected item: {other:?}"),
        }

        let program = parse("if (x) { y = 1; }").unwrap();
        match &program.items[0] {
            Item::Stmt(Stmt::If { ff, .. }) => assert!(ff.is_empty()),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn define_directive() {
        let program = parse("#define MAX 10 #define NL '\\n' #define GREETING \"hi\"").unwrap();
        assert_eq!(
            program.items,
            [
                Item::Define(id("MAX"), Const::Number(10)),
                Item::Define(id("NL"), Const::Character('\n')),
                Item::Define(id("GREETING"), Const::Str("hi".to_owned())),
            ]
        );
    }

    #[test]
    fn character_escapes() {
        let program = parse("output('\\0'); output('\\q');").unwrap();
        assert_eq!(
            program.items,
            [
                Item::Stmt(Stmt::Output(Expr::Char('\0'))),
                Item::Stmt(Stmt::Output(Expr::Char('q'))),
            ]
        );
    }

    #[test]
    fn blocks_require_a_statement() {
        let err = parse("while (x) {}").unwrap_err();
        assert!(err.0.contains("at least one statement"), "{err}");
    }

    #[test]
    fn missing_semicolon() {
        assert!(parse("var x = 5").is_err());
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(parse("").is_err());
        assert!(parse("// just a comment").is_err());
    }
}
