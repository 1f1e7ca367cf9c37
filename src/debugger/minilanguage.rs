//! The expression mini-language used by the debugger's `print` and
//! `assign` commands.
//!
//! ```text
//!   start := FORMAT? exprlist
//!
//!   exprlist := (expr COMMA)* expr
//!
//!   expr := expr op expr | LPAREN expr RPAREN | MINUS expr | AT expr | atom
//!   op   := PLUS | MINUS | ASTERISK | SLASH
//!   atom := REGISTER | INT | SYMBOL
//! ```
//!
//! A Pratt parser with the usual precedence: `*` and `/` bind tighter than
//! `+` and `-`, and all operators are left-associative.

use std::fmt;

use crate::data::{HeraError, Token, TokenKind};
use crate::lexer::Lexer;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Int(i32),
    /// A register by its spelling; `pc` is allowed here.
    Register(String),
    Symbol(String),
    /// `@expr`: a memory dereference.
    Memory(Box<Node>),
    Minus(Box<Node>),
    Infix(InfixOp, Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl InfixOp {
    fn symbol(self) -> char {
        match self {
            InfixOp::Add => '+',
            InfixOp::Sub => '-',
            InfixOp::Mul => '*',
            InfixOp::Div => '/',
        }
    }
}

/// A parsed command line: an optional format prefix and one or more
/// comma-separated expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqNode {
    pub fmt: String,
    pub seq: Vec<Node>,
}

const PREC_LOWEST: u8 = 0;
const PREC_PREFIX: u8 = 3;

fn precedence(kind: TokenKind) -> Option<u8> {
    match kind {
        TokenKind::Plus | TokenKind::Minus => Some(1),
        TokenKind::Asterisk | TokenKind::Slash => Some(2),
        _ => None,
    }
}

/// Parse one line of the mini-language.
pub fn parse(line: &str) -> Result<SeqNode, HeraError> {
    let mut parser = MiniParser {
        lexer: Lexer::new(line, None),
    };
    parser.parse()
}

struct MiniParser {
    lexer: Lexer,
}

impl MiniParser {
    fn parse(&mut self) -> Result<SeqNode, HeraError> {
        let tree = self.match_exprlist()?;
        if self.lexer.tkn.kind == TokenKind::Eof {
            Ok(tree)
        } else {
            Err(HeraError::Syntax("trailing input".to_owned()))
        }
    }

    fn match_exprlist(&mut self) -> Result<SeqNode, HeraError> {
        let fmt = if self.lexer.tkn.kind == TokenKind::Fmt {
            let fmt = self.lexer.tkn.text.clone();
            self.lexer.next_token();
            fmt
        } else {
            String::new()
        };

        let mut seq = vec![self.match_expr(PREC_LOWEST)?];
        while self.lexer.tkn.kind == TokenKind::Comma {
            self.lexer.next_token();
            seq.push(self.match_expr(PREC_LOWEST)?);
        }

        Ok(SeqNode { fmt, seq })
    }

    fn match_expr(&mut self, precedence_floor: u8) -> Result<Node, HeraError> {
        let tkn = self.lexer.tkn.clone();
        let mut left = match tkn.kind {
            TokenKind::At => {
                self.lexer.next_token();
                Node::Memory(Box::new(self.match_expr(PREC_PREFIX)?))
            }
            TokenKind::Minus => {
                self.lexer.next_token();
                Node::Minus(Box::new(self.match_expr(PREC_PREFIX)?))
            }
            TokenKind::Int => {
                let value = int_literal(&tkn)?;
                self.lexer.next_token();
                Node::Int(value)
            }
            TokenKind::Register => {
                self.lexer.next_token();
                Node::Register(tkn.text)
            }
            TokenKind::Symbol => {
                self.lexer.next_token();
                Node::Symbol(tkn.text)
            }
            TokenKind::Lparen => {
                self.lexer.next_token();
                let inner = self.match_expr(PREC_LOWEST)?;
                if self.lexer.tkn.kind != TokenKind::Rparen {
                    return Err(unexpected(&self.lexer.tkn));
                }
                self.lexer.next_token();
                inner
            }
            _ => return Err(unexpected(&tkn)),
        };

        while let Some(infix_precedence) = precedence(self.lexer.tkn.kind) {
            if precedence_floor >= infix_precedence {
                break;
            }
            let op = match self.lexer.tkn.kind {
                TokenKind::Plus => InfixOp::Add,
                TokenKind::Minus => InfixOp::Sub,
                TokenKind::Asterisk => InfixOp::Mul,
                TokenKind::Slash => InfixOp::Div,
                _ => unreachable!("precedence table covers these"),
            };
            self.lexer.next_token();
            let right = self.match_expr(infix_precedence)?;
            left = Node::Infix(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }
}

fn int_literal(tkn: &Token) -> Result<i32, HeraError> {
    let text = &tkn.text;
    let (digits, base) = if text.len() > 2 && text[..2].eq_ignore_ascii_case("0x") {
        (&text[2..], 16)
    } else if text.len() > 2 && text[..2].eq_ignore_ascii_case("0b") {
        (&text[2..], 2)
    } else if text.len() > 2 && text[..2].eq_ignore_ascii_case("0o") {
        (&text[2..], 8)
    } else {
        (text.as_str(), 10)
    };
    // Range checking happens at evaluation; here the literal just has to
    // be a number.
    i64::from_str_radix(digits, base)
        .ok()
        .filter(|v| i32::try_from(*v).is_ok())
        .map(|v| v as i32)
        .ok_or_else(|| HeraError::Syntax(format!("invalid integer literal: {}", text)))
}

fn unexpected(tkn: &Token) -> HeraError {
    match tkn.kind {
        TokenKind::Eof => HeraError::Syntax("premature end of input".to_owned()),
        TokenKind::Unknown => {
            HeraError::Syntax(format!("unrecognized input `{}`", tkn.text))
        }
        _ => HeraError::Syntax(format!("did not expect `{}` in this position", tkn.text)),
    }
}

// Nested infix expressions are parenthesized so the echoed form is
// unambiguous.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Int(v) => write!(f, "{}", v),
            Node::Register(r) => write!(f, "{}", r),
            Node::Symbol(s) => write!(f, "{}", s),
            Node::Memory(address) => write!(f, "@{}", wrap(address)),
            Node::Minus(arg) => write!(f, "-{}", wrap(arg)),
            Node::Infix(op, left, right) => {
                write!(f, "{} {} {}", wrap(left), op.symbol(), wrap(right))
            }
        }
    }
}

fn wrap(node: &Node) -> String {
    match node {
        Node::Infix(..) => format!("({})", node),
        _ => node.to_string(),
    }
}

impl fmt::Display for SeqNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exprs = self
            .seq
            .iter()
            .map(Node::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if self.fmt.is_empty() {
            write!(f, "{}", exprs)
        } else {
            write!(f, ":{} {}", self.fmt, exprs)
        }
    }
}
