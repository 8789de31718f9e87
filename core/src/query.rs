use crate::tokenizer::Analyzer;
use thiserror::Error;

/// A parsed query.
///
/// Grammar, with keywords matched case-insensitively:
///
/// ```text
/// query    := or_expr EOF
/// or_expr  := and_expr (OR and_expr)*
/// and_expr := not_expr ((AND not_expr) | (NOT not_expr))*
/// not_expr := NOT not_expr | primary
/// primary  := '(' or_expr ')' | WORD WORD '/'N | WORD
/// ```
///
/// Precedence is NOT > AND > OR, left-associative; parentheses group.
/// Infix `a NOT b` is accepted as shorthand for `a AND (NOT b)`.
/// `term1 term2 /N` matches documents where the two terms occur within N
/// positions of each other, in either order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpr {
    Term(String),
    And(Vec<QueryExpr>),
    Or(Vec<QueryExpr>),
    Not(Box<QueryExpr>),
    Proximity { left: String, right: String, window: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty query")]
    EmptyQuery,
    #[error("unexpected `{fragment}` at offset {offset}")]
    UnexpectedToken { fragment: String, offset: usize },
    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("invalid proximity window `{fragment}` at offset {offset}, expected `/N` with N a non-negative integer")]
    InvalidWindow { fragment: String, offset: usize },
    #[error("proximity window at offset {offset} must follow exactly two terms")]
    WindowWithoutTerms { offset: usize },
    #[error("adjacent terms form a proximity query, expected `/N` but found `{fragment}` at offset {offset}")]
    ExpectedWindow { fragment: String, offset: usize },
    #[error("unmatched `(` at offset {offset}")]
    UnclosedGroup { offset: usize },
    #[error("`{fragment}` at offset {offset} has no searchable characters")]
    NotATerm { fragment: String, offset: usize },
}

/// Parse a query string into a [`QueryExpr`].
///
/// Term tokens are normalized through the analyzer's term transform so they
/// match index terms; a term that would have been dropped as a stop word at
/// index time parses fine and simply matches nothing. Malformed input fails
/// with a [`ParseError`] naming the offending fragment; no partial tree is
/// returned.
pub fn parse_query(input: &str, analyzer: &Analyzer) -> Result<QueryExpr, ParseError> {
    let lexemes = lex(input)?;
    if lexemes.is_empty() {
        return Err(ParseError::EmptyQuery);
    }
    let mut parser = Parser { lexemes, pos: 0, analyzer };
    let expr = parser.or_expr()?;
    match parser.bump() {
        None => Ok(expr),
        Some(Lexeme { tok: Tok::Window(_), offset, .. }) => {
            Err(ParseError::WindowWithoutTerms { offset })
        }
        Some(lx) => Err(ParseError::UnexpectedToken { fragment: lx.text, offset: lx.offset }),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word,
    And,
    Or,
    Not,
    LParen,
    RParen,
    Window(u32),
}

#[derive(Debug, Clone)]
struct Lexeme {
    tok: Tok,
    text: String,
    offset: usize,
}

fn lex(input: &str) -> Result<Vec<Lexeme>, ParseError> {
    let mut out = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' || c == ')' {
            chars.next();
            let tok = if c == '(' { Tok::LParen } else { Tok::RParen };
            out.push(Lexeme { tok, text: c.to_string(), offset: start });
            continue;
        }
        let mut end = start;
        while let Some(&(i, d)) = chars.peek() {
            if d.is_whitespace() || d == '(' || d == ')' {
                break;
            }
            end = i + d.len_utf8();
            chars.next();
        }
        let text = &input[start..end];
        let tok = if let Some(digits) = text.strip_prefix('/') {
            match digits.parse::<u32>() {
                Ok(n) => Tok::Window(n),
                Err(_) => {
                    return Err(ParseError::InvalidWindow {
                        fragment: text.to_string(),
                        offset: start,
                    })
                }
            }
        } else if text.eq_ignore_ascii_case("and") {
            Tok::And
        } else if text.eq_ignore_ascii_case("or") {
            Tok::Or
        } else if text.eq_ignore_ascii_case("not") {
            Tok::Not
        } else {
            Tok::Word
        };
        out.push(Lexeme { tok, text: text.to_string(), offset: start });
    }
    Ok(out)
}

struct Parser<'a> {
    lexemes: Vec<Lexeme>,
    pos: usize,
    analyzer: &'a Analyzer,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn bump(&mut self) -> Option<Lexeme> {
        let lx = self.lexemes.get(self.pos).cloned();
        if lx.is_some() {
            self.pos += 1;
        }
        lx
    }

    fn or_expr(&mut self) -> Result<QueryExpr, ParseError> {
        let mut children = vec![self.and_expr()?];
        while matches!(self.peek().map(|l| &l.tok), Some(Tok::Or)) {
            self.bump();
            children.push(self.and_expr()?);
        }
        Ok(collapse(children, QueryExpr::Or))
    }

    fn and_expr(&mut self) -> Result<QueryExpr, ParseError> {
        let mut children = vec![self.not_expr()?];
        loop {
            match self.peek().map(|l| &l.tok) {
                Some(Tok::And) => {
                    self.bump();
                    children.push(self.not_expr()?);
                }
                // Infix NOT: `a NOT b` subtracts b's matches from a's.
                Some(Tok::Not) => {
                    self.bump();
                    children.push(QueryExpr::Not(Box::new(self.not_expr()?)));
                }
                _ => break,
            }
        }
        Ok(collapse(children, QueryExpr::And))
    }

    fn not_expr(&mut self) -> Result<QueryExpr, ParseError> {
        if matches!(self.peek().map(|l| &l.tok), Some(Tok::Not)) {
            self.bump();
            return Ok(QueryExpr::Not(Box::new(self.not_expr()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<QueryExpr, ParseError> {
        let lx = match self.bump() {
            Some(lx) => lx,
            None => return Err(ParseError::UnexpectedEnd { expected: "a term or `(`" }),
        };
        match lx.tok {
            Tok::LParen => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Lexeme { tok: Tok::RParen, .. }) => Ok(inner),
                    Some(Lexeme { tok: Tok::Window(_), offset, .. }) => {
                        Err(ParseError::WindowWithoutTerms { offset })
                    }
                    Some(other) => Err(ParseError::UnexpectedToken {
                        fragment: other.text,
                        offset: other.offset,
                    }),
                    None => Err(ParseError::UnclosedGroup { offset: lx.offset }),
                }
            }
            Tok::Word => {
                let left = self.normalize(&lx.text, lx.offset)?;
                if matches!(self.peek().map(|l| &l.tok), Some(Tok::Word)) {
                    // Two adjacent terms open a proximity clause and must be
                    // closed by a `/N` window marker.
                    let second = match self.bump() {
                        Some(lx) => lx,
                        None => return Err(ParseError::UnexpectedEnd { expected: "a term" }),
                    };
                    let right = self.normalize(&second.text, second.offset)?;
                    return match self.bump() {
                        Some(Lexeme { tok: Tok::Window(window), .. }) => {
                            Ok(QueryExpr::Proximity { left, right, window })
                        }
                        Some(other) => Err(ParseError::ExpectedWindow {
                            fragment: other.text,
                            offset: other.offset,
                        }),
                        None => Err(ParseError::UnexpectedEnd {
                            expected: "a proximity window like `/3`",
                        }),
                    };
                }
                Ok(QueryExpr::Term(left))
            }
            Tok::Window(_) => Err(ParseError::WindowWithoutTerms { offset: lx.offset }),
            Tok::And | Tok::Or | Tok::Not | Tok::RParen => {
                Err(ParseError::UnexpectedToken { fragment: lx.text, offset: lx.offset })
            }
        }
    }

    fn normalize(&self, text: &str, offset: usize) -> Result<String, ParseError> {
        self.analyzer.normalize_term(text).ok_or_else(|| ParseError::NotATerm {
            fragment: text.to_string(),
            offset,
        })
    }
}

fn collapse(mut children: Vec<QueryExpr>, combine: fn(Vec<QueryExpr>) -> QueryExpr) -> QueryExpr {
    if children.len() == 1 {
        children.remove(0)
    } else {
        combine(children)
    }
}
