use crate::error::{AnalysisError, LexerError};
use logos::{Lexer, Logos, Skip};

/// Tokens of the textual SSA module format.
///
/// String-carrying variants borrow from the source so the token stream
/// stays `Copy` for the peg grammar.
#[derive(Logos, Debug, Copy, Clone, PartialEq)]
#[logos(skip r"[ \r\t\f]+")]
#[logos(skip r"#[^\n]*")]
#[logos(extras = usize)]
#[logos(error = LexerError)]
pub enum Token<'a> {
    #[regex(r"\n", newline)]
    Newline,
    // single char tokens
    #[token("=")]
    Assign,
    #[token("(")]
    LeftParenthesis,
    #[token(")")]
    RightParenthesis,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftSquareBracket,
    #[token("]")]
    RightSquareBracket,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    // operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Rem,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("!")]
    Bang,
    // keywords
    #[token("entry")]
    Entry,
    #[token("global")]
    Global,
    #[token("fn")]
    Fn,
    #[token("const")]
    Const,
    #[token("fieldaddr")]
    FieldAddr,
    #[token("changetype")]
    ChangeType,
    #[token("phi")]
    Phi,
    #[token("call")]
    Call,
    #[token("store")]
    Store,
    #[token("ret")]
    Ret,
    #[token("br")]
    Br,
    #[token("pointsto")]
    PointsTo,
    #[token("callgraph")]
    CallGraph,
    #[token("unique")]
    Unique,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,
    // multi char tokens
    #[regex(r"%[A-Za-z0-9_]+", register)]
    Register(&'a str),
    #[regex(r"[A-Za-z_][A-Za-z0-9_./]*", |lex| lex.slice())]
    Identifier(&'a str),
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse().ok())]
    Integer(i128),
    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse().ok())]
    Float(f64),
    #[regex(r#""[^"]*""#, string_body)]
    Str(&'a str),
}

fn newline<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Skip {
    lex.extras += 1;
    Skip
}

fn register<'a>(lex: &mut Lexer<'a, Token<'a>>) -> &'a str {
    &lex.slice()[1..]
}

fn string_body<'a>(lex: &mut Lexer<'a, Token<'a>>) -> &'a str {
    let slice = lex.slice();
    &slice[1..slice.len() - 1]
}

/// Tokenizes a whole SSA module.
///
/// Returns the token stream together with a parallel vector giving the
/// 1-based source line of each token, used by the parser to attach
/// positions to instructions.
pub fn tokenize_module(source: &str) -> Result<(Vec<Token>, Vec<usize>), AnalysisError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut lines = Vec::new();

    while let Some(result) = lexer.next() {
        let token = result.map_err(|error| AnalysisError::LexerError {
            error,
            line: lexer.extras + 1,
        })?;
        tokens.push(token);
        lines.push(lexer.extras + 1);
    }

    Ok((tokens, lines))
}
