pub mod ast;
pub mod error;
pub mod lex;
pub mod parse;
pub mod source;
pub mod token;

use ast::Node;
use error::Error;
use lex::Lexer;
use parse::Parser;
use source::{LineLog, LineSource};
use token::Keywords;

/// Log `text` as the next line of `source`, then lex and parse one
/// statement from it. Bodies that span several lines continue reading
/// from `source`.
pub fn parse_line(
    text: &str,
    lines: &mut LineLog,
    source: &mut dyn LineSource,
    keywords: &Keywords,
    comment: u8,
) -> Result<Option<Node>, Error> {
    let index = lines.push(source.origin(), text);
    let tokens = Lexer::new(text, index, keywords)
        .with_comment(comment)
        .lex_line()?;
    Parser::new(tokens, lines, source, keywords)
        .with_comment(comment)
        .parse()
}
