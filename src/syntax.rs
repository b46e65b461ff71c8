//! A reader for the core expression syntax.
//!
//! ```text
//! expr     := "let" ident "=" expr ";" expr | function
//! function := "implicit"? dual "->" expr | dual
//! dual     := postfix ("@" postfix)*
//! postfix  := primary ("(" args ")" | "." ident | "." digits)*
//! primary  := number | string | "true" | "false" | ":" ident
//!           | Upper "<" args? ">" | ident | "{" fields? "}" | "(" expr ")"
//! ```
//!
//! Calls with several arguments are curried, and `//` starts a line comment.

use std::collections::BTreeMap;

use thiserror::Error;
use winnow::{
    ascii::{digit1, escaped_transform, multispace1, till_line_ending},
    combinator::{
        alt, cut_err, delimited, not, opt, preceded, repeat, separated,
        terminated,
    },
    error::ContextError,
    token::{one_of, take_till, take_while},
    PResult, Parser,
};

use crate::expr::{Expression, Node};

const BACKSLASH: char = '\\';
const DOUBLE_QUOTE: char = '"';
const KEYWORDS: [&str; 4] = ["let", "implicit", "true", "false"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at {line}:{column}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    fn new(source: &str, offset: usize, message: String) -> Self {
        let before = &source[..offset.min(source.len())];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |line| line.chars().count()) + 1;

        Self {
            offset,
            line,
            column,
            message,
        }
    }
}

/// Reads a single expression from `source`.
pub fn parse(source: &str) -> Result<Node, ParseError> {
    preceded(trivia, expr)
        .parse(source)
        .map_err(|error| {
            let message = error.inner().to_string();
            let message = match message.is_empty() {
                true => String::from("unexpected input"),
                false => message,
            };

            ParseError::new(source, error.offset(), message)
        })
}

// LEXEMES

fn trivia(input: &mut &str) -> PResult<()> {
    repeat(
        0..,
        alt((multispace1.void(), ("//", till_line_ending).void())),
    )
    .parse_next(input)
}

fn lexeme<'s, O>(
    parser: impl Parser<&'s str, O, ContextError>,
) -> impl Parser<&'s str, O, ContextError> {
    terminated(parser, trivia)
}

fn symbol<'s>(text: &'static str) -> impl Parser<&'s str, &'s str, ContextError> {
    lexeme(text)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword<'s>(text: &'static str) -> impl Parser<&'s str, &'s str, ContextError> {
    lexeme(terminated(text, not(one_of(is_identifier_char))))
}

fn identifier<'s>(input: &mut &'s str) -> PResult<&'s str> {
    lexeme(
        take_while(1.., is_identifier_char).verify(|name: &str| {
            name.starts_with(|c: char| c.is_alphabetic() || c == '_')
                && !KEYWORDS.contains(&name)
        }),
    )
    .parse_next(input)
}

fn data_name<'s>(input: &mut &'s str) -> PResult<&'s str> {
    identifier
        .verify(|name: &str| name.starts_with(char::is_uppercase))
        .parse_next(input)
}

fn number(input: &mut &str) -> PResult<f64> {
    lexeme(
        (opt('-'), digit1, opt(preceded('.', digit1))).try_map(
            |(sign, int, frac): (Option<char>, &str, Option<&str>)| {
                let sign = if sign.is_some() { "-" } else { "" };
                format!("{sign}{int}.{}", frac.unwrap_or("0")).parse::<f64>()
            },
        ),
    )
    .parse_next(input)
}

fn string(input: &mut &str) -> PResult<String> {
    lexeme(delimited(
        DOUBLE_QUOTE,
        escaped_transform(
            take_till(1.., [BACKSLASH, DOUBLE_QUOTE]),
            BACKSLASH,
            alt((
                "\\".value("\\"),
                "\"".value("\""),
                "n".value("\n"),
                "t".value("\t"),
            )),
        ),
        DOUBLE_QUOTE,
    ))
    .parse_next(input)
}

// EXPRESSIONS

fn expr(input: &mut &str) -> PResult<Node> {
    alt((binding, function)).parse_next(input)
}

fn binding(input: &mut &str) -> PResult<Node> {
    preceded(
        keyword("let"),
        cut_err((
            identifier,
            preceded(symbol("="), expr),
            preceded(symbol(";"), expr),
        )),
    )
    .map(|(name, value, body)| Node::binding(name, value, body))
    .parse_next(input)
}

fn function(input: &mut &str) -> PResult<Node> {
    let implicit = opt(keyword("implicit")).parse_next(input)?.is_some();
    let parameter = dual.parse_next(input)?;

    let body = match implicit {
        true => Some(preceded(symbol("->"), cut_err(expr)).parse_next(input)?),
        false => opt(preceded(symbol("->"), cut_err(expr))).parse_next(input)?,
    };

    Ok(match body {
        Some(body) => Node::function(parameter, body, implicit),
        None => parameter,
    })
}

fn dual(input: &mut &str) -> PResult<Node> {
    let first = postfix.parse_next(input)?;
    let rest: Vec<Node> =
        repeat(0.., preceded(symbol("@"), cut_err(postfix))).parse_next(input)?;

    Ok(rest.into_iter().fold(first, |left, right| {
        Node::new(Expression::Dual {
            left: Box::new(left),
            right: Box::new(right),
        })
    }))
}

enum Suffix {
    Call(Vec<Node>),
    Property(String),
    Index(usize),
}

fn postfix(input: &mut &str) -> PResult<Node> {
    let base = primary.parse_next(input)?;
    let suffixes: Vec<Suffix> = repeat(0.., suffix).parse_next(input)?;

    Ok(suffixes
        .into_iter()
        .fold(base, |node, suffix| match suffix {
            Suffix::Call(arguments) => {
                arguments.into_iter().fold(node, Node::application)
            }
            Suffix::Property(property) => {
                Node::new(Expression::ReadRecordProperty {
                    record: Box::new(node),
                    property: property.into(),
                })
            }
            Suffix::Index(index) => Node::new(Expression::ReadDataProperty {
                data: Box::new(node),
                index,
            }),
        }))
}

fn suffix(input: &mut &str) -> PResult<Suffix> {
    alt((
        delimited(symbol("("), cut_err(arguments), cut_err(symbol(")")))
            .map(Suffix::Call),
        preceded(
            symbol("."),
            cut_err(alt((
                lexeme(digit1.try_map(str::parse::<usize>)).map(Suffix::Index),
                identifier.map(|name| Suffix::Property(name.to_owned())),
            ))),
        ),
    ))
    .parse_next(input)
}

fn arguments(input: &mut &str) -> PResult<Vec<Node>> {
    separated(1.., expr, symbol(",")).parse_next(input)
}

fn primary(input: &mut &str) -> PResult<Node> {
    alt((
        number.map(Node::number),
        string.map(|value| Node::new(Expression::String(value.into()))),
        keyword("true").map(|_| Node::new(Expression::Boolean(true))),
        keyword("false").map(|_| Node::new(Expression::Boolean(false))),
        preceded(':', identifier)
            .map(|name| Node::new(Expression::Symbol(name.into()))),
        data,
        identifier.map(Node::identifier),
        record,
        delimited(symbol("("), cut_err(expr), cut_err(symbol(")"))),
    ))
    .parse_next(input)
}

fn data(input: &mut &str) -> PResult<Node> {
    (
        data_name,
        delimited(
            symbol("<"),
            separated(0.., expr, symbol(",")),
            cut_err(symbol(">")),
        ),
    )
        .map(|(name, parameters): (&str, Vec<Node>)| {
            Node::new(Expression::DataInstantiation {
                name: name.into(),
                parameters: parameters.into_boxed_slice(),
            })
        })
        .parse_next(input)
}

fn record(input: &mut &str) -> PResult<Node> {
    delimited(
        symbol("{"),
        separated(0.., (identifier, preceded(symbol(":"), cut_err(expr))), symbol(",")),
        cut_err((opt(symbol(",")), symbol("}"))),
    )
    .map(|properties: Vec<(&str, Node)>| {
        Node::new(Expression::Record(
            properties
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect::<BTreeMap<_, _>>(),
        ))
    })
    .parse_next(input)
}
