//! Configuration document parser
//!
//! Grammar:
//!
//! ```text
//! config     := ws dictionary ws EOF
//! dictionary := '{' ws (field (ws ','? ws field)*)? ws '}'
//! field      := name ws ':' ws value
//! name       := identifier | string
//! value      := dictionary | array | literal
//! array      := '[' ws (value (ws ','? ws value)*)? ws ']'
//! ws         := (whitespace | '#' comment-to-eol)*
//! ```
//!
//! Literal alternatives are tried in a fixed order (string, ISO duration,
//! boolean, simple duration, size, long, double, float, integer) and each
//! one must end at a token boundary, so `1 minutes` is a duration while
//! `1 minutes-left` falls through to a plain integer.

use std::cell::Cell;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::{anychar, char, digit1, one_of, satisfy, space0, space1},
    combinator::{cut, eof, map, not, opt, recognize},
    error::{context, ContextError, ErrorKind, ParseError, VerboseError, VerboseErrorKind},
    multi::many0,
    sequence::{pair, terminated, tuple},
    IResult,
};
use tracing::debug;

use crate::ast::{
    Array, Config, Dictionary, DurationForm, Field, Identifier, Literal, LiteralKind, Span,
    ValueNode,
};
use crate::diagnostics::LineIndex;
use crate::error::ConfigError;
use crate::literal::{decode_string, PeriodField, DURATION_UNITS, SIZE_UNITS};

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Deepest allowed nesting of dictionaries and arrays, root included
pub const MAX_NESTING: usize = 128;

const BOOLEAN_WORDS: &[&str] = &[
    "true", "on", "enabled", "yes", "false", "off", "disabled", "no",
];

/// Parse a complete configuration document
pub fn parse_config(input: &str) -> Result<Config, ConfigError> {
    let parser = Parser {
        index: LineIndex::new(input),
        depth: Cell::new(0),
    };
    match parser.config(input) {
        Ok((_, config)) => {
            debug!(fields = config.field_count(), "Parsed configuration");
            Ok(config)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(parser.syntax_error(e)),
        Err(nom::Err::Incomplete(_)) => Err(parser.error_at("", "more input", "end of input")),
    }
}

/// Holds the source index so every node can be given an absolute span
struct Parser<'a> {
    index: LineIndex<'a>,
    depth: Cell<usize>,
}

/// One open dictionary or array; closes on drop
struct Nesting<'p> {
    depth: &'p Cell<usize>,
}

impl Drop for Nesting<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl<'a> Parser<'a> {
    // =========================================================================
    // STRUCTURE
    // =========================================================================

    fn config(&self, input: &'a str) -> PResult<'a, Config> {
        let (input, _) = ws(input)?;
        let (input, root) = context("'{'", |i| self.dictionary(i))(input)?;
        let (input, _) = ws(input)?;
        let (input, _) = context("end of input", eof)(input)?;
        Ok((input, Config { root }))
    }

    fn dictionary(&self, input: &'a str) -> PResult<'a, Dictionary> {
        let start = input;
        let (mut input, _) = char('{')(input)?;
        let _nesting = self.open(start)?;
        let mut fields = Vec::new();
        let mut after_separator = false;

        loop {
            let (rest, _) = ws(input)?;
            input = rest;
            match self.field(input) {
                Ok((rest, field)) => {
                    fields.push(field);
                    input = rest;
                }
                Err(nom::Err::Error(e)) if after_separator => {
                    return Err(nom::Err::Failure(VerboseError::add_context(
                        input,
                        "field name",
                        e,
                    )));
                }
                Err(nom::Err::Error(_)) => break,
                Err(e) => return Err(e),
            }
            let (rest, _) = ws(input)?;
            input = rest;
            let (rest, separator) = opt(char(','))(input)?;
            input = rest;
            after_separator = separator.is_some();
        }

        let (input, _) = cut(context("'}'", char('}')))(input)?;
        Ok((
            input,
            Dictionary {
                fields,
                span: self.span(start, input),
            },
        ))
    }

    fn field(&self, input: &'a str) -> PResult<'a, Field> {
        let start = input;
        let (input, name) = self.field_name(input)?;
        let (input, _) = ws(input)?;
        let (input, _) = cut(context("':'", char(':')))(input)?;
        let (input, _) = ws(input)?;
        let (input, value) = cut(context("value", |i| self.value(i)))(input)?;
        Ok((
            input,
            Field {
                name,
                value,
                span: self.span(start, input),
            },
        ))
    }

    fn field_name(&self, input: &'a str) -> PResult<'a, Identifier> {
        if input.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(nom::Err::Failure(VerboseError::add_context(
                input,
                "field name not starting with a digit",
                VerboseError::from_error_kind(input, ErrorKind::Alpha),
            )));
        }
        let (rest, name) = alt((
            map(string_token, decode_string),
            map(identifier, str::to_string),
        ))(input)?;
        Ok((
            rest,
            Identifier {
                name,
                span: self.span(input, rest),
            },
        ))
    }

    fn value(&self, input: &'a str) -> PResult<'a, ValueNode> {
        alt((
            map(|i| self.dictionary(i), ValueNode::Dictionary),
            map(|i| self.array(i), ValueNode::Array),
            map(|i| self.literal(i), ValueNode::Literal),
        ))(input)
    }

    fn array(&self, input: &'a str) -> PResult<'a, Array> {
        let start = input;
        let (mut input, _) = char('[')(input)?;
        let _nesting = self.open(start)?;
        let mut items = Vec::new();
        let mut after_separator = false;

        loop {
            let (rest, _) = ws(input)?;
            input = rest;
            match self.value(input) {
                Ok((rest, item)) => {
                    items.push(item);
                    input = rest;
                }
                Err(nom::Err::Error(e)) if after_separator => {
                    return Err(nom::Err::Failure(VerboseError::add_context(
                        input, "value", e,
                    )));
                }
                Err(nom::Err::Error(_)) => break,
                Err(e) => return Err(e),
            }
            let (rest, _) = ws(input)?;
            input = rest;
            let (rest, separator) = opt(char(','))(input)?;
            input = rest;
            after_separator = separator.is_some();
        }

        let (input, _) = cut(context("']'", char(']')))(input)?;
        Ok((
            input,
            Array {
                items,
                span: self.span(start, input),
            },
        ))
    }

    // =========================================================================
    // LITERALS
    // =========================================================================

    fn literal(&self, input: &'a str) -> PResult<'a, Literal> {
        let (rest, (kind, text)) = alt((
            map(string_token, |t| (LiteralKind::String, t)),
            map(iso_duration, |t| {
                (LiteralKind::Duration(DurationForm::Iso8601), t)
            }),
            map(boolean, |t| (LiteralKind::Boolean, t)),
            map(simple_duration, |t| {
                (LiteralKind::Duration(DurationForm::Simple), t)
            }),
            map(size, |t| (LiteralKind::Size, t)),
            map(long, |t| (LiteralKind::Long, t)),
            map(double, |t| (LiteralKind::Double, t)),
            map(float, |t| (LiteralKind::Float, t)),
            map(integer, |t| (LiteralKind::Integer, t)),
        ))(input)?;
        Ok((
            rest,
            Literal {
                kind,
                text: text.to_string(),
                span: self.span(input, rest),
            },
        ))
    }

    // =========================================================================
    // POSITIONS & ERRORS
    // =========================================================================

    fn open(&self, at: &'a str) -> Result<Nesting<'_>, nom::Err<VerboseError<&'a str>>> {
        let depth = self.depth.get() + 1;
        if depth > MAX_NESTING {
            return Err(nom::Err::Failure(VerboseError::add_context(
                at,
                "at most 128 levels of nesting",
                VerboseError::from_error_kind(at, ErrorKind::TooLarge),
            )));
        }
        self.depth.set(depth);
        Ok(Nesting { depth: &self.depth })
    }

    fn span(&self, start: &'a str, rest: &'a str) -> Span {
        let begin = self.index.offset_of(start);
        let end = self.index.offset_of(rest);
        let (line, column) = self.index.line_col(begin);
        Span::new(begin, end, line, column)
    }

    fn syntax_error(&self, error: VerboseError<&'a str>) -> ConfigError {
        let at = error.errors.first().map(|(at, _)| *at).unwrap_or("");
        let expected = error
            .errors
            .iter()
            .find_map(|(_, kind)| match kind {
                VerboseErrorKind::Context(ctx) => Some(ctx.to_string()),
                _ => None,
            })
            .or_else(|| {
                error.errors.iter().find_map(|(_, kind)| match kind {
                    VerboseErrorKind::Char(c) => Some(format!("'{c}'")),
                    _ => None,
                })
            })
            .unwrap_or_else(|| "a valid token".to_string());
        self.error_at(at, &expected, &describe_found(at))
    }

    fn error_at(&self, at: &str, expected: &str, found: &str) -> ConfigError {
        let (line, column) = self.index.line_col(self.index.offset_of(at));
        ConfigError::Syntax {
            message: format!("expected {expected}, found {found}"),
            line,
            column,
        }
    }
}

fn describe_found(at: &str) -> String {
    if at.is_empty() {
        return "end of input".to_string();
    }
    let token: String = at
        .chars()
        .take_while(|c| !c.is_whitespace())
        .take(16)
        .collect();
    format!("'{token}'")
}

// =============================================================================
// LEXICAL HELPERS
// =============================================================================

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

/// Succeeds without consuming when the next char cannot continue a token
fn boundary(input: &str) -> PResult<'_, ()> {
    not(satisfy(is_word_char))(input)
}

fn comment(input: &str) -> PResult<'_, &str> {
    recognize(pair(char('#'), take_while(|c| c != '\n')))(input)
}

/// Whitespace and comments
fn ws(input: &str) -> PResult<'_, ()> {
    map(
        many0(alt((
            recognize(satisfy(char::is_whitespace)),
            comment,
        ))),
        |_| (),
    )(input)
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_identifier_char),
    ))(input)
}

/// Quoted string, returned with its quotes and escapes intact
fn string_token(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        char('"'),
        cut(context(
            "closing '\"'",
            terminated(
                many0(alt((is_not("\"\\"), recognize(pair(char('\\'), anychar))))),
                char('"'),
            ),
        )),
    ))(input)
}

fn iso_duration(input: &str) -> PResult<'_, &str> {
    terminated(
        recognize(pair(
            char('P'),
            take_while(|c: char| c.is_ascii_digit() || "YMWDTHS.".contains(c)),
        )),
        boundary,
    )(input)
}

fn boolean(input: &str) -> PResult<'_, &str> {
    for word in BOOLEAN_WORDS {
        let attempt: PResult<'_, &str> = terminated(tag(*word), boundary)(input);
        if attempt.is_ok() {
            return attempt;
        }
    }
    Err(nom::Err::Error(VerboseError::from_error_kind(
        input,
        ErrorKind::Tag,
    )))
}

/// One or more `<digits> <unit>` pairs separated by spaces or tabs, with
/// units in strictly decreasing magnitude
fn simple_duration(input: &str) -> PResult<'_, &str> {
    let mut rest = input;
    let mut end = None;
    let mut last: Option<PeriodField> = None;

    while let Ok((after, unit)) = duration_pair(rest) {
        if last.is_some_and(|previous| unit <= previous) {
            break;
        }
        last = Some(unit);
        end = Some(after);
        match space1::<_, VerboseError<&str>>(after) {
            Ok((next, _)) => rest = next,
            Err(_) => break,
        }
    }

    match end {
        Some(end) => Ok((end, &input[..input.len() - end.len()])),
        None => Err(nom::Err::Error(VerboseError::from_error_kind(
            input,
            ErrorKind::Tag,
        ))),
    }
}

fn duration_pair(input: &str) -> PResult<'_, PeriodField> {
    let (input, _) = digit1(input)?;
    let (input, _) = space1(input)?;
    for (name, unit) in DURATION_UNITS {
        if let Some(rest) = input.strip_prefix(name) {
            if boundary(rest).is_ok() {
                return Ok((rest, *unit));
            }
        }
    }
    Err(nom::Err::Error(VerboseError::from_error_kind(
        input,
        ErrorKind::Tag,
    )))
}

fn size(input: &str) -> PResult<'_, &str> {
    let (after_number, _) = pair(digit1, space0)(input)?;
    for unit in SIZE_UNITS {
        if let Some(rest) = after_number.strip_prefix(unit) {
            if boundary(rest).is_ok() {
                return Ok((rest, &input[..input.len() - rest.len()]));
            }
        }
    }
    Err(nom::Err::Error(VerboseError::from_error_kind(
        after_number,
        ErrorKind::Tag,
    )))
}

fn decimal(input: &str) -> PResult<'_, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

fn long(input: &str) -> PResult<'_, &str> {
    terminated(recognize(tuple((digit1, space0, one_of("lL")))), boundary)(input)
}

fn double(input: &str) -> PResult<'_, &str> {
    terminated(recognize(tuple((decimal, space0, one_of("dD")))), boundary)(input)
}

/// Suffixed with `f`/`F`, or an unsuffixed decimal with a fractional part
fn float(input: &str) -> PResult<'_, &str> {
    terminated(
        alt((
            recognize(tuple((decimal, space0, one_of("fF")))),
            recognize(tuple((digit1, char('.'), digit1))),
        )),
        boundary,
    )(input)
}

fn integer(input: &str) -> PResult<'_, &str> {
    terminated(digit1, boundary)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_literal(src: &str) -> Literal {
        let config = parse_config(src).unwrap();
        let field = &config.root.fields[0];
        field.value.as_literal().cloned().unwrap()
    }

    fn syntax_position(src: &str) -> (String, u32, u32) {
        match parse_config(src).unwrap_err() {
            ConfigError::Syntax {
                message,
                line,
                column,
            } => (message, line, column),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_dictionary() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.field_count(), 0);
        let config = parse_config("  # leading comment\n{ }\n").unwrap();
        assert_eq!(config.field_count(), 0);
    }

    #[test]
    fn test_fields_with_and_without_commas() {
        let config = parse_config("{ a: 1, b: 2 c: 3 }").unwrap();
        let names: Vec<_> = config
            .root
            .fields
            .iter()
            .map(|f| f.name.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted_field_name() {
        let config = parse_config(r#"{ "a key": 1 }"#).unwrap();
        assert_eq!(config.root.fields[0].name.name, "a key");
    }

    #[test]
    fn test_identifier_with_dashes() {
        let config = parse_config("{ integer-value: 1 }").unwrap();
        assert!(config.root.field("integer-value").is_some());
    }

    #[test]
    fn test_literal_kinds() {
        let cases = [
            (r#"{ a: "x" }"#, LiteralKind::String),
            ("{ a: 1 }", LiteralKind::Integer),
            ("{ a: 1L }", LiteralKind::Long),
            ("{ a: 1 l }", LiteralKind::Long),
            ("{ a: 1.5 }", LiteralKind::Float),
            ("{ a: 2f }", LiteralKind::Float),
            ("{ a: 1.5d }", LiteralKind::Double),
            ("{ a: 2D }", LiteralKind::Double),
            ("{ a: true }", LiteralKind::Boolean),
            ("{ a: disabled }", LiteralKind::Boolean),
            ("{ a: 1 GB }", LiteralKind::Size),
            ("{ a: 512KiB }", LiteralKind::Size),
            ("{ a: 10 B }", LiteralKind::Size),
            (
                "{ a: 1 minutes }",
                LiteralKind::Duration(DurationForm::Simple),
            ),
            (
                "{ a: PT1M30S }",
                LiteralKind::Duration(DurationForm::Iso8601),
            ),
        ];
        for (src, kind) in cases {
            assert_eq!(only_literal(src).kind, kind, "{src}");
        }
    }

    #[test]
    fn test_multi_pair_duration_text() {
        let literal = only_literal("{ a: 1 hour 30 minutes }");
        assert_eq!(literal.kind, LiteralKind::Duration(DurationForm::Simple));
        assert_eq!(literal.text, "1 hour 30 minutes");
    }

    #[test]
    fn test_duration_units_out_of_order_stop_the_token() {
        // "30 minutes" then "1 hour" cannot be one duration
        let err = parse_config("{ a: 30 minutes 1 hour }").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }));
    }

    #[test]
    fn test_word_boundary_falls_back_to_integer() {
        let config = parse_config("{ a: 1 minutes-left: 2 }");
        // `minutes-left` is a field name, so `1` is an integer
        let config = config.unwrap();
        assert_eq!(
            config.root.fields[0].value.as_literal().unwrap().kind,
            LiteralKind::Integer
        );
        assert_eq!(config.root.fields[1].name.name, "minutes-left");
    }

    #[test]
    fn test_string_escapes_kept_in_token() {
        let literal = only_literal(r#"{ a: "say \"hi\"" }"#);
        assert_eq!(literal.text, r#""say \"hi\"""#);
    }

    #[test]
    fn test_nested_structures() {
        let config = parse_config("{ a: { b: [1, [2], { c: 3 }] } }").unwrap();
        let inner = config.root.fields[0].value.as_dictionary().unwrap();
        let array = inner.fields[0].value.as_array().unwrap();
        assert_eq!(array.items.len(), 3);
        assert!(array.items[1].as_array().is_some());
        assert!(array.items[2].as_dictionary().is_some());
    }

    #[test]
    fn test_comments_are_ignored() {
        let src = "{\n  # first\n  a: 1 # trailing\n  b: [1 # inner\n 2]\n}";
        let config = parse_config(src).unwrap();
        assert_eq!(config.field_count(), 2);
    }

    #[test]
    fn test_spans_are_one_based() {
        let config = parse_config("{\n  abc: 1\n}").unwrap();
        let field = &config.root.fields[0];
        assert_eq!((field.span.line, field.span.column), (2, 3));
        assert_eq!(field.name.span.len(), 3);
        let value = field.value.span();
        assert_eq!((value.line, value.column), (2, 8));
    }

    #[test]
    fn test_period_instead_of_comma() {
        let (message, line, column) = syntax_position(r#"{ a: "1". b: "2" }"#);
        assert_eq!((line, column), (1, 9));
        assert!(message.contains("'}'"), "{message}");
    }

    #[test]
    fn test_missing_closing_brace() {
        let (message, line, column) = syntax_position("{ a: 1");
        assert_eq!((line, column), (1, 7));
        assert!(message.contains("end of input"), "{message}");
    }

    #[test]
    fn test_duration_missing_closing_brace() {
        let (_, line, column) = syntax_position("{ a: 1 minutes: 2");
        assert_eq!((line, column), (1, 15));
    }

    #[test]
    fn test_digit_leading_name() {
        let (message, line, column) = syntax_position("{ 7: 1 }");
        assert_eq!((line, column), (1, 3));
        assert!(message.contains("field name"), "{message}");
    }

    #[test]
    fn test_trailing_comma_requires_field() {
        let (message, _, column) = syntax_position("{ a: 1, }");
        assert_eq!(column, 9);
        assert!(message.contains("field name"), "{message}");
    }

    #[test]
    fn test_root_must_be_dictionary() {
        let (message, _, _) = syntax_position("[1, 2]");
        assert!(message.contains("'{'"), "{message}");
        assert!(parse_config("").is_err());
    }

    #[test]
    fn test_trailing_input_rejected() {
        let (message, _, column) = syntax_position("{ a: 1 } x");
        assert_eq!(column, 10);
        assert!(message.contains("end of input"), "{message}");
    }

    #[test]
    fn test_unterminated_string() {
        let (message, _, _) = syntax_position(r#"{ a: "oops }"#);
        assert!(message.contains("closing"), "{message}");
    }

    fn nested_arrays(depth: usize) -> String {
        format!("{{ a: {}{} }}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn test_nesting_at_limit() {
        let config = parse_config(&nested_arrays(MAX_NESTING - 1)).unwrap();
        assert_eq!(config.field_count(), 1);
    }

    #[test]
    fn test_nesting_past_limit() {
        let (message, line, column) = syntax_position(&nested_arrays(MAX_NESTING));
        assert_eq!((line, column), (1, 6 + MAX_NESTING as u32 - 1));
        assert!(message.contains("levels of nesting"), "{message}");
    }

    #[test]
    fn test_deep_nesting_fails_without_overflow() {
        let src = format!("{{ a: {} }}", "{ b: ".repeat(5000));
        let (message, _, _) = syntax_position(&src);
        assert!(message.contains("levels of nesting"), "{message}");
    }
}
