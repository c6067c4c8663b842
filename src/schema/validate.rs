//! nom parsers that gate user text before it is spliced into DDL.
//!
//! Identifiers, type names and DEFAULT literals cannot be bound as statement
//! parameters, so each one is parsed and re-rendered from the parsed form.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, tag_no_case, take_while},
    character::complete::{char, digit1, multispace0, multispace1, satisfy},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
};

use crate::core::{DataType, LibraryError};

/// PostgreSQL truncates longer names (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

pub fn validate_identifier(name: &str) -> Result<&str, LibraryError> {
    match all_consuming(identifier)(name) {
        Ok((_, ident)) if ident.len() <= MAX_IDENTIFIER_LEN => Ok(ident),
        _ => Err(LibraryError::InvalidIdentifier(name.to_string())),
    }
}

/// `column` or `table.column`, as the query forms reference columns.
pub fn column_ref(input: &str) -> IResult<&str, &str> {
    recognize(pair(identifier, opt(pair(char('.'), identifier))))(input)
}

pub fn validate_column_ref(name: &str) -> Result<&str, LibraryError> {
    match all_consuming(ws(column_ref))(name) {
        Ok((_, column)) => Ok(column),
        Err(_) => Err(LibraryError::InvalidIdentifier(name.to_string())),
    }
}

fn length(input: &str) -> IResult<&str, usize> {
    delimited(
        ws(char('(')),
        map_res(digit1, str::parse::<usize>),
        ws(char(')')),
    )(input)
}

fn numeric(input: &str) -> IResult<&str, DataType> {
    map(
        pair(
            alt((tag_no_case("NUMERIC"), tag_no_case("DECIMAL"))),
            opt(delimited(
                ws(char('(')),
                pair(
                    map_res(digit1, str::parse::<u8>),
                    opt(preceded(ws(char(',')), map_res(digit1, str::parse::<u8>))),
                ),
                ws(char(')')),
            )),
        ),
        |(_, params)| match params {
            Some((precision, scale)) => DataType::Numeric {
                precision,
                scale: scale.unwrap_or(0),
            },
            None => DataType::Numeric { precision: 10, scale: 0 },
        },
    )(input)
}

fn varchar(input: &str) -> IResult<&str, DataType> {
    map(
        pair(
            alt((
                tag_no_case("VARCHAR"),
                recognize(tuple((tag_no_case("CHARACTER"), multispace1, tag_no_case("VARYING")))),
            )),
            opt(length),
        ),
        |(_, len)| DataType::Varchar {
            max_length: len.unwrap_or(255),
        },
    )(input)
}

fn fixed_char(input: &str) -> IResult<&str, DataType> {
    map(
        pair(alt((tag_no_case("CHARACTER"), tag_no_case("CHAR"))), opt(length)),
        |(_, len)| DataType::Char {
            length: len.unwrap_or(1),
        },
    )(input)
}

fn timestamp(input: &str) -> IResult<&str, DataType> {
    alt((
        value(DataType::TimestampTz, tag_no_case("TIMESTAMPTZ")),
        value(
            DataType::TimestampTz,
            tuple((
                tag_no_case("TIMESTAMP"),
                multispace1,
                tag_no_case("WITH"),
                multispace1,
                tag_no_case("TIME"),
                multispace1,
                tag_no_case("ZONE"),
            )),
        ),
        value(DataType::Timestamp, tag_no_case("TIMESTAMP")),
    ))(input)
}

pub fn data_type(input: &str) -> IResult<&str, DataType> {
    alt((
        // Auto-increment types
        value(DataType::BigSerial, tag_no_case("BIGSERIAL")),
        value(DataType::Serial, tag_no_case("SERIAL")),
        numeric,
        // Integer types
        value(DataType::SmallInt, alt((tag_no_case("SMALLINT"), tag_no_case("INT2")))),
        value(DataType::BigInt, alt((tag_no_case("BIGINT"), tag_no_case("INT8")))),
        value(
            DataType::Integer,
            alt((tag_no_case("INTEGER"), tag_no_case("INT4"), tag_no_case("INT"))),
        ),
        // Floating point; FLOAT4 must be tried before bare FLOAT
        value(DataType::Real, alt((tag_no_case("REAL"), tag_no_case("FLOAT4")))),
        value(
            DataType::DoublePrecision,
            alt((
                recognize(tuple((tag_no_case("DOUBLE"), multispace1, tag_no_case("PRECISION")))),
                tag_no_case("FLOAT8"),
                tag_no_case("FLOAT"),
            )),
        ),
        // String types
        varchar,
        fixed_char,
        value(DataType::Text, tag_no_case("TEXT")),
        value(DataType::Boolean, alt((tag_no_case("BOOLEAN"), tag_no_case("BOOL")))),
        // Date/Time types
        timestamp,
        value(DataType::Date, tag_no_case("DATE")),
        // Special types
        value(DataType::Uuid, tag_no_case("UUID")),
        value(DataType::Jsonb, tag_no_case("JSONB")),
        value(DataType::Json, tag_no_case("JSON")),
        value(DataType::Bytea, tag_no_case("BYTEA")),
    ))(input)
}

/// Parse a column type name; the canonical rendering is `DataType`'s `Display`.
pub fn parse_data_type(text: &str) -> Result<DataType, LibraryError> {
    all_consuming(ws(data_type))(text)
        .map(|(_, ty)| ty)
        .map_err(|_| LibraryError::InvalidInput(format!("unsupported column type '{}'", text.trim())))
}

/// Body of a single-quoted literal with `''` escapes, unescaped.
pub fn string_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        map(
            many0(alt((value("'", tag("''")), is_not("'")))),
            |parts: Vec<&str>| parts.concat(),
        ),
        char('\''),
    )(input)
}

fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)
}

fn default_literal(input: &str) -> IResult<&str, String> {
    alt((
        value("NULL".to_string(), tag_no_case("NULL")),
        value("TRUE".to_string(), tag_no_case("TRUE")),
        value("FALSE".to_string(), tag_no_case("FALSE")),
        value("CURRENT_TIMESTAMP".to_string(), tag_no_case("CURRENT_TIMESTAMP")),
        value("CURRENT_DATE".to_string(), tag_no_case("CURRENT_DATE")),
        value(
            "NOW()".to_string(),
            tuple((tag_no_case("NOW"), ws(char('(')), char(')'))),
        ),
        map(number, str::to_string),
        map(string_literal, |s| quote_literal(&s)),
    ))(input)
}

/// Check a DEFAULT expression and return its canonical SQL text.
pub fn parse_default(text: &str) -> Result<String, LibraryError> {
    all_consuming(ws(default_literal))(text)
        .map(|(_, literal)| literal)
        .map_err(|_| LibraryError::InvalidInput(format!("unsupported default value '{}'", text.trim())))
}

/// `name` as a double-quoted identifier.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `text` as a single-quoted string literal.
#[must_use]
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert_eq!(validate_identifier("books").unwrap(), "books");
        assert_eq!(validate_identifier("_tmp_2").unwrap(), "_tmp_2");
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2books").is_err());
        assert!(validate_identifier("books; DROP TABLE readers").is_err());
        assert!(validate_identifier("title\"").is_err());
        assert!(validate_identifier(&"x".repeat(64)).is_err());
        assert_eq!(validate_column_ref(" books.title ").unwrap(), "books.title");
        assert!(validate_column_ref("books.").is_err());
        assert!(validate_column_ref("a.b.c").is_err());
        assert!(matches!(
            validate_identifier("bad name"),
            Err(LibraryError::InvalidIdentifier(name)) if name == "bad name"
        ));
    }

    #[test]
    fn test_data_types_render_canonically() {
        let cases = [
            ("integer", "INTEGER"),
            ("int", "INTEGER"),
            ("BIGINT", "BIGINT"),
            ("varchar(100)", "VARCHAR(100)"),
            ("character varying (40)", "VARCHAR(40)"),
            ("char(2)", "CHAR(2)"),
            ("numeric(10,2)", "NUMERIC(10, 2)"),
            ("decimal", "NUMERIC(10, 0)"),
            ("double precision", "DOUBLE PRECISION"),
            ("bool", "BOOLEAN"),
            ("float4", "REAL"),
            ("float", "DOUBLE PRECISION"),
            ("timestamp with time zone", "TIMESTAMPTZ"),
            ("  date ", "DATE"),
            ("jsonb", "JSONB"),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_data_type(input).unwrap().to_string(), expected, "{input}");
        }
    }

    #[test]
    fn test_data_type_rejects_trailing_sql() {
        assert!(parse_data_type("INTEGER; DROP TABLE books").is_err());
        assert!(parse_data_type("VARCHAR(abc)").is_err());
        assert!(parse_data_type("geometry").is_err());
        assert!(parse_data_type("").is_err());
    }

    #[test]
    fn test_default_literals() {
        assert_eq!(parse_default("null").unwrap(), "NULL");
        assert_eq!(parse_default("true").unwrap(), "TRUE");
        assert_eq!(parse_default("-12.5").unwrap(), "-12.5");
        assert_eq!(parse_default("'unknown'").unwrap(), "'unknown'");
        assert_eq!(parse_default("'O''Brien'").unwrap(), "'O''Brien'");
        assert_eq!(parse_default("''").unwrap(), "''");
        assert_eq!(parse_default("current_date").unwrap(), "CURRENT_DATE");
        assert_eq!(parse_default("now ( )").unwrap(), "NOW()");
    }

    #[test]
    fn test_default_rejects_expressions() {
        assert!(parse_default("1; DROP TABLE books").is_err());
        assert!(parse_default("'open").is_err());
        assert!(parse_default("'a' || 'b'").is_err());
        assert!(parse_default("pg_sleep(10)").is_err());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("library"), "\"library\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }
}
