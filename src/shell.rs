//! Command grammar and state of the interactive request-builder shell.
//!
//! Each input line is parsed (nom) into a [`Command`]; [`Shell`] applies it
//! to the request builder it carries or runs it against the database.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{anychar, char, digit1, multispace0, multispace1},
    combinator::{all_consuming, eof, map, map_res, opt, peek, recognize, rest, value},
    sequence::{pair, preceded, separated_pair, terminated, tuple},
};

use crate::core::{LibraryError, ResultSet};
use crate::db::DatabaseManager;
use crate::query::{
    AggregateFunction, ComparisonOperator, JoinQuery, JoinType, RequestBuilder, Search, SearchOperator,
    SortDirection, Subquery, SubqueryOperator, TextOperation, condition, validate_having,
};
use crate::render;
use crate::schema::validate::{column_ref, identifier};

pub const HELP: &str = "\
Building a query:
  from <table>                          source table
  select <expr>, <expr> | select *      projection
  where <column> <op> [value]           op: = != > < >= <= LIKE NOT LIKE IN NOT IN BETWEEN IS NULL IS NOT NULL
  exists <table> [where <cond>]         EXISTS (SELECT 1 ...), also: not exists
  subquery <column> <op> <table>.<column> [where <cond>]
                                        op: IN, NOT IN, ANY, ALL, = > < ..., > ANY, <= ALL ...
  group <column>                        GROUP BY (COUNT(*) is added unless aggregated)
  having <condition>                    must use COUNT/SUM/AVG/MIN/MAX
  agg <func> <column|*> [as <alias>]    COUNT SUM AVG MIN MAX
  order <column> [asc|desc]
  show | run | reset
Other:
  join <type> <left>.<col> <right>.<col> [where <column> <op> [value]]
  sql <select statement>
  tables | columns <table> | constraints <table>
  text <row> <column> <upper|lower|trim|ltrim|rtrim|substring s n|lpad n [c]|rpad n [c]|concat t|concat_op t>
  search <column> <like|~|~*|!~|!~*> <pattern>
                                        rows of the last result that match
  json on|off | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Tables,
    Columns(String),
    Constraints(String),
    From(String),
    Select(Vec<String>),
    Where {
        column: String,
        operator: ComparisonOperator,
        value: String,
    },
    Subquery(Subquery),
    GroupBy(String),
    Having(String),
    Aggregate {
        function: AggregateFunction,
        column: String,
        alias: Option<String>,
    },
    OrderBy(String, SortDirection),
    Show,
    Run,
    Reset,
    Join(JoinQuery),
    Sql(String),
    Text {
        row: usize,
        column: String,
        operation: TextOperation,
    },
    Search(Search),
    Json(bool),
}

/// A keyword followed by whitespace or the end of input.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(word), peek(alt((multispace1, eof))))
}

fn operator(input: &str) -> IResult<&str, ComparisonOperator> {
    use ComparisonOperator as Op;
    alt((
        value(
            Op::IsNotNull,
            tuple((keyword("IS"), multispace1, keyword("NOT"), multispace1, keyword("NULL"))),
        ),
        value(Op::IsNull, tuple((keyword("IS"), multispace1, keyword("NULL")))),
        value(Op::NotIn, tuple((keyword("NOT"), multispace1, keyword("IN")))),
        value(Op::NotLike, tuple((keyword("NOT"), multispace1, keyword("LIKE")))),
        value(Op::Between, keyword("BETWEEN")),
        value(Op::Like, keyword("LIKE")),
        value(Op::In, keyword("IN")),
        value(Op::Ge, tag(">=")),
        value(Op::Le, tag("<=")),
        value(Op::Ne, alt((tag("!="), tag("<>")))),
        value(Op::Eq, tag("=")),
        value(Op::Gt, tag(">")),
        value(Op::Lt, tag("<")),
    ))(input)
}

fn subquery_operator(input: &str) -> IResult<&str, SubqueryOperator> {
    let symbol = || alt((tag(">="), tag("<="), tag("!="), tag("<>"), tag("="), tag(">"), tag("<")));
    map_res(
        alt((
            recognize(tuple((keyword("NOT"), multispace1, keyword("IN")))),
            recognize(keyword("IN")),
            recognize(pair(
                symbol(),
                opt(preceded(multispace0, alt((keyword("ANY"), keyword("ALL"))))),
            )),
            recognize(keyword("ANY")),
            recognize(keyword("ALL")),
        )),
        str::parse::<SubqueryOperator>,
    )(input)
}

/// `(where <text>)?` at the end of a line.
fn where_tail(input: &str) -> IResult<&str, Option<String>> {
    map(
        opt(preceded(
            tuple((multispace1, keyword("WHERE"), multispace0)),
            rest,
        )),
        |cond: Option<&str>| cond.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
    )(input)
}

fn qualified(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(identifier, char('.'), identifier)(input)
}

fn number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}

fn where_clause(input: &str) -> IResult<&str, (String, ComparisonOperator, String)> {
    map(
        tuple((column_ref, multispace0, operator, multispace0, rest)),
        |(column, _, operator, _, value): (&str, _, _, _, &str)| {
            (column.to_string(), operator, value.trim().to_string())
        },
    )(input)
}

fn exists(input: &str) -> IResult<&str, Subquery> {
    map(
        tuple((
            opt(terminated(keyword("NOT"), multispace1)),
            keyword("EXISTS"),
            multispace1,
            identifier,
            where_tail,
        )),
        |(negated, _, _, table, cond)| {
            let operator = if negated.is_some() {
                SubqueryOperator::NotExists
            } else {
                SubqueryOperator::Exists
            };
            let correlated = cond.is_some();
            Subquery::new(operator, table, "")
                .filter(cond.unwrap_or_default())
                .correlated(correlated)
        },
    )(input)
}

/// `<outer> <op> <table>.<column> [where <cond>]`
fn nested_select(input: &str) -> IResult<&str, Subquery> {
    map(
        tuple((
            column_ref,
            multispace1,
            subquery_operator,
            multispace1,
            qualified,
            where_tail,
        )),
        |(outer, _, operator, _, (table, column), cond)| {
            Subquery::new(operator, table, column)
                .outer(outer)
                .filter(cond.unwrap_or_default())
        },
    )(input)
}

fn join(input: &str) -> IResult<&str, Command> {
    let join_type = alt((
        value(JoinType::Inner, keyword("INNER")),
        value(JoinType::Left, keyword("LEFT")),
        value(JoinType::Right, keyword("RIGHT")),
        value(JoinType::Full, keyword("FULL")),
    ));
    map(
        tuple((
            keyword("JOIN"),
            multispace1,
            join_type,
            multispace1,
            qualified,
            multispace1,
            qualified,
            opt(preceded(
                tuple((multispace1, keyword("WHERE"), multispace0)),
                where_clause,
            )),
        )),
        |(_, _, join_type, _, (left, left_col), _, (right, right_col), filter)| {
            let mut query = JoinQuery::new(left, left_col, right, right_col).join_type(join_type);
            if let Some((column, operator, value)) = filter {
                query = query.filter(column, operator, value);
            }
            Command::Join(query)
        },
    )(input)
}

fn text_operation(input: &str) -> IResult<&str, TextOperation> {
    let fill = || opt(preceded(multispace1, anychar));
    alt((
        value(TextOperation::Upper, keyword("UPPER")),
        value(TextOperation::Lower, keyword("LOWER")),
        value(TextOperation::LTrim, keyword("LTRIM")),
        value(TextOperation::RTrim, keyword("RTRIM")),
        value(TextOperation::Trim, keyword("TRIM")),
        map(
            tuple((keyword("SUBSTRING"), multispace1, number, multispace1, number)),
            |(_, _, start, _, length)| TextOperation::Substring { start, length },
        ),
        map(
            tuple((keyword("LPAD"), multispace1, number, fill())),
            |(_, _, length, fill)| TextOperation::LPad {
                length,
                fill: fill.unwrap_or(' '),
            },
        ),
        map(
            tuple((keyword("RPAD"), multispace1, number, fill())),
            |(_, _, length, fill)| TextOperation::RPad {
                length,
                fill: fill.unwrap_or(' '),
            },
        ),
        map(
            preceded(pair(keyword("CONCAT_OP"), multispace1), rest),
            |text: &str| TextOperation::ConcatOperator(text.to_string()),
        ),
        map(
            preceded(pair(keyword("CONCAT"), multispace1), rest),
            |text: &str| TextOperation::Concat(text.to_string()),
        ),
    ))(input)
}

fn text(input: &str) -> IResult<&str, Command> {
    map(
        tuple((
            keyword("TEXT"),
            multispace1,
            number,
            multispace1,
            identifier,
            multispace1,
            text_operation,
        )),
        |(_, _, row, _, column, _, operation)| Command::Text {
            row,
            column: column.to_string(),
            operation,
        },
    )(input)
}

fn search_operator(input: &str) -> IResult<&str, SearchOperator> {
    alt((
        value(SearchOperator::NotMatchesInsensitive, tag("!~*")),
        value(SearchOperator::NotMatches, tag("!~")),
        value(SearchOperator::MatchesInsensitive, tag("~*")),
        value(SearchOperator::Matches, tag("~")),
        value(SearchOperator::Like, keyword("LIKE")),
    ))(input)
}

fn search(input: &str) -> IResult<&str, Command> {
    map_res(
        tuple((
            keyword("SEARCH"),
            multispace1,
            identifier,
            multispace1,
            search_operator,
            opt(preceded(multispace1, rest)),
        )),
        |(_, _, column, _, operator, pattern)| {
            Search::new(column, operator, pattern.unwrap_or_default().trim()).map(Command::Search)
        },
    )(input)
}

fn aggregate(input: &str) -> IResult<&str, Command> {
    let function = map_res(identifier, str::parse::<AggregateFunction>);
    map(
        tuple((
            keyword("AGG"),
            multispace1,
            function,
            multispace1,
            alt((tag("*"), column_ref)),
            opt(preceded(tuple((multispace1, keyword("AS"), multispace1)), identifier)),
        )),
        |(_, _, function, _, column, alias)| Command::Aggregate {
            function,
            column: column.to_string(),
            alias: alias.map(str::to_string),
        },
    )(input)
}

fn order(input: &str) -> IResult<&str, Command> {
    let direction = alt((
        value(SortDirection::Asc, keyword("ASC")),
        value(SortDirection::Desc, keyword("DESC")),
    ));
    map(
        tuple((
            keyword("ORDER"),
            multispace1,
            column_ref,
            opt(preceded(multispace1, direction)),
        )),
        |(_, _, column, direction)| Command::OrderBy(column.to_string(), direction.unwrap_or_default()),
    )(input)
}

fn with_table<'a>(
    word: &'static str,
    build: fn(String) -> Command,
) -> impl FnMut(&'a str) -> IResult<&'a str, Command> {
    map(preceded(pair(keyword(word), multispace1), identifier), move |t: &str| {
        build(t.to_string())
    })
}

fn with_text<'a>(
    word: &'static str,
    build: fn(String) -> Command,
) -> impl FnMut(&'a str) -> IResult<&'a str, Command> {
    map(preceded(pair(keyword(word), multispace1), rest), move |t: &str| {
        build(t.trim().to_string())
    })
}

fn command(input: &str) -> IResult<&str, Command> {
    alt((
        alt((
            value(Command::Help, alt((keyword("HELP"), tag("?")))),
            value(Command::Quit, alt((keyword("QUIT"), keyword("EXIT"), tag("\\q")))),
            value(Command::Tables, keyword("TABLES")),
            value(Command::Show, keyword("SHOW")),
            value(Command::Run, keyword("RUN")),
            value(Command::Reset, keyword("RESET")),
            value(Command::Json(true), tuple((keyword("JSON"), multispace1, keyword("ON")))),
            value(Command::Json(false), tuple((keyword("JSON"), multispace1, keyword("OFF")))),
        )),
        with_table("COLUMNS", Command::Columns),
        with_table("CONSTRAINTS", Command::Constraints),
        with_table("FROM", Command::From),
        with_table("GROUP", Command::GroupBy),
        map(preceded(pair(keyword("SELECT"), multispace1), rest), |cols: &str| {
            Command::Select(split_columns(cols))
        }),
        map(
            preceded(pair(keyword("WHERE"), multispace1), where_clause),
            |(column, operator, value)| Command::Where {
                column,
                operator,
                value,
            },
        ),
        map(exists, Command::Subquery),
        map(
            preceded(pair(keyword("SUBQUERY"), multispace1), nested_select),
            Command::Subquery,
        ),
        with_text("HAVING", Command::Having),
        aggregate,
        order,
        join,
        with_text("SQL", Command::Sql),
        text,
        search,
    ))(input)
}

/// Split a projection on top-level commas; `*` alone means every column.
fn split_columns(text: &str) -> Vec<String> {
    let mut columns = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                columns.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    columns.push(current);
    columns
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && c != "*")
        .collect()
}

/// `<column> <op> [value]`, as accepted after `where`.
pub fn parse_condition(text: &str) -> Result<(String, ComparisonOperator, String), LibraryError> {
    all_consuming(preceded(multispace0, where_clause))(text)
        .map(|(_, parts)| parts)
        .map_err(|_| LibraryError::InvalidInput(format!("cannot parse condition '{}'", text.trim())))
}

/// `[not] exists <table> [where ...]` or `<column> <op> <table>.<column> [where ...]`.
pub fn parse_subquery(text: &str) -> Result<Subquery, LibraryError> {
    all_consuming(terminated(
        preceded(multispace0, alt((exists, nested_select))),
        multispace0,
    ))(text)
    .map(|(_, sub)| sub)
    .map_err(|_| LibraryError::InvalidInput(format!("cannot parse subquery '{}'", text.trim())))
}

pub fn parse_command(line: &str) -> Result<Command, LibraryError> {
    all_consuming(terminated(preceded(multispace0, command), multispace0))(line)
        .map(|(_, cmd)| cmd)
        .map_err(|_| LibraryError::InvalidInput(format!("cannot parse '{}'; type 'help'", line.trim())))
}

pub enum Outcome {
    Output(String),
    Quit,
}

/// Builder state carried between shell lines.
#[derive(Default)]
pub struct Shell {
    pub builder: RequestBuilder,
    pub last: Option<ResultSet>,
    pub json: bool,
}

impl Shell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn handle(&mut self, db: &mut DatabaseManager, line: &str) -> Result<Outcome, LibraryError> {
        let command = parse_command(line)?;
        self.apply(db, command).await
    }

    pub async fn apply(&mut self, db: &mut DatabaseManager, command: Command) -> Result<Outcome, LibraryError> {
        let output = match command {
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Outcome::Quit),
            Command::Tables => db.alter()?.get_tables().await.join("\n"),
            Command::Columns(table) => render::records(&db.alter()?.get_table_columns(&table).await),
            Command::Constraints(table) => {
                render::records(&db.alter()?.get_table_constraints(&table).await)
            }
            Command::From(table) => {
                self.builder.from_table(table);
                self.builder.build()
            }
            Command::Select(columns) => {
                self.builder.select(columns);
                self.builder.build()
            }
            Command::Where {
                column,
                operator,
                value,
            } => {
                self.builder.where_(condition(&column, operator, &value)?);
                self.builder.build()
            }
            Command::Subquery(sub) => {
                self.builder.where_(sub.render()?);
                self.builder.build()
            }
            Command::GroupBy(column) => {
                self.builder.group_by(column);
                self.builder.build()
            }
            Command::Having(cond) => {
                self.builder.having(validate_having(&cond)?);
                self.builder.build()
            }
            Command::Aggregate {
                function,
                column,
                alias,
            } => {
                match alias {
                    Some(alias) => self.builder.aggregate_as(function, column, alias),
                    None => self.builder.aggregate(function, column),
                };
                self.builder.build()
            }
            Command::OrderBy(column, direction) => {
                self.builder.order_by(column, direction);
                self.builder.build()
            }
            Command::Show => self.builder.build(),
            Command::Reset => {
                self.builder.reset();
                "Query reset".to_string()
            }
            Command::Run => {
                if self.builder.table().is_empty() {
                    return Err(LibraryError::InvalidInput("choose a table with 'from' first".to_string()));
                }
                let sql = self.builder.build();
                self.run(db, &sql).await?
            }
            Command::Join(query) => {
                let sql = query.build()?;
                self.run(db, &sql).await?
            }
            Command::Sql(sql) => self.run(db, &sql).await?,
            Command::Text {
                row,
                column,
                operation,
            } => self.text(row, &column, &operation)?,
            Command::Search(search) => {
                let found = search.filter_result_set(self.last()?)?;
                self.show(&found)?
            }
            Command::Json(on) => {
                self.json = on;
                format!("JSON output {}", if on { "on" } else { "off" })
            }
        };
        Ok(Outcome::Output(output))
    }

    async fn run(&mut self, db: &mut DatabaseManager, sql: &str) -> Result<String, LibraryError> {
        let rs = db.execute_custom_request(sql).await?;
        let output = self.show(&rs)?;
        self.last = Some(rs);
        Ok(output)
    }

    fn show(&self, rs: &ResultSet) -> Result<String, LibraryError> {
        if self.json {
            render::result_set_json(rs)
        } else {
            Ok(render::result_set(rs))
        }
    }

    fn last(&self) -> Result<&ResultSet, LibraryError> {
        self.last
            .as_ref()
            .ok_or_else(|| LibraryError::InvalidInput("no result yet; use 'run' first".to_string()))
    }

    fn text(&self, row: usize, column: &str, operation: &TextOperation) -> Result<String, LibraryError> {
        let rs = self.last()?;
        let idx = rs
            .column_index(column)
            .ok_or_else(|| LibraryError::InvalidInput(format!("no column '{column}' in the last result")))?;
        let cell = row
            .checked_sub(1)
            .and_then(|r| rs.rows.get(r))
            .and_then(|r| r.get(idx))
            .ok_or_else(|| LibraryError::InvalidInput(format!("row {row} is out of range")))?;
        Ok(operation.apply(&cell.display_cell()))
    }
}
