use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use libris::config::{AppConfig, Overrides};
use libris::core::{BookAuthor, ConstraintKind, ForeignKey, LibraryError, NewAuthor, NewBook, NewIssue, NewReader};
use libris::logging::{self, StderrSink};
use libris::query::{
    AggregateFunction, JoinQuery, JoinType, RequestBuilder, Search, SearchOperator, SortDirection, condition,
    validate_having,
};
use libris::shell::{parse_condition, parse_subquery};
use libris::{AlterOutcome, DatabaseManager, render};

/// Library catalogue client for PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "libris", version)]
#[command(about = "Library catalogue administration over PostgreSQL", long_about = None)]
struct Cli {
    /// Server host
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Server port
    #[arg(short = 'p', long, global = true)]
    port: Option<u16>,

    /// Database name
    #[arg(short = 'd', long, global = true)]
    database: Option<String>,

    /// Database user
    #[arg(short = 'U', long, global = true)]
    user: Option<String>,

    #[arg(short = 'W', long, global = true)]
    password: Option<String>,

    /// Config file (default: ./libris.toml, then <config dir>/libris/libris.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `libris=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Echo log records to stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            log_file: self.log_file.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database if missing, then the tables
    Init {
        #[arg(long)]
        sample_data: bool,
    },
    /// Create the database through the maintenance database
    CreateDb,
    /// Empty every table and reload the sample data
    ResetData,
    /// Drop and recreate every table
    ResetSchema,
    #[command(subcommand)]
    Authors(AuthorCommand),
    #[command(subcommand)]
    Books(BookCommand),
    #[command(subcommand)]
    Readers(ReaderCommand),
    #[command(subcommand)]
    Issues(IssueCommand),
    #[command(subcommand)]
    BookAuthors(BookAuthorCommand),
    /// Build and run a SELECT
    Query(QueryArgs),
    /// Run a two-table join
    Join(JoinArgs),
    /// List tables of the public schema
    Tables,
    Columns { table: String },
    Constraints { table: String },
    #[command(subcommand)]
    Alter(AlterCommand),
    /// Run a SELECT statement as written
    Sql { statement: String },
}

/// Row filter shared by every `list`
#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// Column to search, as shown in the listing header
    #[arg(long, requires = "search")]
    column: Option<String>,
    /// LIKE matches a case-insensitive substring, the other operators a regular expression
    #[arg(long, requires = "column")]
    search: Option<String>,
    /// LIKE, ~, ~*, !~ or !~*
    #[arg(long, default_value = "like")]
    op: SearchOperator,
}

impl SearchArgs {
    fn apply<T: render::Record>(&self, items: Vec<T>) -> Result<Vec<T>, LibraryError> {
        match (&self.column, &self.search) {
            (Some(column), Some(pattern)) => Search::new(column, self.op, pattern.as_str())?.filter_records(items),
            _ => Ok(items),
        }
    }
}

#[derive(clap::Args, Debug)]
struct AuthorFields {
    last_name: String,
    first_name: String,
    #[arg(long)]
    patronymic: Option<String>,
    #[arg(long)]
    birth_year: Option<i32>,
    #[arg(long)]
    country: Option<String>,
}

impl From<AuthorFields> for NewAuthor {
    fn from(f: AuthorFields) -> Self {
        Self {
            last_name: f.last_name,
            first_name: f.first_name,
            patronymic: f.patronymic,
            birth_year: f.birth_year,
            country: f.country,
        }
    }
}

#[derive(Subcommand, Debug)]
enum AuthorCommand {
    List(SearchArgs),
    Add(AuthorFields),
    Update {
        id: i32,
        #[command(flatten)]
        fields: AuthorFields,
    },
    Delete { id: i32 },
}

#[derive(clap::Args, Debug)]
struct BookFields {
    title: String,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    isbn: Option<String>,
    #[arg(long, default_value_t = 1)]
    copies: i32,
}

impl From<BookFields> for NewBook {
    fn from(f: BookFields) -> Self {
        Self {
            title: f.title,
            publication_year: f.year,
            genre: f.genre,
            isbn: f.isbn,
            available_copies: f.copies,
        }
    }
}

#[derive(Subcommand, Debug)]
enum BookCommand {
    List(SearchArgs),
    Add(BookFields),
    Update {
        id: i32,
        #[command(flatten)]
        fields: BookFields,
    },
    Delete { id: i32 },
}

#[derive(clap::Args, Debug)]
struct ReaderFields {
    last_name: String,
    first_name: String,
    ticket_number: String,
    #[arg(long)]
    patronymic: Option<String>,
    /// YYYY-MM-DD; the server date when omitted
    #[arg(long)]
    registered: Option<NaiveDate>,
}

impl From<ReaderFields> for NewReader {
    fn from(f: ReaderFields) -> Self {
        Self {
            last_name: f.last_name,
            first_name: f.first_name,
            patronymic: f.patronymic,
            ticket_number: f.ticket_number,
            registration_date: f.registered,
        }
    }
}

#[derive(Subcommand, Debug)]
enum ReaderCommand {
    List(SearchArgs),
    Add(ReaderFields),
    Update {
        id: i32,
        #[command(flatten)]
        fields: ReaderFields,
    },
    Delete { id: i32 },
}

#[derive(clap::Args, Debug)]
struct IssueFields {
    book_id: i32,
    reader_id: i32,
    /// YYYY-MM-DD; today when omitted
    #[arg(long)]
    issued: Option<NaiveDate>,
    #[arg(long)]
    returned: Option<NaiveDate>,
}

impl From<IssueFields> for NewIssue {
    fn from(f: IssueFields) -> Self {
        Self::new(
            f.book_id,
            f.reader_id,
            f.issued.unwrap_or_else(|| Local::now().date_naive()),
            f.returned,
        )
    }
}

#[derive(Subcommand, Debug)]
enum IssueCommand {
    List(SearchArgs),
    Add(IssueFields),
    Update {
        id: i32,
        #[command(flatten)]
        fields: IssueFields,
    },
    Delete { id: i32 },
}

#[derive(Subcommand, Debug)]
enum BookAuthorCommand {
    List(SearchArgs),
    Add { book_id: i32, author_id: i32 },
    Update {
        book_id: i32,
        author_id: i32,
        new_book_id: i32,
        new_author_id: i32,
    },
    Delete { book_id: i32, author_id: i32 },
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    table: String,
    /// Projected expression; repeat for several
    #[arg(short = 's', long = "select")]
    select: Vec<String>,
    /// `<column> <op> [value]`; repeated filters are joined with AND
    #[arg(short = 'w', long = "where")]
    filter: Vec<String>,
    /// `[not] exists <table> [where ...]` or `<column> <op> <table>.<column> [where ...]`
    #[arg(long)]
    subquery: Vec<String>,
    #[arg(short, long)]
    group_by: Vec<String>,
    #[arg(long)]
    having: Vec<String>,
    /// `<column> [asc|desc]`
    #[arg(short, long)]
    order_by: Vec<String>,
    /// COUNT, SUM, AVG, MIN or MAX
    #[arg(long, requires = "agg_column")]
    agg: Option<AggregateFunction>,
    #[arg(long)]
    agg_column: Option<String>,
    #[arg(long, requires = "agg")]
    alias: Option<String>,
    /// Print the statement without running it
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args, Debug)]
struct JoinArgs {
    /// INNER, LEFT, RIGHT or FULL
    join_type: JoinType,
    /// `<table>.<column>`
    left: String,
    /// `<table>.<column>`
    right: String,
    /// Qualified column to show; repeat for several
    #[arg(long)]
    column: Vec<String>,
    /// `<column> <op> [value]`; LIKE matches anywhere in the text
    #[arg(short = 'w', long = "where")]
    filter: Option<String>,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum AlterCommand {
    AddColumn {
        table: String,
        column: String,
        data_type: String,
        #[arg(long)]
        not_null: bool,
        #[arg(long)]
        default: Option<String>,
    },
    DropColumn { table: String, column: String },
    RenameTable { old_name: String, new_name: String },
    RenameColumn {
        table: String,
        old_name: String,
        new_name: String,
    },
    ModifyType {
        table: String,
        column: String,
        new_type: String,
    },
    /// UNIQUE / PRIMARY KEY take a column list, CHECK an expression
    AddConstraint {
        table: String,
        kind: ConstraintKind,
        name: String,
        definition: String,
    },
    DropConstraint { table: String, name: String },
    SetNullable {
        table: String,
        column: String,
        #[arg(action = clap::ArgAction::Set)]
        nullable: bool,
    },
    AddForeignKey {
        table: String,
        column: String,
        /// `<table>.<column>`
        references: String,
        #[arg(long)]
        name: Option<String>,
    },
}

fn split_qualified(text: &str) -> Result<(&str, &str), LibraryError> {
    text.split_once('.')
        .ok_or_else(|| LibraryError::InvalidInput(format!("expected <table>.<column>, got '{text}'")))
}

fn listing<T: render::Record + serde::Serialize>(items: &[T], json: bool) -> Result<String, LibraryError> {
    if json {
        render::records_json(items)
    } else {
        Ok(render::records(items))
    }
}

fn build_query(args: &QueryArgs) -> Result<String, LibraryError> {
    let mut builder = RequestBuilder::new();
    builder.from_table(args.table.as_str()).select(args.select.iter().cloned());
    for text in &args.filter {
        let (column, operator, value) = parse_condition(text)?;
        builder.where_(condition(&column, operator, &value)?);
    }
    for text in &args.subquery {
        builder.where_(parse_subquery(text)?.render()?);
    }
    for column in &args.group_by {
        builder.group_by(column.as_str());
    }
    for text in &args.having {
        builder.having(validate_having(text)?);
    }
    for text in &args.order_by {
        let (column, direction) = match text.trim().rsplit_once(char::is_whitespace) {
            Some((column, dir)) => (column.trim(), dir.parse::<SortDirection>()?),
            None => (text.trim(), SortDirection::Asc),
        };
        builder.order_by(column, direction);
    }
    if let (Some(function), Some(column)) = (args.agg, &args.agg_column) {
        match &args.alias {
            Some(alias) => builder.aggregate_as(function, column.as_str(), alias.as_str()),
            None => builder.aggregate(function, column.as_str()),
        };
    }
    Ok(builder.build())
}

fn build_join(args: &JoinArgs) -> Result<String, LibraryError> {
    let (left, left_column) = split_qualified(&args.left)?;
    let (right, right_column) = split_qualified(&args.right)?;
    let mut query = JoinQuery::new(left, left_column, right, right_column)
        .join_type(args.join_type)
        .columns(args.column.iter().cloned());
    if let Some(text) = &args.filter {
        let (column, operator, value) = parse_condition(text)?;
        query = query.filter(column, operator, value);
    }
    query.build()
}

async fn select(db: &mut DatabaseManager, sql: &str, json: bool) -> Result<String, LibraryError> {
    let rs = db.execute_custom_request(sql).await?;
    if json {
        render::result_set_json(&rs)
    } else {
        Ok(render::result_set(&rs))
    }
}

fn into_result(outcome: AlterOutcome) -> Result<String, Box<dyn std::error::Error>> {
    if outcome.success {
        Ok(outcome.message)
    } else {
        Err(outcome.message.into())
    }
}

async fn alter(db: &mut DatabaseManager, command: AlterCommand) -> Result<String, Box<dyn std::error::Error>> {
    let mut manager = db.alter()?;
    let result = match command {
        AlterCommand::AddColumn {
            table,
            column,
            data_type,
            not_null,
            default,
        } => {
            manager
                .add_column(&table, &column, &data_type, !not_null, default.as_deref())
                .await
        }
        AlterCommand::DropColumn { table, column } => manager.drop_column(&table, &column).await,
        AlterCommand::RenameTable { old_name, new_name } => manager.rename_table(&old_name, &new_name).await,
        AlterCommand::RenameColumn {
            table,
            old_name,
            new_name,
        } => manager.rename_column(&table, &old_name, &new_name).await,
        AlterCommand::ModifyType {
            table,
            column,
            new_type,
        } => manager.modify_column_type(&table, &column, &new_type).await,
        AlterCommand::AddConstraint {
            table,
            kind,
            name,
            definition,
        } => manager.add_constraint(&table, kind, &name, &definition).await,
        AlterCommand::DropConstraint { table, name } => manager.drop_constraint(&table, &name).await,
        AlterCommand::SetNullable {
            table,
            column,
            nullable,
        } => manager.set_column_nullable(&table, &column, nullable).await,
        AlterCommand::AddForeignKey {
            table,
            column,
            references,
            name,
        } => {
            let (referenced_table, referenced_column) = split_qualified(&references)?;
            let reference = ForeignKey {
                referenced_table: referenced_table.to_string(),
                referenced_column: referenced_column.to_string(),
            };
            manager
                .add_foreign_key(&table, &column, &reference, name.as_deref())
                .await
        }
    };
    into_result(result)
}

async fn run(db: &mut DatabaseManager, command: Command, json: bool) -> Result<String, Box<dyn std::error::Error>> {
    let output = match command {
        Command::Init { sample_data } => {
            db.create_schema().await?;
            if sample_data {
                db.init_sample_data().await?;
                "Schema created, sample data loaded".to_string()
            } else {
                "Schema created".to_string()
            }
        }
        Command::CreateDb => {
            let name = db.connection_params().map(|p| p.database.clone()).unwrap_or_default();
            if db.create_database().await? {
                format!("Database {name} created")
            } else {
                format!("Database {name} already exists")
            }
        }
        Command::ResetData => {
            db.reset_database().await?;
            "All tables emptied and sample data reloaded".to_string()
        }
        Command::ResetSchema => {
            db.reset_schema().await?;
            "Tables dropped and recreated".to_string()
        }

        Command::Authors(cmd) => match cmd {
            AuthorCommand::List(search) => listing(&search.apply(db.get_authors().await?)?, json)?,
            AuthorCommand::Add(fields) => {
                let id = db.add_author(&fields.into()).await?;
                format!("Added author with ID {id}")
            }
            AuthorCommand::Update { id, fields } => {
                db.update_author(id, &fields.into()).await?;
                format!("Updated author with ID {id}")
            }
            AuthorCommand::Delete { id } => {
                db.delete_author(id).await?;
                format!("Deleted author with ID {id}")
            }
        },
        Command::Books(cmd) => match cmd {
            BookCommand::List(search) => listing(&search.apply(db.get_books().await?)?, json)?,
            BookCommand::Add(fields) => {
                let id = db.add_book(&fields.into()).await?;
                format!("Added book with ID {id}")
            }
            BookCommand::Update { id, fields } => {
                db.update_book(id, &fields.into()).await?;
                format!("Updated book with ID {id}")
            }
            BookCommand::Delete { id } => {
                db.delete_book(id).await?;
                format!("Deleted book with ID {id}")
            }
        },
        Command::Readers(cmd) => match cmd {
            ReaderCommand::List(search) => listing(&search.apply(db.get_readers().await?)?, json)?,
            ReaderCommand::Add(fields) => {
                let id = db.add_reader(&fields.into()).await?;
                format!("Added reader with ID {id}")
            }
            ReaderCommand::Update { id, fields } => {
                db.update_reader(id, &fields.into()).await?;
                format!("Updated reader with ID {id}")
            }
            ReaderCommand::Delete { id } => {
                db.delete_reader(id).await?;
                format!("Deleted reader with ID {id}")
            }
        },
        Command::Issues(cmd) => match cmd {
            IssueCommand::List(search) => listing(&search.apply(db.get_issues().await?)?, json)?,
            IssueCommand::Add(fields) => {
                let id = db.add_issue(&fields.into()).await?;
                format!("Added issue with ID {id}")
            }
            IssueCommand::Update { id, fields } => {
                db.update_issue(id, &fields.into()).await?;
                format!("Updated issue with ID {id}")
            }
            IssueCommand::Delete { id } => {
                db.delete_issue(id).await?;
                format!("Deleted issue with ID {id}")
            }
        },
        Command::BookAuthors(cmd) => match cmd {
            BookAuthorCommand::List(search) => listing(&search.apply(db.get_book_authors().await?)?, json)?,
            BookAuthorCommand::Add { book_id, author_id } => {
                let link = BookAuthor::new(book_id, author_id);
                if db.add_book_author(link).await? {
                    format!("Linked {link}")
                } else {
                    format!("Link {link} already exists")
                }
            }
            BookAuthorCommand::Update {
                book_id,
                author_id,
                new_book_id,
                new_author_id,
            } => {
                let new = BookAuthor::new(new_book_id, new_author_id);
                db.update_book_author(BookAuthor::new(book_id, author_id), new)
                    .await?;
                format!("Link is now {new}")
            }
            BookAuthorCommand::Delete { book_id, author_id } => {
                let link = BookAuthor::new(book_id, author_id);
                db.delete_book_author(link).await?;
                format!("Removed {link}")
            }
        },

        Command::Query(args) => {
            let sql = build_query(&args)?;
            if args.dry_run {
                sql
            } else {
                select(db, &sql, json).await?
            }
        }
        Command::Join(args) => {
            let sql = build_join(&args)?;
            if args.dry_run {
                sql
            } else {
                select(db, &sql, json).await?
            }
        }
        Command::Sql { statement } => select(db, &statement, json).await?,

        Command::Tables => db.alter()?.get_tables().await.join("\n"),
        Command::Columns { table } => {
            let columns = db.alter()?.get_table_columns(&table).await;
            listing(&columns, json)?
        }
        Command::Constraints { table } => {
            let constraints = db.alter()?.get_table_constraints(&table).await;
            listing(&constraints, json)?
        }
        Command::Alter(cmd) => alter(db, cmd).await?,
    };
    Ok(output)
}

/// Dry runs print SQL only; `create-db` connects to the maintenance database itself.
const fn needs_connection(command: &Command) -> bool {
    match command {
        Command::Query(args) => !args.dry_run,
        Command::Join(args) => !args.dry_run,
        Command::CreateDb => false,
        _ => true,
    }
}

async fn execute(cli: Cli) -> Result<String, Box<dyn std::error::Error>> {
    let config = AppConfig::load(cli.config.as_deref(), &cli.overrides())?;
    let log = logging::init(&config.log)?;
    if cli.verbose {
        log.subscribe(Arc::new(StderrSink));
    }

    let mut db = DatabaseManager::new();
    db.set_connection_params(config.connection);

    if matches!(cli.command, Command::Init { .. }) {
        db.create_database().await?;
    }

    if !needs_connection(&cli.command) {
        return run(&mut db, cli.command, cli.json).await;
    }

    db.connect().await?;
    let result = run(&mut db, cli.command, cli.json).await;
    db.disconnect().await?;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_args(argv: &[&str]) -> SearchArgs {
        match Cli::try_parse_from(argv).unwrap().command {
            Command::BookAuthors(BookAuthorCommand::List(search)) => search,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_list_search_flags() {
        let search = search_args(&[
            "libris", "book-authors", "list", "--column", "author_id", "--search", "^[12]$", "--op", "!~",
        ]);
        assert_eq!(search.op, SearchOperator::NotMatches);

        let links = vec![BookAuthor::new(1, 1), BookAuthor::new(2, 2), BookAuthor::new(3, 3)];
        let kept = search.apply(links).unwrap();
        assert_eq!(kept, vec![BookAuthor::new(3, 3)]);
    }

    #[test]
    fn test_list_without_search_keeps_everything() {
        let search = search_args(&["libris", "book-authors", "list"]);
        assert_eq!(search.op, SearchOperator::Like);
        assert_eq!(search.apply(vec![BookAuthor::new(1, 2)]).unwrap().len(), 1);
    }

    #[test]
    fn test_search_needs_a_column() {
        assert!(Cli::try_parse_from(["libris", "authors", "list", "--search", "Tol"]).is_err());
    }
}
