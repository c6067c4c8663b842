// End-to-end SQL generation through the public API: builder, conditions,
// subqueries, joins and the shell grammar. No database needed.

use libris::RequestBuilder;
use libris::query::{
    AggregateFunction, ComparisonOperator, JoinQuery, JoinType, SortDirection, Subquery,
    SubqueryOperator, condition, validate_having,
};
use libris::shell::{Command, parse_command, parse_condition, parse_subquery};

#[test]
fn test_books_per_genre_report() {
    let mut builder = RequestBuilder::new();
    builder
        .from_table("books")
        .where_(condition("publication_year", ComparisonOperator::Ge, "1900").unwrap())
        .group_by("genre")
        .having(validate_having("COUNT(*) >= 2").unwrap())
        .order_by("genre", SortDirection::Asc);

    assert_eq!(
        builder.build(),
        "SELECT genre, COUNT(*) FROM books WHERE publication_year >= '1900' \
         GROUP BY genre HAVING COUNT(*) >= 2 ORDER BY genre ASC"
    );
}

#[test]
fn test_explicit_aggregate_with_alias() {
    let mut builder = RequestBuilder::new();
    builder
        .from_table("books")
        .group_by("genre")
        .aggregate_as(AggregateFunction::Avg, "publication_year", "avg_year");

    assert_eq!(
        builder.build(),
        "SELECT genre, AVG(publication_year) AS avg_year FROM books GROUP BY genre"
    );
}

#[test]
fn test_reset_clears_every_clause() {
    let mut builder = RequestBuilder::new();
    builder
        .select(["title"])
        .from_table("books")
        .where_("genre = 'Novel'")
        .group_by("title")
        .order_by("title", SortDirection::Desc);
    builder.reset();

    assert_eq!(builder.build(), "SELECT * FROM ");
    assert!(!builder.is_grouped());
}

#[test]
fn test_books_never_issued() {
    let sub = parse_subquery("not exists issues where issues.book_id = books.book_id").unwrap();
    let mut builder = RequestBuilder::new();
    builder.select(["title"]).from_table("books").where_(sub.render().unwrap());

    assert_eq!(
        builder.build(),
        "SELECT title FROM books WHERE NOT EXISTS \
         (SELECT 1 FROM issues WHERE issues.book_id = books.book_id)"
    );
}

#[test]
fn test_value_subquery_from_text_and_from_parts() {
    let parsed = parse_subquery("author_id in book_authors.author_id").unwrap();
    let built = Subquery::new(SubqueryOperator::In, "book_authors", "author_id").outer("author_id");
    assert_eq!(parsed, built);
    assert_eq!(
        parsed.render().unwrap(),
        "author_id IN (SELECT author_id FROM book_authors)"
    );

    assert!(parse_subquery("author_id like book_authors.author_id").is_err());
}

#[test]
fn test_condition_text_round_trip_through_parser() {
    let (column, operator, value) = parse_condition("birth_year between 1800 and 1900").unwrap();
    assert_eq!(operator, ComparisonOperator::Between);
    assert_eq!(
        condition(&column, operator, &value).unwrap(),
        "birth_year BETWEEN '1800' AND '1900'"
    );

    let (column, operator, value) = parse_condition("country in UK, USA").unwrap();
    assert_eq!(
        condition(&column, operator, &value).unwrap(),
        "country IN ('UK', 'USA')"
    );

    let (column, operator, value) = parse_condition("last_name = O'Brien").unwrap();
    assert_eq!(
        condition(&column, operator, &value).unwrap(),
        "last_name = 'O''Brien'"
    );
}

#[test]
fn test_condition_rejects_injected_column() {
    assert!(condition("title; DROP TABLE books", ComparisonOperator::Eq, "x").is_err());
    assert!(parse_condition("title").is_err());
}

#[test]
fn test_authors_and_their_books() {
    let sql = JoinQuery::new("authors", "author_id", "book_authors", "author_id")
        .join_type(JoinType::Left)
        .columns(["authors.last_name", "book_authors.book_id"])
        .filter("authors.last_name", ComparisonOperator::Like, "Tol")
        .build()
        .unwrap();

    assert_eq!(
        sql,
        "SELECT authors.last_name, book_authors.book_id FROM authors \
         LEFT JOIN book_authors ON authors.author_id = book_authors.author_id \
         WHERE authors.last_name LIKE '%Tol%'"
    );
}

#[test]
fn test_join_rejects_bad_identifier() {
    let query = JoinQuery::new("authors", "author_id", "books--", "author_id");
    assert!(query.build().is_err());
}

#[test]
fn test_shell_join_command() {
    let Command::Join(query) = parse_command("join full books.book_id issues.book_id").unwrap() else {
        panic!("expected a join");
    };
    assert_eq!(
        query.build().unwrap(),
        "SELECT * FROM books FULL JOIN issues ON books.book_id = issues.book_id"
    );
}
