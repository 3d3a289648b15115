//! Builds the `select` statements used to fill keyed caches from a table description.

use config::shared::TableQueryConfig;
use pg_escape::quote_identifier;

/// Builds `select <columns> from <table> [where <filter>] [group by <columns>]`.
///
/// Table names may be schema qualified. Plain identifiers in the column and group by lists are
/// quoted; any other entry (an aggregate such as `avg(score) as score`) is emitted verbatim.
pub fn make_cache_query(table: &TableQueryConfig) -> String {
    let mut query = format!(
        "select {} from {}",
        join_expressions(&table.columns),
        quote_table_name(&table.name)
    );

    if let Some(filter) = table.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        query.push_str(" where ");
        query.push_str(filter);
    }

    if !table.group_by.is_empty() {
        query.push_str(" group by ");
        query.push_str(&join_expressions(&table.group_by));
    }

    query
}

fn quote_table_name(name: &str) -> String {
    name.split('.')
        .map(|part| quote_identifier(part).into_owned())
        .collect::<Vec<_>>()
        .join(".")
}

fn join_expressions(expressions: &[String]) -> String {
    expressions
        .iter()
        .map(|expression| quote_expression(expression))
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote_expression(expression: &str) -> String {
    if is_plain_identifier(expression) {
        quote_identifier(expression).into_owned()
    } else {
        expression.to_string()
    }
}

fn is_plain_identifier(expression: &str) -> bool {
    let mut chars = expression.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
