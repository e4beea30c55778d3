// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use llmnav_app::PromptQuery;

pub const PROMPT_ORDER: &str = "updated_at.desc";
pub const LINK_ORDER: &str = "created_at.desc";

/// Translate a typed prompt query into PostgREST query parameters. This is
/// the only place that knows the remote filter syntax.
pub fn prompt_query_params(query: &PromptQuery) -> Vec<(String, String)> {
    let mut params = vec![
        ("select".to_owned(), "*".to_owned()),
        ("order".to_owned(), PROMPT_ORDER.to_owned()),
    ];

    if let Some(term) = query.trimmed_term() {
        let pattern = filter_value(&format!("*{term}*"));
        params.push((
            "or".to_owned(),
            format!(
                "(title.ilike.{pattern},description.ilike.{pattern},prompt_text.ilike.{pattern})"
            ),
        ));
    }

    if let Some(category) = query.category_filter() {
        params.push((
            "category".to_owned(),
            format!("cs.{}", array_literal(&[category])),
        ));
    }

    if !query.tags.is_empty() {
        let tags = query.tags.iter().map(String::as_str).collect::<Vec<_>>();
        params.push(("tags".to_owned(), format!("cs.{}", array_literal(&tags))));
    }

    params
}

pub fn link_list_params() -> Vec<(String, String)> {
    vec![
        ("select".to_owned(), "*".to_owned()),
        ("order".to_owned(), LINK_ORDER.to_owned()),
    ]
}

pub fn eq_param(column: &str, value: &str) -> (String, String) {
    (column.to_owned(), format!("eq.{}", filter_value(value)))
}

/// Values holding PostgREST reserved characters must be double-quoted.
pub fn filter_value(value: &str) -> String {
    const RESERVED: [char; 6] = [',', '.', ':', '(', ')', '"'];
    if value.contains(RESERVED) || value.contains('\\') || value.trim() != value {
        return quote(value);
    }
    value.to_owned()
}

/// Postgres array literal with every element quoted, e.g. `{"a","b c"}`.
pub fn array_literal(values: &[&str]) -> String {
    let quoted = values
        .iter()
        .map(|value| quote(value))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{quoted}}}")
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
