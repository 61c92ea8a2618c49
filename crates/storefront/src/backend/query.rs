//! REST query builder.
//!
//! Renders the filter, ordering and paging parameters understood by the
//! backend's REST data API, e.g. `?select=*&is_active=eq.true&order=price.asc`.

use std::fmt::{self, Display};

/// Sort direction for [`Query::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("asc"),
            Self::Desc => f.write_str("desc"),
        }
    }
}

/// A read, update or delete against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: String,
    params: Vec<(String, String)>,
}

impl Query {
    #[must_use]
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            params: Vec::new(),
        }
    }

    /// Columns to return, including embedded relations like `*,order_items(*)`.
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    #[must_use]
    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    #[must_use]
    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "neq", value)
    }

    #[must_use]
    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gte", value)
    }

    #[must_use]
    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "lte", value)
    }

    /// Case-insensitive substring match on any of `columns`.
    ///
    /// `needle` must already be passed through [`sanitize_search`].
    #[must_use]
    pub fn ilike_any(mut self, columns: &[&str], needle: &str) -> Self {
        let clauses = columns
            .iter()
            .map(|col| format!("{col}.ilike.*{needle}*"))
            .collect::<Vec<_>>()
            .join(",");
        self.params.push(("or".to_string(), format!("({clauses})")));
        self
    }

    /// Add an ordering. Repeated calls add secondary sort keys.
    #[must_use]
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        let clause = format!("{column}.{direction}");
        if let Some((_, existing)) = self.params.iter_mut().find(|(k, _)| k == "order") {
            existing.push(',');
            existing.push_str(&clause);
        } else {
            self.params.push(("order".to_string(), clause));
        }
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.params.push(("limit".to_string(), limit.to_string()));
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u32) -> Self {
        if offset > 0 {
            self.params.push(("offset".to_string(), offset.to_string()));
        }
        self
    }

    /// Rows `from..=to`, zero-based.
    #[must_use]
    pub fn range(self, from: u32, to: u32) -> Self {
        self.offset(from).limit(to.saturating_sub(from) + 1)
    }

    fn filter(mut self, column: &str, op: &str, value: impl Display) -> Self {
        self.params
            .push((column.to_string(), format!("{op}.{value}")));
        self
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Stable key for caching the result of this query.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{params}", self.table)
    }
}

/// Maximum length of a search term sent to the backend.
const MAX_SEARCH_LEN: usize = 100;

/// Strip characters that carry meaning inside REST filter expressions.
///
/// Commas and parentheses would break out of an `or=(...)` group, `*` and `%`
/// are wildcards, and `.`/`:` separate operators. Whitespace is collapsed.
#[must_use]
pub fn sanitize_search(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            ',' | '(' | ')' | '*' | '%' | '.' | ':' | '"' | '\\' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_SEARCH_LEN)
        .collect::<String>()
        .trim_end()
        .to_string()
}
