//! Translate a [`TaxonQuery`] into SQL.
//!
//! Filters become `$n` placeholders with their values collected in order, so
//! no user text is ever spliced into the statement. Sort columns come from a
//! closed enum.

use taxon_core::projection::{SortDirection, TaxonQuery, TaxonSortField};
use uuid::Uuid;

use crate::sqlx_types::TAXON_COLUMNS;

/// A bind value, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Uuid(Uuid),
    Text(String),
    Int(i32),
    BigInt(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxaQuery {
    /// Page of rows; binds `params` followed by limit and offset.
    pub select_sql: String,
    pub select_params: Vec<SqlParam>,
    /// Total match count; binds `count_params`.
    pub count_sql: String,
    pub count_params: Vec<SqlParam>,
}

/// `%` and `_` in a search term are literal.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn order_clause(query: &TaxonQuery) -> String {
    let dir = match query.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    let primary = match query.sort {
        TaxonSortField::Position => format!("depth {dir}, position {dir}"),
        TaxonSortField::Name => format!("lower(name) COLLATE \"C\" {dir}"),
        TaxonSortField::Depth => format!("depth {dir}"),
        TaxonSortField::PrettyName => format!("lower(pretty_name) COLLATE \"C\" {dir}"),
        TaxonSortField::CreatedAt => format!("created_at {dir}"),
    };
    // Text keys compare in byte order, like `str::cmp` in the in-memory store;
    // the tie-break keeps paging stable.
    format!("{primary}, name COLLATE \"C\" ASC, id ASC")
}

pub fn build_taxa_query(query: &TaxonQuery) -> TaxaQuery {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<SqlParam> = Vec::new();
    let mut idx = 1u32;

    if let Some(taxonomy_id) = query.taxonomy_id {
        clauses.push(format!("taxonomy_id = ${idx}"));
        params.push(SqlParam::Uuid(taxonomy_id));
        idx += 1;
    }
    if let Some(parent_id) = query.parent_id {
        clauses.push(format!("parent_id = ${idx}"));
        params.push(SqlParam::Uuid(parent_id));
        idx += 1;
    }
    if query.roots_only {
        clauses.push("parent_id IS NULL".to_string());
    }
    if let Some(min) = query.min_depth {
        clauses.push(format!("depth >= ${idx}"));
        params.push(SqlParam::Int(min.min(i32::MAX as u32) as i32));
        idx += 1;
    }
    if let Some(max) = query.max_depth {
        clauses.push(format!("depth <= ${idx}"));
        params.push(SqlParam::Int(max.min(i32::MAX as u32) as i32));
        idx += 1;
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        clauses.push(format!(
            "(name ILIKE ${idx} OR slug ILIKE ${idx} OR pretty_name ILIKE ${idx})"
        ));
        params.push(SqlParam::Text(like_pattern(search.trim())));
        idx += 1;
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM taxa{where_sql}");
    let select_sql = format!(
        "SELECT {TAXON_COLUMNS} FROM taxa{where_sql} ORDER BY {} LIMIT ${} OFFSET ${}",
        order_clause(query),
        idx,
        idx + 1
    );

    let mut select_params = params.clone();
    select_params.push(SqlParam::BigInt(i64::from(query.page_size())));
    select_params.push(SqlParam::BigInt(query.offset() as i64));

    TaxaQuery {
        select_sql,
        select_params,
        count_sql,
        count_params: params,
    }
}
