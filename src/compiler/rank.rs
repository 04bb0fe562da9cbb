//! The rank table: a derived relation assigning each candidate row a dense
//! sibling rank.
//!
//! The general closure path does not read the base relation directly; it
//! reads `__rank_table`, which projects exactly the identifier, the parent
//! reference, a `ROW_NUMBER()` rank consistent with the sibling order, and
//! the source columns of any custom tree fields. Pre-filters are applied
//! here, *before* ranking — a row removed here never receives a rank, so it
//! and its whole subtree are invisible to the closure.

use crate::compiler::is_plain_ident;
use crate::dialect::Dialect;
use crate::error::TreeQueryError;
use crate::query::{TableMeta, TreeOptions};
use crate::value::SqlValue;

/// A resolved sibling-order field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrderField {
    /// Field name or raw SQL expression (anything that is not a plain
    /// identifier passes through unquoted).
    pub field: String,
    pub descending: bool,
}

/// Validate and resolve the sibling order specification.
///
/// Accepts a non-empty ordered list of field names/expressions, each
/// optionally prefixed with `-` for descending. Anything else is a
/// configuration error.
pub(crate) fn resolve_sibling_order(
    entries: &[String],
) -> Result<Vec<OrderField>, TreeQueryError> {
    if entries.is_empty() {
        return Err(TreeQueryError::InvalidSiblingOrder(
            "at least one order field is required".into(),
        ));
    }
    entries
        .iter()
        .map(|entry| {
            let (field, descending) = match entry.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (entry.as_str(), false),
            };
            if field.trim().is_empty() {
                return Err(TreeQueryError::InvalidSiblingOrder(format!(
                    "blank order field in {entries:?}"
                )));
            }
            Ok(OrderField {
                field: field.to_string(),
                descending,
            })
        })
        .collect()
}

/// Render an order field for an `ORDER BY`: plain identifiers are
/// table-qualified and quoted, raw expressions pass through.
pub(crate) fn render_order_field(dialect: Dialect, table: &str, f: &OrderField) -> String {
    let expr = if is_plain_ident(&f.field) {
        format!(
            "{}.{}",
            dialect.quote_ident(table),
            dialect.quote_ident(&f.field)
        )
    } else {
        f.field.clone()
    };
    if f.descending {
        format!("{expr} DESC")
    } else {
        expr
    }
}

/// The rank table as CTE building blocks: its declared column list, the
/// `SELECT` body, and the bind values of its pre-filters (the leading
/// segment of the final parameter list).
#[derive(Debug, Clone)]
pub(crate) struct RankTable {
    pub cte_columns: Vec<String>,
    pub body_sql: String,
    pub params: Vec<SqlValue>,
}

/// Build the `__rank_table` body for the general path.
pub(crate) fn build_rank_table(
    meta: &TableMeta,
    opts: &TreeOptions,
    dialect: Dialect,
) -> Result<RankTable, TreeQueryError> {
    let order = resolve_sibling_order(&opts.sibling_order)?;
    let table_q = dialect.quote_ident(&meta.table);
    let pk_q = dialect.quote_ident(&meta.pk_column);
    let parent_q = dialect.quote_ident(&meta.parent_column);

    let order_by = order
        .iter()
        .map(|f| render_order_field(dialect, &meta.table, f))
        .collect::<Vec<_>>()
        .join(", ");

    let mut cte_columns = vec![
        meta.pk_column.clone(),
        meta.parent_column.clone(),
        "rank_order".to_string(),
    ];
    let mut select_items = vec![
        format!("{table_q}.{pk_q}"),
        format!("{table_q}.{parent_q}"),
        format!("ROW_NUMBER() OVER (ORDER BY {order_by})"),
    ];
    // Custom tree field sources ride along, aliased by the CTE column list.
    for (name, column) in &opts.tree_fields {
        cte_columns.push(format!("tf_{name}"));
        select_items.push(format!("{table_q}.{}", dialect.quote_ident(column)));
    }

    let mut body_sql = format!("SELECT {} FROM {table_q}", select_items.join(", "));

    let mut params = Vec::new();
    if !opts.pre_filters.is_empty() {
        let mut conditions = Vec::new();
        for pf in &opts.pre_filters {
            let (cond, binds) = pf.predicate.render(dialect, &meta.table);
            if pf.include {
                conditions.push(format!("({cond})"));
            } else {
                conditions.push(format!("NOT ({cond})"));
            }
            params.extend(binds);
        }
        body_sql.push_str(" WHERE ");
        body_sql.push_str(&conditions.join(" AND "));
    }

    Ok(RankTable {
        cte_columns,
        body_sql,
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Predicate;

    fn meta() -> TableMeta {
        TableMeta::new("nodes", "id", "parent_id")
            .column("position", true)
            .column("name", false)
    }

    fn opts(order: &[&str]) -> TreeOptions {
        let mut o = TreeOptions::defaults_for(&meta());
        o.sibling_order = order.iter().map(|s| s.to_string()).collect();
        o
    }

    // ── resolve_sibling_order ───────────────────────────────────────

    #[test]
    fn test_resolve_single_field() {
        let fields = resolve_sibling_order(&["position".to_string()]).unwrap();
        assert_eq!(
            fields,
            vec![OrderField {
                field: "position".into(),
                descending: false
            }]
        );
    }

    #[test]
    fn test_resolve_descending_prefix() {
        let fields = resolve_sibling_order(&["-position".to_string()]).unwrap();
        assert!(fields[0].descending);
        assert_eq!(fields[0].field, "position");
    }

    #[test]
    fn test_resolve_empty_list_rejected() {
        let err = resolve_sibling_order(&[]).unwrap_err();
        assert!(matches!(err, TreeQueryError::InvalidSiblingOrder(_)));
    }

    #[test]
    fn test_resolve_blank_field_rejected() {
        let err = resolve_sibling_order(&["".to_string()]).unwrap_err();
        assert!(matches!(err, TreeQueryError::InvalidSiblingOrder(_)));
        let err = resolve_sibling_order(&["-".to_string()]).unwrap_err();
        assert!(matches!(err, TreeQueryError::InvalidSiblingOrder(_)));
    }

    // ── render_order_field ──────────────────────────────────────────

    #[test]
    fn test_render_plain_ident_is_qualified() {
        let f = OrderField {
            field: "position".into(),
            descending: false,
        };
        assert_eq!(
            render_order_field(Dialect::Postgres, "nodes", &f),
            "\"nodes\".\"position\""
        );
    }

    #[test]
    fn test_render_descending() {
        let f = OrderField {
            field: "position".into(),
            descending: true,
        };
        assert_eq!(
            render_order_field(Dialect::Mysql, "nodes", &f),
            "`nodes`.`position` DESC"
        );
    }

    #[test]
    fn test_render_expression_passes_through() {
        let f = OrderField {
            field: "LOWER(name)".into(),
            descending: false,
        };
        assert_eq!(
            render_order_field(Dialect::Postgres, "nodes", &f),
            "LOWER(name)"
        );
    }

    // ── build_rank_table ────────────────────────────────────────────

    #[test]
    fn test_rank_table_shape() {
        let rt = build_rank_table(&meta(), &opts(&["position"]), Dialect::Postgres).unwrap();
        assert_eq!(rt.cte_columns, vec!["id", "parent_id", "rank_order"]);
        assert_eq!(
            rt.body_sql,
            "SELECT \"nodes\".\"id\", \"nodes\".\"parent_id\", \
             ROW_NUMBER() OVER (ORDER BY \"nodes\".\"position\") FROM \"nodes\""
        );
        assert!(rt.params.is_empty());
    }

    #[test]
    fn test_rank_table_multi_field_order() {
        let rt =
            build_rank_table(&meta(), &opts(&["-position", "id"]), Dialect::Postgres).unwrap();
        assert!(
            rt.body_sql
                .contains("ORDER BY \"nodes\".\"position\" DESC, \"nodes\".\"id\")")
        );
    }

    #[test]
    fn test_rank_table_pre_filters_compose() {
        let mut o = opts(&["position"]);
        o.pre_filters.push(crate::query::PreFilter {
            include: true,
            predicate: Predicate::eq("name", "keep"),
        });
        o.pre_filters.push(crate::query::PreFilter {
            include: false,
            predicate: Predicate::eq("name", "drop"),
        });
        let rt = build_rank_table(&meta(), &o, Dialect::Postgres).unwrap();
        assert!(
            rt.body_sql.contains(
                "WHERE (\"nodes\".\"name\" = ?) AND NOT (\"nodes\".\"name\" = ?)"
            ),
            "{}",
            rt.body_sql
        );
        assert_eq!(
            rt.params,
            vec![SqlValue::Text("keep".into()), SqlValue::Text("drop".into())]
        );
    }

    #[test]
    fn test_rank_table_carries_tree_field_sources() {
        let mut o = opts(&["position"]);
        o.tree_fields
            .insert("tree_names".to_string(), "name".to_string());
        let rt = build_rank_table(&meta(), &o, Dialect::Postgres).unwrap();
        assert_eq!(
            rt.cte_columns,
            vec!["id", "parent_id", "rank_order", "tf_tree_names"]
        );
        assert!(rt.body_sql.ends_with(", \"nodes\".\"name\" FROM \"nodes\""));
    }

    #[test]
    fn test_rank_table_invalid_order_propagates() {
        let err = build_rank_table(&meta(), &opts(&[]), Dialect::Postgres).unwrap_err();
        assert!(matches!(err, TreeQueryError::InvalidSiblingOrder(_)));
    }
}
