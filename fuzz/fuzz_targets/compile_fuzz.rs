//! Fuzz the compiler with arbitrary identifiers and sibling orders: any
//! input must yield SQL or a configuration error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tree_cte::{Dialect, SelectQuery, TableMeta};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut parts = text.split(',');
    let table = parts.next().unwrap_or_default();
    let pk = parts.next().unwrap_or("id");
    let parent = parts.next().unwrap_or("parent_id");
    let order: Vec<String> = parts.map(|s| s.to_string()).collect();

    let mut query = SelectQuery::new(TableMeta::new(table, pk, parent)).with_tree_fields();
    if !order.is_empty() {
        query = query.order_siblings_by(order);
    }

    for dialect in [Dialect::Postgres, Dialect::Mysql, Dialect::Sqlite] {
        let _ = query.compile(dialect);
    }
});
