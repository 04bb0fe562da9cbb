//! Fuzz the list-column decoders: arbitrary bytes must never panic and
//! never produce a mixed Int/Text list.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tree_cte::{Dialect, SqlValue, decode, decode_array_literal, decode_list};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    for values in [
        decode_list(raw),
        decode_array_literal(raw),
        decode(Dialect::Postgres, raw),
        decode(Dialect::Mysql, raw),
        decode(Dialect::Sqlite, raw),
    ] {
        // All-or-nothing integer coercion.
        let ints = values.iter().filter(|v| matches!(v, SqlValue::Int(_))).count();
        assert!(ints == 0 || ints == values.len());
    }
});
