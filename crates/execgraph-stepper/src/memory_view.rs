//! Graphviz rendering of memory snapshots.
//!
//! Each named allocation becomes an HTML-table node with one row per byte;
//! each pointer field becomes an edge to the byte it addresses. A pointer whose
//! target allocation differs from its provenance is drawn red.

use std::fmt::Write;

use execgraph_core::{MemoryAllocation, MemorySnapshot};

use crate::export::escape_html;

/// A pointer field found in an allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pointer {
    /// Port of the field holding the pointer (`n<alloc>:<path>`).
    from: String,
    /// Provenance: the allocation the pointer was derived from.
    provenance: u64,
    addr: u64,
}

/// Render a snapshot as a left-to-right Graphviz digraph.
pub fn render_memory_dot(snapshot: &MemorySnapshot) -> String {
    let mut dot = String::from("digraph Memory { node [shape=none, fontsize=12]; rankdir=LR;");

    for alloc in snapshot.allocations() {
        dot.push_str(&allocation_node(alloc));
    }

    let pointers: Vec<Pointer> = snapshot
        .allocations()
        .iter()
        .flat_map(pointers_in)
        .collect();
    for pointer in &pointers {
        if let Some(edge) = pointer_edge(pointer, snapshot) {
            dot.push_str(&edge);
        }
    }

    dot.push('}');
    dot
}

fn to_hex(n: u64) -> String {
    format!("0x{n:02x}")
}

/// Parse a rendered address, decimal or `0x` hexadecimal.
fn parse_address(value: &str) -> Option<u64> {
    let value = value.trim();
    match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn field_port(path: &[String]) -> String {
    path.iter().map(|tag| format!("_{tag}")).collect()
}

/// One narrow cell marking a byte offset.
fn byte_cell(port: u64, tall: bool) -> String {
    format!(
        "<td width=\"7\" height=\"{}\" fixedsize=\"true\" port=\"{port}\"><font point-size=\"1\">&nbsp;</font></td>",
        if tall { 20 } else { 7 }
    )
}

fn allocation_node(alloc: &MemoryAllocation) -> String {
    let Some(prefix) = &alloc.prefix else {
        return String::new();
    };

    let max_cols = alloc.rows.iter().map(|r| r.path.len()).max().unwrap_or(0) + 1;
    let mut table = String::from("<table border=\"0\" cellborder=\"1\" cellspacing=\"0\" >");

    let _ = write!(
        table,
        "<tr><td height=\"7\" width=\"7\" fixedsize=\"true\" border=\"0\">&nbsp;</td><td border=\"0\" colspan=\"{max_cols}\"><b>{}</b>: <i>{}</i>&nbsp;[{}]</td></tr>",
        escape_html(prefix),
        escape_html(&alloc.ty),
        to_hex(alloc.base)
    );

    let mut offset = 0;
    for row in &alloc.rows {
        let tags: String = row
            .path
            .iter()
            .map(|tag| format!("<td rowspan=\"{}\">{}</td>", row.size, escape_html(tag)))
            .collect();
        let value = match (row.pointsto, parse_address(&row.value)) {
            (Some(_), Some(addr)) => to_hex(addr),
            _ => escape_html(&row.value),
        };
        let _ = write!(
            table,
            "<tr>{}{tags}<td port=\"{}v\" rowspan=\"{}\" colspan=\"{}\"{}>{value}</td></tr>",
            byte_cell(offset, row.size == 1),
            field_port(&row.path),
            row.size,
            max_cols - row.path.len(),
            if row.ispadding { " bgcolor=\"grey\"" } else { "" },
        );
        offset += 1;
        for _ in 1..row.size {
            let _ = write!(table, "<tr>{}</tr>", byte_cell(offset, false));
            offset += 1;
        }
    }

    let _ = write!(
        table,
        "<tr border=\"0\"><td border=\"0\" width=\"7\" height=\"7\" fixedsize=\"true\" port=\"{}\"><font point-size=\"1\">&nbsp;</font></td></tr></table>",
        alloc.size
    );

    format!(
        "n{}[label=<{table}>, tooltip=\"allocation: {}\"];",
        alloc.id, alloc.id
    )
}

fn pointers_in(alloc: &MemoryAllocation) -> Vec<Pointer> {
    if alloc.prefix.is_none() {
        return Vec::new();
    }
    alloc
        .rows
        .iter()
        .filter_map(|row| {
            let provenance = row.pointsto?;
            let addr = parse_address(&row.value)?;
            Some(Pointer {
                from: format!("n{}:{}", alloc.id, field_port(&row.path)),
                provenance,
                addr,
            })
        })
        .collect()
}

/// Edge for a pointer; `None` when it points to unknown memory.
fn pointer_edge(pointer: &Pointer, snapshot: &MemorySnapshot) -> Option<String> {
    if let Some(target) = snapshot.allocation_at(pointer.addr) {
        let colour = if target.id != pointer.provenance {
            "[color=\"red\"]"
        } else {
            ""
        };
        return Some(format!(
            "{}v->n{}:{}{colour};",
            pointer.from,
            target.id,
            pointer.addr - target.base
        ));
    }

    // Out of bounds of every allocation: draw against its provenance.
    let origin = snapshot.allocation(pointer.provenance)?;
    let offset = pointer.addr as i128 - origin.base as i128;
    Some(format!(
        "{}v->n{}:{offset}[color=\"red\"];",
        pointer.from, origin.id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use execgraph_core::MemoryRow;

    fn row(path: &[&str], value: &str, size: u64, pointsto: Option<u64>) -> MemoryRow {
        MemoryRow {
            path: path.iter().map(|s| s.to_string()).collect(),
            value: value.to_string(),
            size,
            ispadding: false,
            pointsto,
        }
    }

    fn alloc(id: u64, base: u64, size: u64, prefix: Option<&str>, rows: Vec<MemoryRow>) -> MemoryAllocation {
        MemoryAllocation {
            id,
            base,
            size,
            prefix: prefix.map(String::from),
            ty: "int".to_string(),
            rows,
        }
    }

    #[test]
    fn test_allocation_table() {
        let snapshot = MemorySnapshot(vec![alloc(1, 16, 4, Some("x"), vec![row(&[], "42", 4, None)])]);
        let dot = render_memory_dot(&snapshot);

        assert!(dot.starts_with("digraph Memory { node [shape=none, fontsize=12]; rankdir=LR;n1[label=<"));
        assert!(dot.contains("<b>x</b>: <i>int</i>&nbsp;[0x10]"));
        assert!(dot.contains("port=\"v\" rowspan=\"4\" colspan=\"1\">42</td>"));
        // One tall-less cell per extra byte plus the closing port.
        assert!(dot.contains("port=\"3\"><font"));
        assert!(dot.contains("port=\"4\"><font"));
        assert!(dot.contains("tooltip=\"allocation: 1\"];"));
        assert!(dot.ends_with('}'));
    }

    #[test]
    fn test_anonymous_allocations_are_skipped() {
        let snapshot = MemorySnapshot(vec![alloc(2, 32, 8, None, vec![row(&[], "0", 8, None)])]);
        assert_eq!(
            render_memory_dot(&snapshot),
            "digraph Memory { node [shape=none, fontsize=12]; rankdir=LR;}"
        );
    }

    #[test]
    fn test_pointer_edges() {
        let snapshot = MemorySnapshot(vec![
            alloc(1, 16, 4, Some("x"), vec![row(&[], "42", 4, None)]),
            alloc(
                2,
                32,
                24,
                Some("s"),
                vec![
                    // Points into x with matching provenance.
                    row(&["p"], "18", 8, Some(1)),
                    // Points into x but derived from y: provenance mismatch.
                    row(&["q"], "0x10", 8, Some(3)),
                    // Points nowhere known, derived from x.
                    row(&["r"], "100", 8, Some(1)),
                ],
            ),
            alloc(3, 64, 4, Some("y"), vec![row(&[], "0", 4, None)]),
        ]);
        let dot = render_memory_dot(&snapshot);

        assert!(dot.contains("n2:_pv->n1:2;"));
        assert!(dot.contains("n2:_qv->n1:0[color=\"red\"];"));
        assert!(dot.contains("n2:_rv->n1:84[color=\"red\"];"));
        assert!(dot.contains(">0x12</td>"));
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x1f"), Some(31));
        assert_eq!(parse_address(" 12 "), Some(12));
        assert_eq!(parse_address("NULL"), None);
    }
}
