// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text rendering for CLI output.

use tower_wire::{ServerEntry, ServersResponse};

/// Fleet status table plus the aggregate line.
pub fn render_status(response: &ServersResponse) -> String {
    let mut out = String::new();
    let rows: Vec<[String; 5]> = response.servers.iter().map(row).collect();
    let header = ["NAME", "STATE", "PID", "RESTARTS", "HEALTH"].map(str::to_string);

    let mut widths = header.iter().map(String::len).collect::<Vec<_>>();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    push_row(&mut out, &header, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out.push_str(&format!(
        "\n{} running, {} stopped, {} error ({} total)\n",
        response.stats.running,
        response.stats.stopped,
        response.stats.error,
        response.stats.total,
    ));
    out
}

fn row(entry: &ServerEntry) -> [String; 5] {
    [
        entry.name.to_string(),
        entry.state.to_string(),
        entry.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
        entry.restart_count.to_string(),
        format!("{:?}", entry.health_state).to_lowercase(),
    ]
}

fn push_row(out: &mut String, cells: &[String; 5], widths: &[usize]) {
    for (i, (cell, width)) in cells.iter().zip(widths.iter()).enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        out.push_str(cell);
        out.push_str(&" ".repeat(width.saturating_sub(cell.len())));
    }
    // No trailing spaces: trim what the last pad added.
    while out.ends_with(' ') {
        out.pop();
    }
    out.push('\n');
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
