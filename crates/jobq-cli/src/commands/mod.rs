pub mod config;
pub mod dashboard;
pub mod dlq;
pub mod enqueue;
pub mod list;
pub mod logs;
pub mod metrics;
pub mod recover;
pub mod status;
pub mod worker;

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use jobq_queue::{JobState, StateCounts};

/// Table with the house style and cyan headers
pub(crate) fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

pub(crate) fn state_color(state: JobState) -> Color {
    match state {
        JobState::Pending => Color::Yellow,
        JobState::Processing => Color::Blue,
        JobState::Completed => Color::Green,
        JobState::Failed => Color::Magenta,
        JobState::Dead => Color::Red,
    }
}

pub(crate) fn state_cell(state: JobState) -> Cell {
    Cell::new(state.as_str()).fg(state_color(state))
}

pub(crate) fn counts_table(counts: &StateCounts) -> Table {
    let mut table = table(&["State", "Count"]);
    for state in JobState::ALL {
        let count = counts.get(&state).copied().unwrap_or(0);
        table.add_row(vec![
            Cell::new(state.as_str().to_uppercase()).fg(state_color(state)),
            Cell::new(count).fg(state_color(state)),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL"),
        Cell::new(counts.values().sum::<u64>()),
    ]);
    table
}

/// Shorten to `max` characters, marking the cut with `...`
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }
}
