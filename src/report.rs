//! Final ranking and the text table printed to the user.

use std::fmt;

use crate::MovieRecord;

const HEADERS: [&str; 3] = ["Rank", "Name", "Cinemas"];

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    NothingToPrint,
    /// Rows already sorted by rating, best first.
    Table(Vec<MovieRecord>),
}

/// Drop movies without a usable rating, sort by rating and keep the best `top`.
pub fn build_report(records: Vec<MovieRecord>, top: usize) -> Report {
    let mut rated: Vec<MovieRecord> = records
        .into_iter()
        .filter(|r| r.kp_rank.is_some_and(f64::is_finite))
        .collect();
    rated.sort_by(|a, b| {
        let a = a.kp_rank.unwrap_or(f64::MIN);
        let b = b.kp_rank.unwrap_or(f64::MIN);
        b.total_cmp(&a)
    });
    rated.truncate(top);

    if rated.is_empty() {
        Report::NothingToPrint
    } else {
        Report::Table(rated)
    }
}

fn display_name(record: &MovieRecord) -> String {
    format!("{} ({})", record.rus_name, record.original_name)
}

fn display_rank(record: &MovieRecord) -> String {
    record
        .kp_rank
        .map(|rank| format!("{rank:.3}"))
        .unwrap_or_default()
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
}

fn pad(cell: &str, width: usize, align: Align) -> String {
    let fill = width.saturating_sub(cell.chars().count());
    match align {
        Align::Left => format!("{cell}{}", " ".repeat(fill)),
        Align::Center => {
            let left = fill / 2;
            format!("{}{cell}{}", " ".repeat(left), " ".repeat(fill - left))
        }
    }
}

/// Bordered table with a header row. Widths are counted in characters.
pub fn render_table(rows: &[MovieRecord]) -> String {
    let cells: Vec<[String; 3]> = rows
        .iter()
        .map(|r| [display_rank(r), display_name(r), r.cinemas_num.to_string()])
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let aligns = [Align::Center, Align::Left, Align::Center];

    let border = {
        let parts: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
        format!("+{}+", parts.join("+"))
    };
    let line = |row: [&str; 3], header: bool| {
        let parts: Vec<String> = row
            .iter()
            .zip(widths)
            .zip(aligns)
            .map(|((cell, width), align)| {
                let align = if header { Align::Center } else { align };
                format!(" {} ", pad(cell, width, align))
            })
            .collect();
        format!("|{}|", parts.join("|"))
    };

    let mut out = vec![border.clone(), line(HEADERS, true), border.clone()];
    for row in &cells {
        out.push(line([&row[0], &row[1], &row[2]], false));
    }
    out.push(border);
    out.join("\n")
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::NothingToPrint => write!(f, "Nothing to print"),
            Report::Table(rows) => write!(f, "{}", render_table(rows)),
        }
    }
}
