use crossterm::style::Stylize;
use traceviz_session::{Phase, Session};

use super::model::{Cell, HopRow};

#[derive(Debug, Clone, Copy)]
pub struct UiOpts {
    pub plain: bool,
}

/// Column titles and widths; the last column is left unpadded.
const COLUMNS: [(&str, usize); 7] = [
    ("#", 4),
    ("IP", 17),
    ("Latitude", 11),
    ("Longitude", 12),
    ("City", 18),
    ("State", 18),
    ("Country", 0),
];

pub fn render_banner(target: &str, width: u16) -> String {
    let width = width as usize;
    [
        center_line("TRACEROUTE VISUALIZATION", width),
        center_line(&format!("target: {target}"), width),
    ]
    .join("\n")
}

pub fn render_header(opts: &UiOpts) -> String {
    let line = COLUMNS
        .iter()
        .map(|(title, width)| pad(title, *width))
        .collect::<String>();
    let line = line.trim_end().to_string();
    if opts.plain {
        line
    } else {
        line.bold().to_string()
    }
}

pub fn render_row(row: &HopRow, opts: &UiOpts) -> String {
    let mut line = pad(&row.number.to_string(), COLUMNS[0].1);
    for (cell, (_, width)) in row.cells().into_iter().zip(COLUMNS.iter().skip(1)) {
        line.push_str(&render_cell(cell, *width, opts));
    }
    line.trim_end().to_string()
}

fn render_cell(cell: &Cell, width: usize, opts: &UiOpts) -> String {
    let text = pad(&cell.text, width);
    if cell.private && !opts.plain {
        text.dim().to_string()
    } else {
        text
    }
}

pub fn render_status(phase: Phase, opts: &UiOpts) -> String {
    let text = phase.status_text();
    if opts.plain {
        return text.to_string();
    }
    match phase {
        Phase::Connecting | Phase::Streaming => text.yellow().to_string(),
        Phase::FinishedSuccess | Phase::FinishedError => text.green().to_string(),
        Phase::Idle => text.to_string(),
    }
}

/// Lines shown once a session finished: the error, or the endpoints to open.
pub fn render_outcome(session: &Session, opts: &UiOpts) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(error) = session.error() {
        let text = format!("error: {}", error.message);
        lines.push(if opts.plain { text } else { text.red().to_string() });
        return lines;
    }

    if session.records().is_empty() {
        lines.push("No hops received".to_string());
    }
    if let Some(targets) = session.visualization_targets() {
        if let Some(map) = &targets.map {
            lines.push(format!("Map Visualization: {map}"));
        }
        if let Some(graph) = &targets.graph {
            lines.push(format!("Graph Visualization: {graph}"));
        }
    }
    lines
}

fn pad(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }
    let used = text.chars().count();
    if used + 1 >= width {
        format!("{text} ")
    } else {
        format!("{text}{}", " ".repeat(width - used))
    }
}

fn center_line(text: &str, width: usize) -> String {
    if text.len() >= width {
        return text.to_string();
    }
    let pad = (width - text.len()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use traceviz_model::Hop;

    fn private_row() -> HopRow {
        HopRow::new(1, &Hop::default())
    }

    #[test]
    fn header_lists_columns_in_order() {
        let header = render_header(&UiOpts { plain: true });
        let titles: Vec<&str> = header.split_whitespace().collect();
        assert_eq!(
            titles,
            vec!["#", "IP", "Latitude", "Longitude", "City", "State", "Country"]
        );
    }

    #[test]
    fn row_shows_private_placeholders() {
        let line = render_row(&private_row(), &UiOpts { plain: true });
        assert!(line.starts_with("1 "));
        assert_eq!(line.matches("Private").count(), 6);
    }

    #[test]
    fn plain_mode_has_no_ansi() {
        let opts = UiOpts { plain: true };
        assert!(!render_row(&private_row(), &opts).contains('\x1b'));
        assert!(!render_status(Phase::Streaming, &opts).contains('\x1b'));
        assert!(!render_header(&opts).contains('\x1b'));
    }

    #[test]
    fn styled_mode_dims_private_cells() {
        let line = render_row(&private_row(), &UiOpts { plain: false });
        assert!(line.contains('\x1b'));
    }

    #[test]
    fn long_values_keep_a_separator() {
        assert_eq!(pad("abcdef", 4), "abcdef ");
        assert_eq!(pad("ab", 4), "ab  ");
        assert_eq!(pad("tail", 0), "tail");
    }

    #[test]
    fn banner_is_centered() {
        let banner = render_banner("example.com", 40);
        assert!(banner.contains("TRACEROUTE VISUALIZATION"));
        assert!(banner.lines().nth(1).unwrap().starts_with(' '));
    }
}
