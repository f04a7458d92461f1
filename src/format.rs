//! Plain-text table rendering for reports and listings.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Column alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub align: Align,
    /// Cells wider than this are cut with "..."
    pub max_width: Option<usize>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            align: Align::Left,
            max_width: None,
        }
    }

    pub fn right(mut self) -> Self {
        self.align = Align::Right;
        self
    }

    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }
}

/// ASCII table, MySQL CLI style.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; missing cells render empty, extra cells are dropped.
    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut row: Vec<String> = cells
            .into_iter()
            .take(self.columns.len())
            .map(Into::into)
            .collect();
        row.resize(self.columns.len(), String::new());
        for (cell, col) in row.iter_mut().zip(&self.columns) {
            // Newlines would break the grid
            if cell.contains('\n') {
                *cell = cell.replace(['\r', '\n'], " ");
            }
            if let Some(max) = col.max_width {
                *cell = truncate(cell, max);
            }
        }
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return "Empty set\n".to_string();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name.width()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.width());
            }
        }

        let separator: String = widths
            .iter()
            .map(|w| format!("+{}", "-".repeat(w + 2)))
            .collect::<String>()
            + "+\n";

        let mut output = String::new();
        output.push_str(&separator);
        let header: String = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("| {} ", pad(&col.name, *w, Align::Left)))
            .collect::<String>()
            + "|\n";
        output.push_str(&header);
        output.push_str(&separator);

        for row in &self.rows {
            let line: String = row
                .iter()
                .zip(self.columns.iter().zip(&widths))
                .map(|(cell, (col, w))| format!("| {} ", pad(cell, *w, col.align)))
                .collect::<String>()
                + "|\n";
            output.push_str(&line);
        }
        output.push_str(&separator);

        let row_text = if self.rows.len() == 1 { "row" } else { "rows" };
        output.push_str(&format!("{} {} in set\n", self.rows.len(), row_text));
        output
    }
}

/// Pad to a display width; `format!` width counts chars, not terminal columns.
fn pad(value: &str, width: usize, align: Align) -> String {
    let fill = " ".repeat(width.saturating_sub(value.width()));
    match align {
        Align::Left => format!("{value}{fill}"),
        Align::Right => format!("{fill}{value}"),
    }
}

/// Cut a string to at most `max` display columns, marking the cut with "...".
pub fn truncate(value: &str, max: usize) -> String {
    if value.width() <= max {
        return value.to_string();
    }
    let budget = max.saturating_sub(3);
    let mut used = 0;
    let mut out = String::new();
    for ch in value.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push_str("...");
    out
}
