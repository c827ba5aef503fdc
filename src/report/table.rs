//! Plain text table with a `=` rule under the header.
//!
//! Columns are separated by three spaces. When the content is wider than
//! the maximum width, column widths are shrunk round-robin and cells are
//! wrapped.

use super::wrap::TextWrapper;

const COLUMN_GAP: &str = "   ";

#[derive(Debug, Clone)]
pub struct TextTable {
    max_width: usize,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new(max_width: usize) -> Self {
        Self {
            max_width,
            header: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn header<S: Into<String>>(mut self, header: impl IntoIterator<Item = S>) -> Self {
        self.header = header.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_row<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }

    fn widths(&self) -> Vec<usize> {
        let columns = self.column_count();
        let mut widths = vec![0usize; columns];
        for row in std::iter::once(&self.header).chain(&self.rows) {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.split('\n').map(|l| l.chars().count()).max().unwrap_or(0);
                widths[i] = widths[i].max(len);
            }
        }

        let content: usize = widths.iter().sum();
        let decoration = COLUMN_GAP.len() * columns.saturating_sub(1);
        if columns == 0 || content + decoration <= self.max_width {
            return widths;
        }

        let mut available = self.max_width.saturating_sub(decoration).max(columns);
        let mut shrunk = vec![0usize; columns];
        let mut i = 0;
        while available > 0 {
            if shrunk[i] < widths[i] {
                shrunk[i] += 1;
                available -= 1;
            }
            i = (i + 1) % columns;
        }
        shrunk
    }

    fn draw_row(&self, row: &[String], widths: &[usize], centered: bool) -> Vec<String> {
        let cells: Vec<Vec<String>> = widths
            .iter()
            .enumerate()
            .map(|(i, &width)| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let wrapper = TextWrapper::new(width);
                let mut lines = Vec::new();
                for part in cell.split('\n') {
                    if part.trim().is_empty() {
                        lines.push(String::new());
                    } else {
                        lines.extend(wrapper.wrap(part));
                    }
                }
                lines
            })
            .collect();

        let height = cells.iter().map(Vec::len).max().unwrap_or(0);
        (0..height)
            .map(|line| {
                let mut out = String::new();
                for (i, (cell, &width)) in cells.iter().zip(widths).enumerate() {
                    let text = cell.get(line).map(String::as_str).unwrap_or("");
                    let fill = width.saturating_sub(text.chars().count());
                    if centered {
                        out.push_str(&" ".repeat(fill / 2));
                        out.push_str(text);
                        out.push_str(&" ".repeat(fill / 2 + fill % 2));
                    } else {
                        out.push_str(text);
                        out.push_str(&" ".repeat(fill));
                    }
                    if i + 1 < widths.len() {
                        out.push_str(COLUMN_GAP);
                    }
                }
                out
            })
            .collect()
    }

    pub fn draw(&self) -> String {
        let widths = self.widths();
        let mut lines = Vec::new();

        if !self.header.is_empty() {
            lines.extend(self.draw_row(&self.header, &widths, true));
            let rule_len = widths.iter().sum::<usize>()
                + COLUMN_GAP.len() * widths.len().saturating_sub(1);
            lines.push("=".repeat(rule_len));
        }
        for row in &self.rows {
            lines.extend(self.draw_row(row, &widths, false));
        }

        lines.join("\n")
    }
}
