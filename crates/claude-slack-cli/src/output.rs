//! Plain-text table rendering for the admin CLI, in the spirit of the
//! broader broker's table renderer but without its TTY/color layer — this
//! CLI is meant for scripts and CI logs as much as terminals.

pub struct CliTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CliTable {
    pub fn new(headers: Vec<&str>) -> Self {
        Self { headers: headers.into_iter().map(String::from).collect(), rows: Vec::new() }
    }

    pub fn add_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(String::len).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.len());
                }
            }
        }
        widths
    }

    pub fn render(&self) {
        if self.rows.is_empty() {
            println!("(none)");
            return;
        }
        let widths = self.column_widths();
        println!("{}", format_row(&self.headers, &widths));
        println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
        for row in &self.rows {
            println!("{}", format_row(row, &widths));
        }
    }
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    cells.iter().enumerate().map(|(i, c)| format!("{:<width$}", c, width = widths.get(i).copied().unwrap_or(0)))
        .collect::<Vec<_>>()
        .join("  ")
}
