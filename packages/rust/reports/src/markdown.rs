//! Small Markdown builder with capped listings.

use std::fmt::Write;

/// Line appended when a listing is cut short.
pub fn truncation_line(hidden: usize) -> String {
    format!("...and {hidden} more")
}

pub struct Markdown {
    out: String,
    max_listed: usize,
}

impl Markdown {
    pub fn new(max_listed: usize) -> Self {
        Self {
            out: String::new(),
            max_listed,
        }
    }

    pub fn heading(&mut self, level: usize, text: &str) -> &mut Self {
        let _ = writeln!(self.out, "{} {text}\n", "#".repeat(level.clamp(1, 6)));
        self
    }

    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        let _ = writeln!(self.out, "{text}\n");
        self
    }

    /// Two-column count table.
    pub fn counts<'a>(&mut self, rows: impl IntoIterator<Item = (&'a str, usize)>) -> &mut Self {
        self.out.push_str("| | Count |\n|---|---:|\n");
        for (label, count) in rows {
            let _ = writeln!(self.out, "| {label} | {count} |");
        }
        self.out.push('\n');
        self
    }

    /// A `###` section listing at most `max_listed` items, or "None." when
    /// empty.
    pub fn listing<I>(&mut self, title: &str, items: I) -> &mut Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: ExactSizeIterator,
    {
        let items = items.into_iter();
        let total = items.len();
        let _ = writeln!(self.out, "### {title} ({total})\n");

        if total == 0 {
            self.out.push_str("None.\n\n");
            return self;
        }

        for item in items.take(self.max_listed) {
            let _ = writeln!(self.out, "- {item}");
        }
        if total > self.max_listed {
            let _ = writeln!(self.out, "- {}", truncation_line(total - self.max_listed));
        }
        self.out.push('\n');
        self
    }

    pub fn finish(self) -> String {
        let mut out = self.out;
        while out.ends_with("\n\n") {
            out.pop();
        }
        out
    }
}
