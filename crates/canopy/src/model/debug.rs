//! Text dumps of the flat row sequence.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use canopy::model::{FlatRowsDebug, TreeFlattener};
//!
//! let flattener = TreeFlattener::new(vec![Arc::new("alpha"), Arc::new("beta")]).unwrap();
//! let dump = FlatRowsDebug::new().format(&flattener);
//! assert!(dump.starts_with("Flat rows (2 visible):"));
//! ```

use std::fmt::Display;

use super::flatten::{RowInfo, TreeFlattener};

/// Expansion markers used in a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowStyle {
    /// `+` for collapsed rows, `-` for expanded rows.
    Ascii,
    /// Triangles.
    #[default]
    Unicode,
    /// No markers.
    Compact,
}

/// Configuration for [`FlatRowsDebug`].
#[derive(Debug, Clone)]
pub struct RowsFormatOptions {
    pub style: RowStyle,
    /// Prefix each line with its flat index.
    pub show_flat_index: bool,
    /// Append each row's index path.
    pub show_paths: bool,
    /// Spaces per indent level.
    pub indent_size: usize,
}

impl Default for RowsFormatOptions {
    fn default() -> Self {
        Self {
            style: RowStyle::default(),
            show_flat_index: true,
            show_paths: true,
            indent_size: 2,
        }
    }
}

impl RowsFormatOptions {
    /// Labels and indentation only.
    pub fn minimal() -> Self {
        Self {
            style: RowStyle::Compact,
            show_flat_index: false,
            show_paths: false,
            ..Default::default()
        }
    }
}

/// Renders the visible rows of a [`TreeFlattener`] as indented text.
#[derive(Debug, Clone, Default)]
pub struct FlatRowsDebug {
    options: RowsFormatOptions,
}

impl FlatRowsDebug {
    /// Creates a formatter with the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a formatter with the given options.
    pub fn with_options(options: RowsFormatOptions) -> Self {
        Self { options }
    }

    /// Formats every visible row using the model's `Display` output.
    pub fn format<M>(&self, flattener: &TreeFlattener<M>) -> String
    where
        M: Display + Send + Sync + 'static,
    {
        self.format_with(flattener, |model| model.to_string())
    }

    /// Formats every visible row using `label` for the model text.
    pub fn format_with<M, F>(&self, flattener: &TreeFlattener<M>, label: F) -> String
    where
        M: Send + Sync + 'static,
        F: Fn(&M) -> String,
    {
        let rows = flattener.rows();
        let mut output = format!("Flat rows ({} visible):\n", rows.len());
        if rows.is_empty() {
            output.push_str("  (empty)\n");
            return output;
        }
        for (index, row) in rows.iter().enumerate() {
            output.push_str(&self.format_row(index, row, &label(&*row.model)));
        }
        output
    }

    fn format_row<M>(&self, index: usize, row: &RowInfo<M>, label: &str) -> String {
        let mut line = String::new();
        if self.options.show_flat_index {
            line.push_str(&format!("{index:>4} "));
        }
        line.push_str(&" ".repeat(row.indent() * self.options.indent_size));
        line.push_str(self.marker(row.expanded));
        line.push_str(label);
        if self.options.show_paths {
            line.push_str(&format!(" [{}]", row.path));
        }
        line.push('\n');
        line
    }

    fn marker(&self, expanded: bool) -> &'static str {
        match (self.options.style, expanded) {
            (RowStyle::Ascii, true) => "- ",
            (RowStyle::Ascii, false) => "+ ",
            (RowStyle::Unicode, true) => "\u{25be} ",
            (RowStyle::Unicode, false) => "\u{25b8} ",
            (RowStyle::Compact, _) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::ItemsSource;

    #[test]
    fn test_format_empty() {
        let flattener = TreeFlattener::<String>::new(Vec::<Arc<String>>::new()).unwrap();
        let output = FlatRowsDebug::new().format(&flattener);
        assert_eq!(output, "Flat rows (0 visible):\n  (empty)\n");
    }

    #[test]
    fn test_format_nested() {
        let flattener = TreeFlattener::builder(vec![Arc::new(1u32), Arc::new(5)])
            .children(|n: &u32| {
                (*n < 2).then(|| ItemsSource::Fixed(vec![Arc::new(n * 10)]))
            })
            .build()
            .unwrap();
        let first = flattener.row_id_at(0).unwrap();
        flattener.expand(first).unwrap();

        let ascii = FlatRowsDebug::with_options(RowsFormatOptions {
            style: RowStyle::Ascii,
            ..Default::default()
        });
        let output = ascii.format(&flattener);
        assert!(output.contains("   0 - 1 [0]"));
        assert!(output.contains("   1   + 10 [0.0]"));
        assert!(output.contains("   2 + 5 [1]"));

        let minimal = FlatRowsDebug::with_options(RowsFormatOptions::minimal());
        let output = minimal.format_with(&flattener, |n| format!("n{n}"));
        assert_eq!(output, "Flat rows (3 visible):\nn1\n  n10\nn5\n");
    }
}
