//! Markdown reference of every registered option

use crate::error::Result;
use crate::manager::OptionManager;
use crate::option::OptionImpl;
use crate::value::OptionValue;
use std::fmt::Write as _;
use std::path::Path;

const HEADER: &str = "# Options

This file lists every registered option with its type, default value and
bounds. It is generated from the option registry; edit the option
declarations rather than this file.

";

const TABLE_HEADER: &str = "| Option | Type | Default Value | Min Value | Max Value | Description |
| :-- | :-: | :-: | :-: | :-: | :-- |
";

impl OptionManager {
    /// Render the option reference: one table for short value types and one
    /// for long ones (strings, hash lists, key combos), sorted by name.
    pub fn render_markdown_documentation(&self) -> String {
        let state = self.lock();
        let mut options: Vec<&OptionImpl> = state.options.values().collect();
        options.sort_by(|a, b| a.full_name().cmp(b.full_name()));

        let mut out = String::from(HEADER);
        out.push_str("## Simple Types\n");
        write_table(&mut out, options.iter().copied().filter(|o| !o.kind().is_long_entry()));
        out.push('\n');
        out.push_str("## Complex Types\n");
        write_table(&mut out, options.iter().copied().filter(|o| o.kind().is_long_entry()));
        out
    }

    pub fn write_markdown_documentation(&self, path: &Path) -> Result<()> {
        let markdown = self.render_markdown_documentation();
        optlayer_conf::io::write_atomic(path, markdown.as_bytes())?;
        tracing::info!(path = %path.display(), "Wrote option documentation");
        Ok(())
    }
}

fn write_table<'a>(out: &mut String, options: impl Iterator<Item = &'a OptionImpl>) {
    out.push_str(TABLE_HEADER);
    for option in options {
        let bound = |value: Option<&OptionValue>| value.map(|v| v.to_config_string()).unwrap_or_default();
        let _ = writeln!(
            out,
            "|{}|{}|{}|{}|{}|{}|",
            option.full_name(),
            option.kind(),
            option.default_value().to_config_string(),
            bound(option.min_value()),
            bound(option.max_value()),
            escape_markdown(option.description()),
        );
    }
}

/// Escape markdown syntax so descriptions render as plain text. Newlines
/// become `<br>` to stay inside the table row.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => escaped.push_str("<br>"),
            '<' | '>' | '\\' | '`' | '*' | '_' | '{' | '}' | '[' | ']' | '(' | ')' | '#' | '+' | '-' | '.' | '!'
            | '|' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HashSetLayer, OptionBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes_markdown_syntax() {
        assert_eq!(escape_markdown("a_b *c*"), "a\\_b \\*c\\*");
        assert_eq!(escape_markdown("x < y\nz|w"), "x \\< y<br>z\\|w");
        assert_eq!(escape_markdown("1.5 (max)"), "1\\.5 \\(max\\)");
    }

    #[test]
    fn splits_simple_and_complex_types() {
        let manager = OptionManager::new();
        OptionBuilder::new("render", "bounces", 2)
            .description("Indirect bounce count")
            .min(0)
            .max(8)
            .register(&manager)
            .unwrap();
        OptionBuilder::new("render", "skipped", HashSetLayer::new())
            .description("Geometry to skip")
            .register(&manager)
            .unwrap();

        let markdown = manager.render_markdown_documentation();
        let simple = markdown.find("## Simple Types").unwrap();
        let complex = markdown.find("## Complex Types").unwrap();
        let bounces = markdown.find("|render.bounces|int|2|0|8|Indirect bounce count|").unwrap();
        let skipped = markdown.find("|render.skipped|hash set||||Geometry to skip|").unwrap();
        assert!(simple < bounces && bounces < complex && complex < skipped);
    }
}
