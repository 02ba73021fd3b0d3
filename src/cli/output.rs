//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};
use serde::Serialize;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// First eight characters of an ID, for tables.
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Table with bold headers and dynamic column widths.
pub fn table<I, S>(headers: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .into_iter()
                .map(|h| Cell::new(h.into()).add_attribute(Attribute::Bold)),
        );
    table
}

/// Simple "message only" result for mutations.
#[derive(Debug, Serialize)]
pub struct ActionOutput<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<T>,
}

impl<T: Serialize> ActionOutput<T> {
    pub fn ok(message: impl Into<String>, item: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            item: Some(item),
        }
    }
}

impl<T: Serialize> CommandOutput for ActionOutput<T> {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long task title", 10), "a long ...");
        assert_eq!(truncate("ééééééééééé", 5), "éé...");
    }

    #[test]
    fn test_table_renders_headers() {
        let mut t = table(["ID", "Name"]);
        t.add_row(vec!["1", "Forge"]);
        let rendered = t.to_string();
        assert!(rendered.contains("Name"));
        assert!(rendered.contains("Forge"));
    }
}
