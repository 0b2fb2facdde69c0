use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property map sent to Notion, keyed by database column name.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A single Notion property value. The externally tagged representation
/// matches Notion's wire format, e.g. `{"select": {"name": "High"}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Title(Vec<RichText>),
    RichText(Vec<RichText>),
    Select(SelectOption),
    Url(String),
    Date(DateRange),
}

impl PropertyValue {
    pub fn title(content: impl Into<String>) -> Self {
        PropertyValue::Title(vec![RichText::plain(content)])
    }

    pub fn rich_text(content: impl Into<String>) -> Self {
        PropertyValue::RichText(vec![RichText::plain(content)])
    }

    pub fn select(name: impl Into<String>) -> Self {
        PropertyValue::Select(SelectOption { name: name.into() })
    }

    /// Concatenated plain text of a title or rich_text value.
    #[cfg(test)]
    pub fn plain_text(&self) -> Option<String> {
        match self {
            PropertyValue::Title(parts) | PropertyValue::RichText(parts) => Some(
                parts
                    .iter()
                    .map(|p| p.text.content.as_str())
                    .collect::<String>(),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichText {
    pub text: TextContent,
}

impl RichText {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            text: TextContent {
                content: content.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub name: String,
}

/// Notion date value; an absent `end` makes it a single date rather than a range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// The subset of a Notion page object this tool reads back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageRef {
    pub id: String,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}
