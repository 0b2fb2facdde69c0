use chrono::{DateTime, Utc};

/// A Linear issue, flattened to the fields mirrored into Notion.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Linear UUID, stored in the page's `ID` property and used for lookup.
    pub id: String,
    pub identifier: String,
    pub title: String,
    /// Workflow state name; `None` when Linear returns no state.
    pub status: Option<String>,
    pub assignee: Option<String>,
    pub project: Option<String>,
    pub team: Option<String>,
    /// Raw ISO-8601 text, passed through to Notion unchanged.
    pub created_at: Option<String>,
    /// Either a bare `YYYY-MM-DD` date or a full timestamp.
    pub due_date: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
    pub priority: i64,
}
