//! Issue → Notion property mapping.

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::issue::Issue;
use crate::model::page::{DateRange, Properties, PropertyValue};
use crate::util::text::{truncate_chars, NOTION_TEXT_LIMIT};

pub const PROP_ID: &str = "ID";
pub const PROP_TASK: &str = "Task";
pub const PROP_IDENTIFIER: &str = "Linear ID";
pub const PROP_STATUS: &str = "Status";
pub const PROP_ASSIGNEE: &str = "Assignee";
pub const PROP_URL: &str = "URL";
pub const PROP_PRIORITY: &str = "Priority";
pub const PROP_PROJECT: &str = "Project";
pub const PROP_TEAM: &str = "Team";
pub const PROP_DURATION: &str = "Duration";

/// Display label for a Linear priority code. Unknown codes map to "None".
pub fn priority_label(code: i64) -> &'static str {
    match code {
        1 => "Urgent",
        2 => "High",
        3 => "Normal",
        4 => "Low",
        _ => "None",
    }
}

/// A parsed point in time. Bare dates carry no instant.
struct Point {
    date: NaiveDate,
    instant: Option<DateTime<Utc>>,
}

fn parse_point(raw: &str) -> Option<Point> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        let instant = dt.with_timezone(&Utc);
        return Some(Point {
            date: instant.date_naive(),
            instant: Some(instant),
        });
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| Point {
            date,
            instant: None,
        })
}

fn not_before(due: &Point, created: &Point) -> bool {
    match (due.instant, created.instant) {
        (Some(d), Some(c)) => d >= c,
        _ => due.date >= created.date,
    }
}

/// Build the `Duration` date value from an issue's creation and due dates.
///
/// Returns `None` without a usable `created_at`. A due date earlier than the
/// creation date, or one that cannot be parsed, yields an open range.
///
/// A bare due date is compared against the UTC calendar date of `created_at`.
/// Linear's `dueDate` has no zone and is meant in the team's timezone, so an
/// issue created late in the day west of UTC with a same-day due date gets an
/// open range.
pub fn build_duration(created_at: Option<&str>, due_date: Option<&str>) -> Option<DateRange> {
    let start = created_at?;
    let created = parse_point(start)?;

    let end = due_date
        .filter(|due| parse_point(due).is_some_and(|d| not_before(&d, &created)))
        .map(String::from);

    Some(DateRange {
        start: start.to_string(),
        end,
    })
}

fn text(s: &str) -> String {
    truncate_chars(s, NOTION_TEXT_LIMIT)
}

/// Properties written on both create and update.
pub fn page_properties(issue: &Issue) -> Properties {
    let mut props = Properties::new();
    props.insert(PROP_TASK.into(), PropertyValue::title(text(&issue.title)));
    props.insert(
        PROP_IDENTIFIER.into(),
        PropertyValue::rich_text(text(&issue.identifier)),
    );
    if let Some(status) = &issue.status {
        props.insert(PROP_STATUS.into(), PropertyValue::select(status));
    }
    props.insert(
        PROP_ASSIGNEE.into(),
        PropertyValue::rich_text(text(issue.assignee.as_deref().unwrap_or_default())),
    );
    props.insert(PROP_URL.into(), PropertyValue::Url(issue.url.clone()));
    props.insert(
        PROP_PRIORITY.into(),
        PropertyValue::select(priority_label(issue.priority)),
    );

    if let Some(project) = &issue.project {
        props.insert(PROP_PROJECT.into(), PropertyValue::select(project));
    }
    if let Some(team) = &issue.team {
        props.insert(PROP_TEAM.into(), PropertyValue::select(team));
    }
    if let Some(duration) = build_duration(issue.created_at.as_deref(), issue.due_date.as_deref()) {
        props.insert(PROP_DURATION.into(), PropertyValue::Date(duration));
    }

    props
}

/// Properties for a new page: the shared set plus the `ID` lookup key.
pub fn create_properties(issue: &Issue) -> Properties {
    let mut props = page_properties(issue);
    props.insert(PROP_ID.into(), PropertyValue::rich_text(&issue.id));
    props
}
