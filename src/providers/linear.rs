use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::IssueSource;
use crate::model::issue::Issue;

pub struct LinearProvider {
    client: reqwest::Client,
    api_url: String,
    page_size: u32,
}

impl LinearProvider {
    pub fn new(api_key: &str, api_url: &str, page_size: u32) -> Result<Self> {
        // Personal API keys go in raw; OAuth tokens need the Bearer prefix.
        let auth_value = if api_key.starts_with("lin_api_") {
            api_key.to_string()
        } else {
            format!("Bearer {api_key}")
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).context("Invalid Linear API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            page_size,
        })
    }
}

const QUERY: &str = r#"query RecentIssues($since: DateTimeOrDuration!, $first: Int!) {
  issues(
    filter: { updatedAt: { gte: $since } }
    orderBy: updatedAt
    first: $first
  ) {
    nodes {
      id identifier title
      state { name }
      assignee { name }
      project { name }
      team { name }
      createdAt dueDate url priority updatedAt
    }
  }
}"#;

#[derive(Serialize)]
struct GqlRequest<'a> {
    query: &'static str,
    variables: Variables<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    since: &'a str,
    first: u32,
}

#[derive(Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
    errors: Option<Vec<GqlError>>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Deserialize)]
struct GqlData {
    issues: IssueConnection,
}

#[derive(Deserialize)]
struct IssueConnection {
    nodes: Vec<IssueNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    id: String,
    identifier: String,
    title: String,
    state: Option<Named>,
    assignee: Option<Named>,
    project: Option<Named>,
    team: Option<Named>,
    created_at: Option<String>,
    due_date: Option<String>,
    updated_at: DateTime<Utc>,
    url: String,
    /// Linear models priority as a float.
    priority: Option<f64>,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

impl From<IssueNode> for Issue {
    fn from(node: IssueNode) -> Self {
        Issue {
            id: node.id,
            identifier: node.identifier,
            title: node.title,
            status: node.state.map(|s| s.name).filter(|name| !name.is_empty()),
            assignee: node.assignee.map(|a| a.name),
            project: node.project.map(|p| p.name),
            team: node.team.map(|t| t.name),
            created_at: node.created_at,
            due_date: node.due_date,
            updated_at: node.updated_at,
            url: node.url,
            priority: node.priority.map(|p| p.round() as i64).unwrap_or(0),
        }
    }
}

#[async_trait]
impl IssueSource for LinearProvider {
    fn name(&self) -> &str {
        "Linear"
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    #[instrument(skip_all, fields(since = %since))]
    async fn fetch_recent_issues(&self, since: DateTime<Utc>) -> Result<Vec<Issue>> {
        let since = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        let body = GqlRequest {
            query: QUERY,
            variables: Variables {
                since: &since,
                first: self.page_size,
            },
        };

        let resp = self
            .client
            .post(&self.api_url)
            .json(&body)
            .send()
            .await
            .context("Linear API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Linear API returned error status {status}: {body}"));
        }

        let gql: GqlResponse = resp.json().await.context("Failed to parse Linear response")?;
        if let Some(errors) = gql.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(anyhow!("Linear GraphQL errors: {}", messages.join(", ")));
        }
        let data = gql.data.context("No data in Linear response")?;

        let mut issues: Vec<Issue> = data.issues.nodes.into_iter().map(Issue::from).collect();
        issues.sort_by_key(|i| i.updated_at);
        debug!(count = issues.len(), "fetched Linear issues");
        Ok(issues)
    }
}
