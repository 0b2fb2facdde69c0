use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::PageStore;
use crate::mapping::{create_properties, page_properties, PROP_ID};
use crate::model::issue::Issue;
use crate::model::page::{PageRef, Properties};

/// Enough to notice duplicates without paging through them.
const LOOKUP_PAGE_SIZE: u32 = 10;

pub struct NotionProvider {
    client: reqwest::Client,
    base_url: String,
    database_id: String,
}

impl NotionProvider {
    pub fn new(api_key: &str, database_id: &str, base_url: &str, version: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .context("Invalid Notion API key")?,
        );
        headers.insert(
            HeaderName::from_static("notion-version"),
            HeaderValue::from_str(version).context("Invalid Notion-Version")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            database_id: database_id.to_string(),
        })
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder, what: &str) -> Result<T> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("Notion {what} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<NotionError>(&body) {
                Ok(e) => anyhow!("Notion {what} returned {status} ({}): {}", e.code, e.message),
                Err(_) => anyhow!("Notion {what} returned {status}: {body}"),
            });
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse Notion {what} response"))
    }
}

#[derive(Deserialize)]
struct NotionError {
    code: String,
    message: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    results: Vec<PageRef>,
}

#[derive(Serialize)]
struct CreatePage<'a> {
    parent: Parent<'a>,
    properties: &'a Properties,
}

#[derive(Serialize)]
struct Parent<'a> {
    database_id: &'a str,
}

#[derive(Serialize)]
struct UpdatePage<'a> {
    properties: &'a Properties,
}

#[async_trait]
impl PageStore for NotionProvider {
    fn name(&self) -> &str {
        "Notion"
    }

    #[instrument(skip(self))]
    async fn find_target_record(&self, issue_id: &str) -> Result<Option<PageRef>> {
        let body = json!({
            "filter": {
                "property": PROP_ID,
                "rich_text": {"equals": issue_id}
            },
            "sorts": [{"timestamp": "last_edited_time", "direction": "descending"}],
            "page_size": LOOKUP_PAGE_SIZE,
        });
        let url = format!("{}/v1/databases/{}/query", self.base_url, self.database_id);
        let resp: QueryResponse = self
            .send(self.client.post(url).json(&body), "database query")
            .await?;

        let count = resp.results.len();
        let newest = resp.results.into_iter().next();
        if let Some(page) = newest.as_ref().filter(|_| count > 1) {
            warn!(
                issue_id,
                count,
                page_id = %page.id,
                last_edited = page.last_edited_time.as_deref().unwrap_or("unknown"),
                "multiple pages share this issue id; using the most recently edited"
            );
        }
        Ok(newest)
    }

    #[instrument(skip_all, fields(issue_id = %issue.id))]
    async fn create_target_record(&self, issue: &Issue) -> Result<PageRef> {
        let properties = create_properties(issue);
        let body = CreatePage {
            parent: Parent {
                database_id: &self.database_id,
            },
            properties: &properties,
        };
        let url = format!("{}/v1/pages", self.base_url);
        let page: PageRef = self.send(self.client.post(url).json(&body), "page create").await?;
        debug!(page_id = %page.id, url = page.url.as_deref().unwrap_or_default(), "created Notion page");
        Ok(page)
    }

    #[instrument(skip(self, issue), fields(issue_id = %issue.id))]
    async fn update_target_record(&self, page_id: &str, issue: &Issue) -> Result<PageRef> {
        let properties = page_properties(issue);
        let body = UpdatePage {
            properties: &properties,
        };
        let url = format!("{}/v1/pages/{page_id}", self.base_url);
        let page: PageRef = self.send(self.client.patch(url).json(&body), "page update").await?;
        debug!("updated Notion page");
        Ok(page)
    }
}
