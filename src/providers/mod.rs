pub mod linear;
pub mod notion;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{AppConfig, Credentials};
use crate::model::issue::Issue;
use crate::model::page::PageRef;

/// Where issues come from.
#[async_trait]
pub trait IssueSource: Send + Sync {
    fn name(&self) -> &str;
    /// Issues updated at or after `since`, oldest first, capped at one page.
    async fn fetch_recent_issues(&self, since: DateTime<Utc>) -> Result<Vec<Issue>>;
    /// Maximum number of issues a single fetch returns.
    fn page_size(&self) -> u32;
}

/// Where issues are mirrored to.
#[async_trait]
pub trait PageStore: Send + Sync {
    fn name(&self) -> &str;
    /// The page whose stored issue id equals `issue_id`, if any.
    async fn find_target_record(&self, issue_id: &str) -> Result<Option<PageRef>>;
    async fn create_target_record(&self, issue: &Issue) -> Result<PageRef>;
    async fn update_target_record(&self, page_id: &str, issue: &Issue) -> Result<PageRef>;
}


pub fn create_providers(
    config: &AppConfig,
    creds: &Credentials,
) -> Result<(linear::LinearProvider, notion::NotionProvider)> {
    let source = linear::LinearProvider::new(
        &creds.linear_api_key,
        config.linear_url(),
        config.page_size(),
    )?;
    let store = notion::NotionProvider::new(
        &creds.notion_api_key,
        &creds.notion_database_id,
        config.notion_url(),
        config.notion_version(),
    )?;
    Ok((source, store))
}
