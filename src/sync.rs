//! Per-issue lookup → create/update, with failures isolated to the issue.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::model::issue::Issue;
use crate::providers::{IssueSource, PageStore};
use crate::state::SyncState;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),
    #[error("lookup failed: {0:#}")]
    Lookup(anyhow::Error),
    #[error("create failed: {0:#}")]
    Create(anyhow::Error),
    #[error("update failed: {0:#}")]
    Update(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created { page_id: String },
    Updated { page_id: String },
}

#[derive(Debug)]
pub struct IssueResult {
    pub issue_id: String,
    pub identifier: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub outcome: Result<SyncOutcome, SyncError>,
}

#[derive(Debug, Default)]
pub struct SyncSummary {
    /// True when the fetch filled a whole page, so more issues may be waiting.
    pub truncated: bool,
    pub results: Vec<IssueResult>,
}

impl SyncSummary {
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, Ok(SyncOutcome::Created { .. })))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, Ok(SyncOutcome::Updated { .. })))
    }

    pub fn failed(&self) -> usize {
        self.count(Result::is_err)
    }

    pub fn succeeded(&self) -> usize {
        self.results.len() - self.failed()
    }

    fn count(&self, pred: impl Fn(&Result<SyncOutcome, SyncError>) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// The state to persist after this run, fetched with cutoff `since`.
    ///
    /// Results are oldest first. The watermark follows successes and stops
    /// at the first failure, so that issue is refetched next run. `prior`
    /// counts how many runs each issue has already failed; once an issue
    /// reaches `max_attempts` it is skipped and stops holding the mark back.
    /// A full page that cannot move the mark past `since` (every issue shares
    /// one `updatedAt`) is stepped over by a millisecond.
    pub fn checkpoint(
        &self,
        since: DateTime<Utc>,
        prior: &BTreeMap<String, u32>,
        max_attempts: u32,
    ) -> SyncState {
        let mut mark: Option<DateTime<Utc>> = None;
        let mut failures = BTreeMap::new();
        let mut pinned = false;

        for r in &self.results {
            match &r.outcome {
                Ok(_) if !pinned => mark = mark.max(Some(r.updated_at)),
                Ok(_) => {}
                Err(_) => {
                    let attempts = prior.get(&r.issue_id).copied().unwrap_or(0) + 1;
                    if pinned || attempts < max_attempts {
                        pinned = true;
                        failures.insert(r.issue_id.clone(), attempts);
                    } else {
                        warn!(
                            identifier = %r.identifier,
                            attempts,
                            "giving up on issue; it syncs again once it changes in Linear"
                        );
                        mark = mark.max(Some(r.updated_at));
                    }
                }
            }
        }

        if self.truncated && !pinned && mark.map_or(true, |m| m <= since) {
            if let Some(last) = self.results.last() {
                let step = last.updated_at + Duration::milliseconds(1);
                warn!(
                    at = %last.updated_at,
                    "a full page shares one updatedAt; issues beyond it are skipped"
                );
                mark = Some(step);
            }
        }

        SyncState {
            last_synced_at: mark,
            failures,
        }
    }
}

pub struct Synchronizer<'a> {
    source: &'a dyn IssueSource,
    store: &'a dyn PageStore,
}

impl<'a> Synchronizer<'a> {
    pub fn new(source: &'a dyn IssueSource, store: &'a dyn PageStore) -> Self {
        Self { source, store }
    }

    /// Fetch issues updated since `since` and mirror each one. Only a failed
    /// fetch aborts the run.
    pub async fn run(&self, since: DateTime<Utc>) -> Result<SyncSummary, SyncError> {
        let issues = self
            .source
            .fetch_recent_issues(since)
            .await
            .map_err(SyncError::Fetch)?;
        info!(
            count = issues.len(),
            source = self.source.name(),
            target = self.store.name(),
            "syncing issues"
        );

        let truncated = issues.len() >= self.source.page_size() as usize;
        if truncated {
            warn!(
                page_size = self.source.page_size(),
                "fetch returned a full page; remaining issues wait for the next run"
            );
        }

        let mut summary = self.sync_all(&issues).await;
        summary.truncated = truncated;
        Ok(summary)
    }

    /// Sync each issue in order; a failure is recorded and the loop moves on.
    pub async fn sync_all(&self, issues: &[Issue]) -> SyncSummary {
        let mut results = Vec::with_capacity(issues.len());
        for issue in issues {
            let outcome = self.sync_issue(issue).await;
            match &outcome {
                Ok(SyncOutcome::Created { page_id }) => {
                    info!(identifier = %issue.identifier, %page_id, "created: {}", issue.title)
                }
                Ok(SyncOutcome::Updated { page_id }) => {
                    info!(identifier = %issue.identifier, %page_id, "updated: {}", issue.title)
                }
                Err(e) => {
                    error!(identifier = %issue.identifier, error = %e, "failed: {}", issue.title)
                }
            }
            results.push(IssueResult {
                issue_id: issue.id.clone(),
                identifier: issue.identifier.clone(),
                title: issue.title.clone(),
                updated_at: issue.updated_at,
                outcome,
            });
        }
        SyncSummary {
            truncated: false,
            results,
        }
    }

    pub async fn sync_issue(&self, issue: &Issue) -> Result<SyncOutcome, SyncError> {
        let existing = self
            .store
            .find_target_record(&issue.id)
            .await
            .map_err(SyncError::Lookup)?;

        match existing {
            Some(page) => {
                self.store
                    .update_target_record(&page.id, issue)
                    .await
                    .map_err(SyncError::Update)?;
                Ok(SyncOutcome::Updated { page_id: page.id })
            }
            None => {
                let page = self
                    .store
                    .create_target_record(issue)
                    .await
                    .map_err(SyncError::Create)?;
                Ok(SyncOutcome::Created { page_id: page.id })
            }
        }
    }
}
