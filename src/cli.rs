use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use crate::config::{self, AppConfig};
use crate::providers::{self, IssueSource, PageStore};
use crate::state::{resolve_cutoff, SyncState, WatermarkStore};
use crate::sync::{SyncOutcome, SyncSummary, Synchronizer};

/// Mirror recently updated Linear issues into a Notion database.
#[derive(Debug, Parser)]
#[command(name = "linear-notion-sync", version)]
pub struct Cli {
    /// Path to config.toml (default: ~/.linear-notion-sync/config.toml)
    #[arg(long, env = "LINEAR_NOTION_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fetch issues updated at or after this RFC 3339 timestamp, ignoring the watermark
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Look-back window used when no watermark is stored
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    pub window_hours: Option<i64>,

    /// Maximum number of issues fetched per run
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Where the sync watermark is kept
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Neither read nor write the watermark; always use the rolling window
    #[arg(long)]
    pub no_watermark: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(h) = self.window_hours {
            config.sync.window_hours = Some(h);
        }
        if let Some(n) = self.page_size {
            config.sync.page_size = Some(n);
        }
        if let Some(p) = &self.state_file {
            config.sync.state_file = Some(p.clone());
        }
    }
}

/// Per-run settings resolved from flags and config.
pub struct RunOptions {
    pub since: Option<DateTime<Utc>>,
    pub window: Duration,
    pub no_watermark: bool,
    pub max_attempts: u32,
    pub now: DateTime<Utc>,
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = config::load_config(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());
    cli.apply_overrides(&mut config);

    let creds = config.credentials()?;
    let (source, store) = providers::create_providers(&config, &creds)?;
    let state = WatermarkStore::new(config.state_file());
    let opts = RunOptions {
        since: cli.since,
        window: Duration::hours(config.window_hours()),
        no_watermark: cli.no_watermark,
        max_attempts: config.max_attempts(),
        now: Utc::now(),
    };

    let summary = execute(&source, &store, &state, &opts).await?;
    print_summary(&summary);
    Ok(())
}

/// One sync pass: resolve the cutoff, mirror the fetched issues, then record
/// progress. The state file is left alone under `--no-watermark` or when the
/// fetch fails.
pub async fn execute(
    source: &dyn IssueSource,
    store: &dyn PageStore,
    state: &WatermarkStore,
    opts: &RunOptions,
) -> Result<SyncSummary> {
    let stored = if opts.no_watermark {
        SyncState::default()
    } else {
        state.load()?
    };
    let since = resolve_cutoff(opts.since, stored.last_synced_at, opts.window, opts.now);
    info!(%since, watermark = stored.last_synced_at.is_some(), "starting sync");

    let summary = Synchronizer::new(source, store).run(since).await?;
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        "sync finished"
    );

    if !opts.no_watermark {
        let next = summary.checkpoint(since, &stored.failures, opts.max_attempts);
        let mark = next.last_synced_at;
        if state.commit(next)? {
            if let Some(mark) = mark {
                info!(watermark = %mark, path = %state.path().display(), "watermark advanced");
            }
        }
    }

    Ok(summary)
}

fn print_summary(summary: &SyncSummary) {
    println!("{} issues synced", summary.results.len());
    for line in summary_lines(summary) {
        println!("{line}");
    }
    println!(
        "Done: {} created, {} updated, {} failed",
        summary.created(),
        summary.updated(),
        summary.failed()
    );
    if summary.truncated {
        println!("More issues are pending; they will be picked up on the next run");
    }
}

fn summary_lines(summary: &SyncSummary) -> Vec<String> {
    summary
        .results
        .iter()
        .map(|r| match &r.outcome {
            Ok(SyncOutcome::Created { .. }) => format!("Created: {} {}", r.identifier, r.title),
            Ok(SyncOutcome::Updated { .. }) => format!("Updated: {} {}", r.identifier, r.title),
            Err(e) => format!("Failed: {} {} → {e}", r.identifier, r.title),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::{make_issue, MemoryPageStore, MockIssueSource};
    use crate::sync::{IssueResult, SyncError};
    use chrono::TimeZone;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("linear-notion-sync").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn no_args_is_a_plain_run() {
        let cli = parse(&[]);
        assert!(cli.since.is_none());
        assert!(!cli.no_watermark);
    }

    #[test]
    fn parses_since_timestamp() {
        let cli = parse(&["--since", "2024-01-01T00:00:00Z"]);
        assert_eq!(
            cli.since,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_bad_since_and_zero_window() {
        let bin = "linear-notion-sync";
        assert!(Cli::try_parse_from([bin, "--since", "yesterday"]).is_err());
        assert!(Cli::try_parse_from([bin, "--window-hours", "0"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "--window-hours",
            "24",
            "--page-size",
            "10",
            "--state-file",
            "/tmp/s.json",
            "--no-watermark",
        ]);
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.window_hours(), 24);
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.state_file(), PathBuf::from("/tmp/s.json"));
        assert!(cli.no_watermark);
    }

    #[test]
    fn summary_lines_are_prefixed_by_outcome() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let result = |identifier: &str, outcome| IssueResult {
            issue_id: identifier.to_lowercase(),
            identifier: identifier.into(),
            title: "Fix login".into(),
            updated_at: at,
            outcome,
        };
        let summary = SyncSummary {
            truncated: false,
            results: vec![
                result("ENG-1", Ok(SyncOutcome::Created { page_id: "p1".into() })),
                result("ENG-2", Ok(SyncOutcome::Updated { page_id: "p2".into() })),
                result("ENG-3", Err(SyncError::Create(anyhow::anyhow!("boom")))),
            ],
        };
        let lines = summary_lines(&summary);
        assert_eq!(lines[0], "Created: ENG-1 Fix login");
        assert_eq!(lines[1], "Updated: ENG-2 Fix login");
        assert_eq!(lines[2], "Failed: ENG-3 Fix login → create failed: boom");
    }

    fn options(source: &MockIssueSource) -> RunOptions {
        RunOptions {
            since: None,
            window: Duration::zero(),
            no_watermark: false,
            max_attempts: 3,
            now: source.cutoff(),
        }
    }

    fn six_issues() -> Vec<crate::model::issue::Issue> {
        (1..=6)
            .map(|n| make_issue(&format!("uuid-{n}"), &format!("Issue {n}")))
            .collect()
    }

    #[tokio::test]
    async fn permanently_failing_issue_does_not_stall_later_ones() {
        let dir = tempfile::tempdir().unwrap();
        let state = WatermarkStore::new(dir.path().join("state.json"));
        let source = MockIssueSource::new(six_issues()).with_page_size(3);
        let store = MemoryPageStore::new().failing_create_for("uuid-2");
        let opts = options(&source);

        for _ in 0..5 {
            execute(&source, &store, &state, &opts).await.unwrap();
        }

        for id in ["uuid-1", "uuid-3", "uuid-4", "uuid-5", "uuid-6"] {
            assert_eq!(store.matching(id), 1, "{id} not mirrored");
        }
        assert_eq!(store.matching("uuid-2"), 0);
        let saved = state.load().unwrap();
        assert_eq!(saved.last_synced_at, Some(six_issues()[5].updated_at));
        assert!(saved.failures.is_empty());
    }

    #[tokio::test]
    async fn failing_issue_holds_watermark_until_attempts_run_out() {
        let dir = tempfile::tempdir().unwrap();
        let state = WatermarkStore::new(dir.path().join("state.json"));
        let source = MockIssueSource::new(six_issues()).with_page_size(3);
        let store = MemoryPageStore::new().failing_create_for("uuid-2");
        let opts = options(&source);
        let first = six_issues()[0].updated_at;

        execute(&source, &store, &state, &opts).await.unwrap();
        execute(&source, &store, &state, &opts).await.unwrap();
        let held = state.load().unwrap();
        assert_eq!(held.last_synced_at, Some(first));
        assert_eq!(held.failures.get("uuid-2"), Some(&2));
        assert_eq!(store.matching("uuid-4"), 0);

        execute(&source, &store, &state, &opts).await.unwrap();
        let released = state.load().unwrap();
        assert_eq!(released.last_synced_at, Some(six_issues()[2].updated_at));
        assert!(released.failures.is_empty());
    }

    #[tokio::test]
    async fn no_watermark_neither_reads_nor_writes_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        // A stored mark in the future would filter out every issue if it were read.
        let contents = r#"{"last_synced_at": "2030-01-01T00:00:00Z"}"#;
        std::fs::write(&path, contents).unwrap();
        let state = WatermarkStore::new(&path);
        let source = MockIssueSource::new(six_issues());
        let store = MemoryPageStore::new();
        let opts = RunOptions {
            no_watermark: true,
            ..options(&source)
        };

        let summary = execute(&source, &store, &state, &opts).await.unwrap();
        assert_eq!(summary.created(), 6);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
    }

    #[tokio::test]
    async fn no_watermark_ignores_a_corrupt_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();
        let state = WatermarkStore::new(&path);
        let source = MockIssueSource::new(six_issues());
        let opts = RunOptions {
            no_watermark: true,
            ..options(&source)
        };

        execute(&source, &MemoryPageStore::new(), &state, &opts)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }

    #[tokio::test]
    async fn fetch_failure_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let missing = WatermarkStore::new(dir.path().join("fresh.json"));
        let source = MockIssueSource::failing();
        let opts = options(&source);

        let err = execute(&source, &MemoryPageStore::new(), &missing, &opts)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("fetch failed"));
        assert!(!missing.path().exists());

        let path = dir.path().join("state.json");
        let contents = r#"{"last_synced_at": "2024-01-02T00:00:00Z"}"#;
        std::fs::write(&path, contents).unwrap();
        let existing = WatermarkStore::new(&path);
        execute(&source, &MemoryPageStore::new(), &existing, &opts)
            .await
            .unwrap_err();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
    }

    #[tokio::test]
    async fn successful_run_records_the_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let state = WatermarkStore::new(dir.path().join("state.json"));
        let source = MockIssueSource::new(six_issues());
        let store = MemoryPageStore::new();

        execute(&source, &store, &state, &options(&source))
            .await
            .unwrap();
        assert_eq!(
            state.load().unwrap().last_synced_at,
            Some(six_issues()[5].updated_at)
        );

        // Second run resumes from the mark and only refetches the newest issue.
        let summary = execute(&source, &store, &state, &options(&source))
            .await
            .unwrap();
        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.updated(), 1);
    }
}
