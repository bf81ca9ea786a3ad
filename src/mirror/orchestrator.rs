//! Turns one merged upstream pull request into a tracked downstream one.
//!
//! Sequence, all under the [`MirrorGate`]:
//!
//! 1. Refuse if the store already maps the upstream PR.
//! 2. Run the merge tool and append its output to the PR's log file.
//! 3. Open the downstream PR from the tool's branch.
//! 4. Label it (conflict label first when the tool rejected hunks).
//! 5. Record the mapping.
//!
//! Steps are not retried. Label failures are logged and skipped so the
//! mapping of an already-open PR is never lost.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::github::PlatformClient;
use crate::store::EventStore;
use crate::types::{CanonicalMergeEvent, PrNumber};

use super::error::MirrorError;
use super::gate::MirrorGate;
use super::render::{self, CONFLICT_LABEL, MERGED_LABEL};
use super::tool::{MirrorTool, ToolError, append_log_artifact};

/// A successful mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorResult {
    pub upstream: PrNumber,
    pub downstream: PrNumber,
    /// Raw merge tool output.
    pub output: String,
    /// The tool rejected part of the patch.
    pub had_conflicts: bool,
}

/// Owns everything a mirror attempt touches. Shared by the poller and the
/// webhook handler behind an `Arc`.
pub struct Mirrorer<P, T, S> {
    platform: P,
    tool: T,
    store: S,
    gate: MirrorGate,
    target_branch: String,
    log_dir: PathBuf,
}

impl<P, T, S> Mirrorer<P, T, S>
where
    P: PlatformClient,
    T: MirrorTool,
    S: EventStore,
{
    pub fn new(
        platform: P,
        tool: T,
        store: S,
        target_branch: impl Into<String>,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Mirrorer {
            platform,
            tool,
            store,
            gate: MirrorGate::new(),
            target_branch: target_branch.into(),
            log_dir: log_dir.into(),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn target_branch(&self) -> &str {
        &self.target_branch
    }

    /// Mirrors one merged upstream pull request.
    pub async fn mirror_pull_request(
        &self,
        pr: &CanonicalMergeEvent,
    ) -> Result<MirrorResult, MirrorError> {
        let _gate = self.gate.acquire().await;

        let lookup = self.store.lookup_downstream(pr.number).inspect_err(|e| {
            error!(pr = %pr.number, error = %e, "Mapping lookup failed; refusing to mirror");
        })?;
        if let Some(downstream) = lookup {
            warn!(pr = %pr.number, downstream = %downstream, "Upstream PR already mirrored");
            return Err(MirrorError::AlreadyMirrored {
                upstream: pr.number,
                downstream,
            });
        }

        let output = self.run_tool(pr).await?;

        let request = render::new_pull_request(pr, &self.target_branch);
        let downstream = match self.platform.create_pull_request(&request).await {
            Ok(number) => number,
            Err(source) => {
                error!(
                    pr = %pr.number,
                    head_branch = %request.head,
                    error = %source,
                    "Failed to open downstream PR; branch left behind"
                );
                return Err(MirrorError::PlatformCreateFailed {
                    head_branch: request.head,
                    source,
                });
            }
        };

        let had_conflicts = render::has_conflicts(&output);
        if had_conflicts {
            self.add_label(downstream, CONFLICT_LABEL).await;
        }
        self.add_label(downstream, MERGED_LABEL).await;

        if let Err(source) = self.store.record_mapping(downstream, pr.number) {
            error!(
                pr = %pr.number,
                downstream = %downstream,
                error = %source,
                "Downstream PR opened but mapping was not recorded"
            );
            return Err(MirrorError::MappingNotRecorded {
                upstream: pr.number,
                downstream,
                source,
            });
        }

        info!(
            pr = %pr.number,
            downstream = %downstream,
            had_conflicts,
            "Mirrored upstream PR"
        );

        Ok(MirrorResult {
            upstream: pr.number,
            downstream,
            output,
            had_conflicts,
        })
    }

    async fn run_tool(&self, pr: &CanonicalMergeEvent) -> Result<String, MirrorError> {
        match self.tool.run(pr.number, &pr.title).await {
            Ok(out) => {
                self.save_output(pr.number, &out.output).await;
                Ok(out.output)
            }
            Err(ToolError::Failed { output, exit_code }) => {
                self.save_output(pr.number, &output).await;
                error!(pr = %pr.number, exit_code = ?exit_code, "Merge tool failed");
                Err(MirrorError::ToolFailed {
                    pr: pr.number,
                    exit_code,
                    output,
                })
            }
            Err(ToolError::TimedOut { after }) => {
                error!(pr = %pr.number, after = ?after, "Merge tool timed out and was killed");
                Err(MirrorError::ToolTimedOut { pr: pr.number, after })
            }
            Err(ToolError::Spawn(source)) => {
                error!(pr = %pr.number, error = %source, "Failed to start merge tool");
                Err(MirrorError::ToolSpawn {
                    pr: pr.number,
                    source,
                })
            }
        }
    }

    /// Best-effort: a log write failure never changes the mirror outcome.
    async fn save_output(&self, pr: PrNumber, output: &str) {
        if output.is_empty() {
            return;
        }
        if let Err(e) = append_log_artifact(&self.log_dir, pr, output).await {
            warn!(pr = %pr, error = %e, "Failed to write merge tool log");
        }
    }

    async fn add_label(&self, downstream: PrNumber, label: &str) {
        if let Err(e) = self
            .platform
            .add_labels(downstream, &[label.to_string()])
            .await
        {
            warn!(downstream = %downstream, label, error = %e, "Failed to add label");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::{TempDir, tempdir};

    use crate::store::{MemoryEventStore, MirrorRecord, StoreError};
    use crate::test_utils::{InFlightCounter, MockPlatform, ScriptedTool, merged_pr};
    use crate::types::EventId;

    type TestMirrorer<S = MemoryEventStore> = Mirrorer<MockPlatform, ScriptedTool, S>;

    fn mirrorer(tool: ScriptedTool) -> (TestMirrorer, TempDir) {
        let dir = tempdir().unwrap();
        let m = Mirrorer::new(
            MockPlatform::new(100),
            tool,
            MemoryEventStore::new(),
            "master",
            dir.path().join("logs"),
        );
        (m, dir)
    }

    #[tokio::test]
    async fn clean_merge_end_to_end() {
        let (m, dir) = mirrorer(ScriptedTool::succeeding("applied cleanly"));
        let pr = merged_pr(42, "Fix bug", "cc @alice");

        let result = m.mirror_pull_request(&pr).await.unwrap();

        assert_eq!(result.upstream, PrNumber(42));
        assert_eq!(result.downstream, PrNumber(100));
        assert_eq!(result.output, "applied cleanly");
        assert!(!result.had_conflicts);

        let created = m.platform().created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].title, "[MIRROR] Fix bug");
        assert!(created[0].body.contains("cc @ alice"));
        assert!(created[0].body.contains(&pr.html_url));
        assert_eq!(created[0].head, "upstream-merge-42");
        assert_eq!(created[0].base, "master");
        assert!(created[0].maintainer_can_modify);

        assert_eq!(
            m.platform().labels_for(PrNumber(100)),
            vec![MERGED_LABEL.to_string()]
        );
        assert_eq!(
            m.store().lookup_downstream(PrNumber(42)).unwrap(),
            Some(PrNumber(100))
        );
        assert_eq!(m.tool().calls(), vec![(PrNumber(42), "Fix bug".to_string())]);

        let log = std::fs::read_to_string(dir.path().join("logs/upstream-merge-42.log")).unwrap();
        assert_eq!(log, "applied cleanly");
    }

    #[tokio::test]
    async fn second_mirror_is_refused_without_side_effects() {
        let (m, _dir) = mirrorer(ScriptedTool::succeeding("ok"));
        let pr = merged_pr(42, "Fix bug", "");
        m.mirror_pull_request(&pr).await.unwrap();

        let err = m.mirror_pull_request(&pr).await.unwrap_err();

        assert!(matches!(
            err,
            MirrorError::AlreadyMirrored { upstream, downstream }
                if upstream == PrNumber(42) && downstream == PrNumber(100)
        ));
        assert_eq!(m.platform().created().len(), 1);
        assert_eq!(m.platform().label_calls(), 1);
        assert_eq!(m.tool().calls().len(), 1);
    }

    #[tokio::test]
    async fn rejected_hunks_get_conflict_label_first() {
        let (m, _dir) = mirrorer(ScriptedTool::succeeding(
            "patching file x\nRejected hunk #1 at line 3\n",
        ));

        let result = m
            .mirror_pull_request(&merged_pr(5, "Partial", ""))
            .await
            .unwrap();

        assert!(result.had_conflicts);
        assert_eq!(
            m.platform().labels_for(result.downstream),
            vec![CONFLICT_LABEL.to_string(), MERGED_LABEL.to_string()]
        );
    }

    #[tokio::test]
    async fn tool_failure_creates_nothing_but_keeps_output() {
        let (m, dir) = mirrorer(ScriptedTool::failing("patch does not apply", 1));

        let err = m
            .mirror_pull_request(&merged_pr(9, "Broken", ""))
            .await
            .unwrap_err();

        match err {
            MirrorError::ToolFailed {
                pr,
                exit_code,
                output,
            } => {
                assert_eq!(pr, PrNumber(9));
                assert_eq!(exit_code, Some(1));
                assert_eq!(output, "patch does not apply");
            }
            other => panic!("expected ToolFailed, got {other:?}"),
        }
        assert!(m.platform().created().is_empty());
        assert_eq!(m.store().lookup_downstream(PrNumber(9)).unwrap(), None);
        let log = std::fs::read_to_string(dir.path().join("logs/upstream-merge-9.log")).unwrap();
        assert_eq!(log, "patch does not apply");
    }

    #[tokio::test]
    async fn timeout_and_spawn_failures_create_nothing() {
        let (m, _dir) = mirrorer(ScriptedTool::timing_out(Duration::from_secs(5)));
        let err = m
            .mirror_pull_request(&merged_pr(1, "t", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::ToolTimedOut { .. }));
        assert!(m.platform().created().is_empty());

        let (m, _dir) = mirrorer(ScriptedTool::unspawnable());
        let err = m
            .mirror_pull_request(&merged_pr(1, "t", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::ToolSpawn { .. }));
        assert!(m.platform().created().is_empty());
    }

    #[tokio::test]
    async fn create_failure_reports_head_branch_and_records_nothing() {
        let (m, _dir) = mirrorer(ScriptedTool::succeeding("ok"));
        m.platform().fail_create();

        let err = m
            .mirror_pull_request(&merged_pr(42, "Fix bug", ""))
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            MirrorError::PlatformCreateFailed { head_branch, .. } if head_branch == "upstream-merge-42"
        ));
        assert_eq!(m.platform().label_calls(), 0);
        assert_eq!(m.store().lookup_downstream(PrNumber(42)).unwrap(), None);
    }

    #[tokio::test]
    async fn label_failure_still_records_mapping() {
        let (m, _dir) = mirrorer(ScriptedTool::succeeding("Rejected hunk"));
        m.platform().fail_labels();

        let result = m
            .mirror_pull_request(&merged_pr(42, "Fix bug", ""))
            .await
            .unwrap();

        assert!(result.had_conflicts);
        assert_eq!(
            m.store().lookup_downstream(PrNumber(42)).unwrap(),
            Some(result.downstream)
        );
    }

    #[tokio::test]
    async fn unwritable_log_dir_does_not_fail_mirror() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let m = Mirrorer::new(
            MockPlatform::new(100),
            ScriptedTool::succeeding("ok"),
            MemoryEventStore::new(),
            "master",
            &blocker,
        );

        let result = m.mirror_pull_request(&merged_pr(3, "t", "")).await;

        assert!(result.is_ok());
    }

    /// Store whose lookups or writes can be made to fail, and which marks
    /// the end of a mirror's critical section on the shared counter.
    struct InstrumentedStore {
        inner: MemoryEventStore,
        in_flight: Option<Arc<InFlightCounter>>,
        fail_lookup: bool,
        fail_record: bool,
    }

    impl InstrumentedStore {
        fn new() -> Self {
            InstrumentedStore {
                inner: MemoryEventStore::new(),
                in_flight: None,
                fail_lookup: false,
                fail_record: false,
            }
        }
    }

    fn disk_error() -> StoreError {
        StoreError::Io(std::io::Error::other("disk full"))
    }

    impl EventStore for InstrumentedStore {
        fn has_seen(&self, id: &EventId) -> crate::store::Result<bool> {
            self.inner.has_seen(id)
        }
        fn mark_seen(&self, id: &EventId) -> crate::store::Result<()> {
            self.inner.mark_seen(id)
        }
        fn lookup_downstream(&self, upstream: PrNumber) -> crate::store::Result<Option<PrNumber>> {
            if self.fail_lookup {
                return Err(disk_error());
            }
            self.inner.lookup_downstream(upstream)
        }
        fn mirror_record(&self, upstream: PrNumber) -> crate::store::Result<Option<MirrorRecord>> {
            self.inner.mirror_record(upstream)
        }
        fn record_mapping(&self, downstream: PrNumber, upstream: PrNumber) -> crate::store::Result<()> {
            if let Some(counter) = &self.in_flight {
                counter.exit();
            }
            if self.fail_record {
                return Err(disk_error());
            }
            self.inner.record_mapping(downstream, upstream)
        }
        fn mapping_count(&self) -> crate::store::Result<usize> {
            self.inner.mapping_count()
        }
        fn seen_count(&self) -> crate::store::Result<usize> {
            self.inner.seen_count()
        }
    }

    fn instrumented(tool: ScriptedTool, store: InstrumentedStore) -> (TestMirrorer<InstrumentedStore>, TempDir) {
        let dir = tempdir().unwrap();
        let m = Mirrorer::new(MockPlatform::new(100), tool, store, "master", dir.path());
        (m, dir)
    }

    #[tokio::test]
    async fn lookup_failure_fails_closed() {
        let store = InstrumentedStore {
            fail_lookup: true,
            ..InstrumentedStore::new()
        };
        let (m, _dir) = instrumented(ScriptedTool::succeeding("ok"), store);

        let err = m
            .mirror_pull_request(&merged_pr(42, "t", ""))
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::Storage(_)));
        assert!(m.tool().calls().is_empty());
        assert!(m.platform().created().is_empty());
    }

    #[tokio::test]
    async fn mapping_write_failure_reports_downstream() {
        let store = InstrumentedStore {
            fail_record: true,
            ..InstrumentedStore::new()
        };
        let (m, _dir) = instrumented(ScriptedTool::succeeding("ok"), store);

        let err = m
            .mirror_pull_request(&merged_pr(42, "t", ""))
            .await
            .unwrap_err();

        match err {
            MirrorError::MappingNotRecorded {
                upstream,
                downstream,
                ..
            } => {
                assert_eq!(upstream, PrNumber(42));
                assert_eq!(downstream, PrNumber(100));
            }
            other => panic!("expected MappingNotRecorded, got {other:?}"),
        }
        assert_eq!(m.platform().created().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mirrors_never_overlap() {
        let counter = Arc::new(InFlightCounter::default());
        let tool = ScriptedTool::succeeding("ok")
            .with_delay(Duration::from_millis(20))
            .with_in_flight(Arc::clone(&counter));
        let store = InstrumentedStore {
            in_flight: Some(Arc::clone(&counter)),
            ..InstrumentedStore::new()
        };
        let (m, _dir) = instrumented(tool, store);
        let m = Arc::new(m);

        let mut tasks = Vec::new();
        for n in 1..=8u64 {
            let m = Arc::clone(&m);
            tasks.push(tokio::spawn(async move {
                m.mirror_pull_request(&merged_pr(n, "t", "")).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(counter.max(), 1);
        assert_eq!(m.store().mapping_count().unwrap(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mirrors_of_same_pr_create_one() {
        let tool = ScriptedTool::succeeding("ok").with_delay(Duration::from_millis(20));
        let (m, _dir) = mirrorer(tool);
        let m = Arc::new(m);

        let a = tokio::spawn({
            let m = Arc::clone(&m);
            async move { m.mirror_pull_request(&merged_pr(42, "t", "")).await }
        });
        let b = tokio::spawn({
            let m = Arc::clone(&m);
            async move { m.mirror_pull_request(&merged_pr(42, "t", "")).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(MirrorError::AlreadyMirrored { .. }))));
        assert_eq!(m.platform().created().len(), 1);
    }
}
