//! Shared test doubles and fixtures.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use crate::github::{EventFeedPage, GitHubApiError, NewPullRequest, PlatformClient};
use crate::mirror::{MirrorTool, ToolError, ToolOutput};
use crate::types::{CanonicalMergeEvent, EventId, PrAction, PrNumber};
use crate::webhooks::FeedEvent;

/// A merged pull request into `master`.
pub fn merged_pr(number: u64, title: &str, body: &str) -> CanonicalMergeEvent {
    CanonicalMergeEvent {
        number: PrNumber(number),
        title: title.to_string(),
        body: body.to_string(),
        author: "octocat".to_string(),
        html_url: format!("https://github.com/up/repo/pull/{number}"),
        base_branch: "master".to_string(),
        merged: true,
        action: PrAction::Closed,
        event_id: None,
    }
}

/// A `pull_request` payload as delivered by webhooks and embedded in feed
/// entries.
pub fn pull_request_payload(number: u64, action: &str, merged: bool, base: &str) -> serde_json::Value {
    json!({
        "action": action,
        "number": number,
        "pull_request": {
            "number": number,
            "title": format!("Upstream change {number}"),
            "body": "cc @alice",
            "user": { "login": "octocat" },
            "html_url": format!("https://github.com/up/repo/pull/{number}"),
            "base": { "ref": base },
            "merged": merged
        }
    })
}

/// A feed entry for a merged pull request into `master`.
pub fn merged_feed_event(id: &str, number: u64) -> FeedEvent {
    FeedEvent {
        id: EventId::from(id),
        kind: Some("PullRequestEvent".to_string()),
        payload: pull_request_payload(number, "closed", true, "master"),
    }
}

/// A feed entry of an arbitrary kind.
pub fn feed_event(id: &str, kind: &str, payload: serde_json::Value) -> FeedEvent {
    FeedEvent {
        id: EventId::from(id),
        kind: Some(kind.to_string()),
        payload,
    }
}

/// Tracks how many mirror critical sections are open at once.
#[derive(Debug, Default)]
pub struct InFlightCounter {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlightCounter {
    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest concurrency observed.
    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct MockPlatformState {
    next_number: u64,
    created: Vec<NewPullRequest>,
    labels: Vec<(PrNumber, Vec<String>)>,
    label_calls: usize,
    fail_create: bool,
    fail_labels: bool,
    feed: VecDeque<Result<EventFeedPage, String>>,
    feed_calls: usize,
}

/// Records platform calls; hands out sequential downstream PR numbers.
#[derive(Debug, Default)]
pub struct MockPlatform {
    state: Mutex<MockPlatformState>,
}

impl MockPlatform {
    /// The first created PR gets `first_number`.
    pub fn new(first_number: u64) -> Self {
        MockPlatform {
            state: Mutex::new(MockPlatformState {
                next_number: first_number,
                ..Default::default()
            }),
        }
    }

    pub fn fail_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn fail_labels(&self) {
        self.state.lock().unwrap().fail_labels = true;
    }

    /// Queues a feed page; fetches past the queue return an empty page.
    pub fn push_feed(&self, page: EventFeedPage) {
        self.state.lock().unwrap().feed.push_back(Ok(page));
    }

    pub fn push_feed_error(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .feed
            .push_back(Err(message.to_string()));
    }

    pub fn created(&self) -> Vec<NewPullRequest> {
        self.state.lock().unwrap().created.clone()
    }

    /// Labels successfully applied to `pr`, in order.
    pub fn labels_for(&self, pr: PrNumber) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .labels
            .iter()
            .filter(|(n, _)| *n == pr)
            .flat_map(|(_, labels)| labels.iter().cloned())
            .collect()
    }

    /// Label calls attempted, including failed ones.
    pub fn label_calls(&self) -> usize {
        self.state.lock().unwrap().label_calls
    }

    pub fn feed_calls(&self) -> usize {
        self.state.lock().unwrap().feed_calls
    }
}

impl PlatformClient for MockPlatform {
    async fn create_pull_request(&self, pr: &NewPullRequest) -> Result<PrNumber, GitHubApiError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(GitHubApiError::with_status(
                "create pull request",
                422,
                "Validation Failed",
            ));
        }
        let number = PrNumber(state.next_number);
        state.next_number += 1;
        state.created.push(pr.clone());
        Ok(number)
    }

    async fn add_labels(&self, pr: PrNumber, labels: &[String]) -> Result<(), GitHubApiError> {
        let mut state = self.state.lock().unwrap();
        state.label_calls += 1;
        if state.fail_labels {
            return Err(GitHubApiError::with_status("add labels", 500, "Server Error"));
        }
        state.labels.push((pr, labels.to_vec()));
        Ok(())
    }

    async fn list_repo_events(&self) -> Result<EventFeedPage, GitHubApiError> {
        let mut state = self.state.lock().unwrap();
        state.feed_calls += 1;
        match state.feed.pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(message)) => Err(GitHubApiError::without_source("list repo events", message)),
            None => Ok(EventFeedPage {
                events: Vec::new(),
                poll_interval: None,
            }),
        }
    }
}

/// One scripted tool outcome.
#[derive(Debug, Clone)]
pub enum Script {
    Succeed(String),
    Fail { output: String, exit_code: i32 },
    TimeOut(Duration),
    SpawnError,
}

/// A [`MirrorTool`] that replays scripted outcomes.
///
/// Outcomes are consumed in order; the last one repeats forever.
#[derive(Debug)]
pub struct ScriptedTool {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<(PrNumber, String)>>,
    delay: Option<Duration>,
    in_flight: Option<Arc<InFlightCounter>>,
}

impl ScriptedTool {
    pub fn sequence(scripts: impl IntoIterator<Item = Script>) -> Self {
        let scripts: VecDeque<Script> = scripts.into_iter().collect();
        assert!(!scripts.is_empty(), "ScriptedTool needs at least one script");
        ScriptedTool {
            scripts: Mutex::new(scripts),
            calls: Mutex::new(Vec::new()),
            delay: None,
            in_flight: None,
        }
    }

    pub fn succeeding(output: &str) -> Self {
        Self::sequence([Script::Succeed(output.to_string())])
    }

    pub fn failing(output: &str, exit_code: i32) -> Self {
        Self::sequence([Script::Fail {
            output: output.to_string(),
            exit_code,
        }])
    }

    /// Reports a timeout after `after` without actually waiting.
    pub fn timing_out(after: Duration) -> Self {
        Self::sequence([Script::TimeOut(after)])
    }

    pub fn unspawnable() -> Self {
        Self::sequence([Script::SpawnError])
    }

    /// Sleeps this long inside every run.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Enters `counter` at the start of every run.
    pub fn with_in_flight(mut self, counter: Arc<InFlightCounter>) -> Self {
        self.in_flight = Some(counter);
        self
    }

    pub fn calls(&self) -> Vec<(PrNumber, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn next_script(&self) -> Script {
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap()
        } else {
            scripts[0].clone()
        }
    }
}

impl MirrorTool for ScriptedTool {
    async fn run(&self, pr: PrNumber, title: &str) -> Result<ToolOutput, ToolError> {
        if let Some(counter) = &self.in_flight {
            counter.enter();
        }
        self.calls.lock().unwrap().push((pr, title.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_script() {
            Script::Succeed(output) => Ok(ToolOutput { output }),
            Script::Fail { output, exit_code } => Err(ToolError::Failed {
                output,
                exit_code: Some(exit_code),
            }),
            Script::TimeOut(after) => Err(ToolError::TimedOut { after }),
            Script::SpawnError => Err(ToolError::Spawn(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            ))),
        }
    }
}
