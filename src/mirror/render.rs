//! Text of the downstream pull request and the labels applied to it.

use crate::github::NewPullRequest;
use crate::types::{CanonicalMergeEvent, PrNumber};

/// Label added to every mirrored pull request.
pub const MERGED_LABEL: &str = "Upstream PR Merged";

/// Label added when the merge tool rejected part of the patch.
pub const CONFLICT_LABEL: &str = "Auto Merge Rejections";

/// Tool output marker for a partially applied patch.
pub const CONFLICT_MARKER: &str = "Rejected hunk";

const TITLE_PREFIX: &str = "[MIRROR] ";
const BODY_SEPARATOR: &str = "--------------------";

/// Breaks `@handle` mentions so mirrored text does not ping upstream users.
pub fn escape_mentions(text: &str) -> String {
    text.replace('@', "@ ")
}

pub fn mirror_title(title: &str) -> String {
    format!("{TITLE_PREFIX}{title}")
}

/// Escaped upstream body, a separator line, then a link back upstream.
pub fn mirror_body(body: &str, upstream_url: &str) -> String {
    format!(
        "{}\n{BODY_SEPARATOR}\nOriginal PR: {upstream_url}",
        escape_mentions(body)
    )
}

/// Branch the merge tool leaves the mirrored changes on.
pub fn head_branch(upstream: PrNumber) -> String {
    format!("upstream-merge-{}", upstream.0)
}

pub fn has_conflicts(tool_output: &str) -> bool {
    tool_output.contains(CONFLICT_MARKER)
}

/// The downstream pull request for a merged upstream one.
pub fn new_pull_request(event: &CanonicalMergeEvent, target_branch: &str) -> NewPullRequest {
    NewPullRequest {
        title: mirror_title(&event.title),
        body: mirror_body(&event.body, &event.html_url),
        head: head_branch(event.number),
        base: target_branch.to_string(),
        maintainer_can_modify: true,
    }
}
