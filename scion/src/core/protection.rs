//! Review gate for core files.
//!
//! Writes and deletes that target a protected path never reach the disk.
//! Instead they become a [`Proposal`] that a human (or a deployment step)
//! applies out of band.

use chrono::{DateTime, Utc};

/// The agent's own state directory. Always protected.
pub const STATE_DIR_NAME: &str = ".scion";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Protected,
    Unprotected,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectionPolicy {
    protected: Vec<String>,
    allowed: Vec<String>,
}

impl ProtectionPolicy {
    pub fn new(protected: &[String], allowed: &[String]) -> Self {
        let mut protected: Vec<String> = protected.iter().map(|p| trim_prefix(p)).collect();
        protected.push(STATE_DIR_NAME.to_string());
        Self {
            protected,
            allowed: allowed.iter().map(|p| trim_prefix(p)).collect(),
        }
    }

    /// Classify a workspace-relative, `/`-separated path.
    pub fn classify(&self, relative: &str) -> Protection {
        if self
            .allowed
            .iter()
            .any(|prefix| matches_prefix(relative, prefix))
        {
            return Protection::Unprotected;
        }
        if self
            .protected
            .iter()
            .any(|prefix| matches_prefix(relative, prefix))
        {
            return Protection::Protected;
        }
        Protection::Unprotected
    }

    pub fn is_protected(&self, relative: &str) -> bool {
        self.classify(relative) == Protection::Protected
    }
}

fn trim_prefix(prefix: &str) -> String {
    prefix.trim_start_matches("./").trim_matches('/').to_string()
}

/// Whole-component prefix match: `src` matches `src/a.rs` but not `srcs/a.rs`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    let mut path_parts = path.split('/');
    prefix
        .split('/')
        .all(|part| path_parts.next() == Some(part))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalKind {
    Modification,
    Deletion,
}

/// A change to a protected file awaiting review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub kind: ProposalKind,
    pub target: String,
    pub content: String,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    /// Render the proposal block. The content is included in full.
    pub fn render(&self) -> String {
        let heading = match self.kind {
            ProposalKind::Modification => "ACTION PROPOSAL: CORE FILE MODIFICATION",
            ProposalKind::Deletion => "ACTION PROPOSAL: CORE FILE DELETION",
        };
        let mut out = String::new();
        out.push_str(heading);
        out.push('\n');
        out.push_str(&format!("TARGET: {}\n", self.target));
        out.push_str(&format!("CREATED: {}\n", self.created_at.to_rfc3339()));
        if !self.explanation.is_empty() {
            out.push_str(&format!("REASON: {}\n", self.explanation));
        }
        out.push_str("--- PROPOSED CONTENT START ---\n");
        out.push_str(&self.content);
        if !self.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("--- PROPOSED CONTENT END ---\n");
        out
    }

    /// File name for the recorded copy: timestamp plus a sanitized target.
    ///
    /// A non-zero `sequence` is appended so proposals for the same target in
    /// the same millisecond get distinct names.
    pub fn file_name(&self, sequence: u32) -> String {
        let target: String = self
            .target
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
            .collect();
        let stamp = self.created_at.format("%Y%m%dT%H%M%S%.3fZ");
        match sequence {
            0 => format!("{stamp}-{target}.md"),
            n => format!("{stamp}-{target}-{n}.md"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy(protected: &[&str], allowed: &[&str]) -> ProtectionPolicy {
        let protected: Vec<String> = protected.iter().map(|s| s.to_string()).collect();
        let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
        ProtectionPolicy::new(&protected, &allowed)
    }

    #[test]
    fn prefixes_match_whole_components() {
        let policy = policy(&["src"], &[]);
        assert!(policy.is_protected("src/main.rs"));
        assert!(policy.is_protected("src"));
        assert!(!policy.is_protected("srcs/main.rs"));
        assert!(!policy.is_protected("notes.md"));
    }

    #[test]
    fn allowed_prefix_wins_over_protected() {
        let policy = policy(&["src/"], &["src/scratch"]);
        assert!(policy.is_protected("src/lib.rs"));
        assert_eq!(policy.classify("src/scratch/tmp.rs"), Protection::Unprotected);
    }

    #[test]
    fn state_dir_is_always_protected() {
        let policy = policy(&[], &[]);
        assert!(policy.is_protected(".scion/state/queue.json"));
    }

    #[test]
    fn render_contains_full_content_between_markers() {
        let proposal = Proposal {
            kind: ProposalKind::Modification,
            target: "scion.toml".to_string(),
            content: "line one\nline two".to_string(),
            explanation: "tune limits".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
        };
        let rendered = proposal.render();
        assert!(rendered.starts_with("ACTION PROPOSAL: CORE FILE MODIFICATION\nTARGET: scion.toml\n"));
        assert!(rendered.contains(
            "--- PROPOSED CONTENT START ---\nline one\nline two\n--- PROPOSED CONTENT END ---"
        ));
        assert_eq!(proposal.file_name(0), "20250102T030405.000Z-scion.toml.md");
        assert_eq!(proposal.file_name(2), "20250102T030405.000Z-scion.toml-2.md");
    }
}
