//! Applying create and edit directives to the working tree.
//!
//! Every write is preceded by a syntax check (see [`crate::lint`]). Paths are
//! always relative to the repository root; anything that would escape it is
//! refused.

use std::path::{Component, Path, PathBuf};

use quill_tui::Theme;
use quill_tui::theme::paint;
use similar::{ChangeTag, TextDiff};
use tokio::fs;
use tracing::debug;

use crate::directive::Directive;
use crate::lint;

const CONTEXT_LINES: usize = 3;

/// The kind of one rendered diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Hunk,
    Context,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffKind,
    pub text: String,
}

/// A line-level diff of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDiff {
    pub lines: Vec<DiffLine>,
}

impl FileDiff {
    /// A diff for a new file: every line added.
    pub fn creation(body: &str) -> Self {
        let lines = body
            .lines()
            .map(|line| DiffLine {
                kind: DiffKind::Added,
                text: line.to_string(),
            })
            .collect();
        Self { lines }
    }

    /// Unified diff between two versions, without file headers.
    pub fn between(old: &str, new: &str) -> Self {
        let diff = TextDiff::from_lines(old, new);
        let mut lines = Vec::new();

        for hunk in diff.unified_diff().context_radius(CONTEXT_LINES).iter_hunks() {
            lines.push(DiffLine {
                kind: DiffKind::Hunk,
                text: hunk.header().to_string(),
            });
            for change in hunk.iter_changes() {
                let kind = match change.tag() {
                    ChangeTag::Delete => DiffKind::Removed,
                    ChangeTag::Insert => DiffKind::Added,
                    ChangeTag::Equal => DiffKind::Context,
                };
                lines.push(DiffLine {
                    kind,
                    text: change.value().trim_end_matches(['\n', '\r']).to_string(),
                });
            }
        }

        Self { lines }
    }

    pub fn added(&self) -> usize {
        self.count(DiffKind::Added)
    }

    pub fn removed(&self) -> usize {
        self.count(DiffKind::Removed)
    }

    fn count(&self, kind: DiffKind) -> usize {
        self.lines.iter().filter(|l| l.kind == kind).count()
    }

    /// One styled line per diff line, each ending in a newline.
    pub fn render(&self, theme: &Theme) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let styled = match line.kind {
                DiffKind::Hunk => paint(theme.dim_style(), &line.text),
                DiffKind::Context => format!(" {}", line.text),
                DiffKind::Added => paint(theme.diff_added(), &format!("+{}", line.text)),
                DiffKind::Removed => paint(theme.diff_removed(), &format!("-{}", line.text)),
            };
            out.push_str(&styled);
            out.push('\n');
        }
        out
    }
}

/// Result of applying one create or edit directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied(FileDiff),
    /// The replacement produced identical content; nothing was written
    Unchanged,
    SkippedExists,
    SkippedNotFound,
    SkippedNoMatch,
    SkippedLintFailed(String),
    /// Absolute, empty, or escaping the repository root
    SkippedUnsafePath,
    SkippedIo(String),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Create,
    Edit,
}

/// Outcome of one directive together with the path it named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditReport {
    pub kind: EditKind,
    pub path: String,
    pub outcome: EditOutcome,
}

impl EditReport {
    /// Diff (if any) followed by a one-line status.
    pub fn render(&self, theme: &Theme) -> String {
        let path = &self.path;
        let status = match (&self.outcome, self.kind) {
            (EditOutcome::Applied(diff), kind) => {
                let verb = match kind {
                    EditKind::Create => "Created",
                    EditKind::Edit => "Applied",
                };
                return format!(
                    "{}{}\n",
                    diff.render(theme),
                    paint(theme.success_style(), &format!("{} {}", verb, path))
                );
            }
            (EditOutcome::Unchanged, _) => {
                return paint(theme.dim_style(), &format!("No changes to {}", path)) + "\n";
            }
            (EditOutcome::SkippedExists, _) => format!("Skip create {} (already exists)", path),
            (EditOutcome::SkippedNotFound, _) => format!("Skip {} (not found)", path),
            (EditOutcome::SkippedNoMatch, _) => format!("Match failed in {}", path),
            (EditOutcome::SkippedLintFailed(reason), _) => {
                format!("Lint Fail {}: {}", path, reason)
            }
            (EditOutcome::SkippedUnsafePath, _) => {
                format!("Skip {} (outside the repository)", path)
            }
            (EditOutcome::SkippedIo(reason), _) => format!("Skip {}: {}", path, reason),
        };
        paint(theme.error_style(), &status) + "\n"
    }
}

/// Join a repository-relative path onto `root`, refusing paths that are
/// empty, absolute, or contain `..`.
pub(crate) fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.trim().is_empty() {
        return None;
    }
    let path = Path::new(relative);
    let safe = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| root.join(path))
}

/// Applies file-changing directives under a repository root.
#[derive(Debug, Clone)]
pub struct EditEngine {
    root: PathBuf,
}

impl EditEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        resolve_within(&self.root, relative)
    }

    /// Apply every create, then every edit, each group in textual order.
    pub async fn apply_all(&self, directives: &[Directive]) -> Vec<EditReport> {
        let creates = directives
            .iter()
            .filter(|d| matches!(d, Directive::Create { .. }));
        let edits = directives
            .iter()
            .filter(|d| matches!(d, Directive::Edit { .. }));

        let mut reports = Vec::new();
        for directive in creates.chain(edits) {
            if let Some(report) = self.apply(directive).await {
                reports.push(report);
            }
        }
        reports
    }

    /// Apply one directive. Directives that do not touch files yield `None`.
    pub async fn apply(&self, directive: &Directive) -> Option<EditReport> {
        let (kind, path, outcome) = match directive {
            Directive::Create { path, body } => {
                (EditKind::Create, path, self.create(path, body).await)
            }
            Directive::Edit {
                path,
                find,
                replace,
            } => (EditKind::Edit, path, self.edit(path, find, replace).await),
            Directive::RequestFiles(_)
            | Directive::DropFiles(_)
            | Directive::DetailMap(_)
            | Directive::Shell(_)
            | Directive::CommitMessage(_) => return None,
        };
        debug!("{:?} {}: {:?}", kind, path, outcome);
        Some(EditReport {
            kind,
            path: path.clone(),
            outcome,
        })
    }

    async fn create(&self, path: &str, body: &str) -> EditOutcome {
        let Some(target) = self.resolve(path) else {
            return EditOutcome::SkippedUnsafePath;
        };
        if fs::try_exists(&target).await.unwrap_or(true) {
            return EditOutcome::SkippedExists;
        }
        if let Err(reason) = lint::check(&target, body) {
            return EditOutcome::SkippedLintFailed(reason);
        }

        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return EditOutcome::SkippedIo(e.to_string());
            }
        }
        match fs::write(&target, body).await {
            Ok(()) => EditOutcome::Applied(FileDiff::creation(body)),
            Err(e) => EditOutcome::SkippedIo(e.to_string()),
        }
    }

    async fn edit(&self, path: &str, find: &str, replace: &str) -> EditOutcome {
        let Some(target) = self.resolve(path) else {
            return EditOutcome::SkippedUnsafePath;
        };
        match fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => {}
            _ => return EditOutcome::SkippedNotFound,
        }

        let content = match fs::read_to_string(&target).await {
            Ok(c) => c,
            Err(e) => return EditOutcome::SkippedIo(e.to_string()),
        };

        let find = find.trim();
        if find.is_empty() || !content.contains(find) {
            return EditOutcome::SkippedNoMatch;
        }
        let updated = content.replacen(find, replace.trim(), 1);

        if let Err(reason) = lint::check(&target, &updated) {
            return EditOutcome::SkippedLintFailed(reason);
        }
        if updated == content {
            return EditOutcome::Unchanged;
        }

        match fs::write(&target, &updated).await {
            Ok(()) => EditOutcome::Applied(FileDiff::between(&content, &updated)),
            Err(e) => EditOutcome::SkippedIo(e.to_string()),
        }
    }
}
