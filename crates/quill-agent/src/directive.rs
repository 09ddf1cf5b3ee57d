//! Directive extraction from a complete reply.
//!
//! A reply may embed any number of tagged directives:
//!
//! ```text
//! <create path="src/new.rs">BODY</create>
//! <edit path="src/lib.rs"><find>OLD</find><replace>NEW</replace></edit>
//! <request_files>a.rs
//! b.rs</request_files>
//! <drop_files>c.rs</drop_files>
//! <detail_map>src/lib.rs</detail_map>
//! <shell>cargo test</shell>          (or <bash>…</bash>)
//! <commit_message>Fix parser</commit_message>
//! ```
//!
//! Extraction is a pure function of the text. Unclosed or malformed tags are
//! not directives and are skipped without error.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Commit message used when a reply carries none.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Update";

/// One instruction embedded in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Create a new file; `body` is trimmed.
    Create { path: String, body: String },
    /// Replace the first occurrence of `find` in an existing file.
    ///
    /// `find` and `replace` are kept raw; they are trimmed when applied.
    Edit {
        path: String,
        find: String,
        replace: String,
    },
    RequestFiles(Vec<String>),
    DropFiles(Vec<String>),
    DetailMap(Vec<String>),
    Shell(String),
    CommitMessage(String),
}

type Builder = fn(&Captures) -> Directive;

static PATTERNS: LazyLock<Vec<(Regex, Builder)>> = LazyLock::new(|| {
    let patterns: [(&str, Builder); 8] = [
        (
            r#"(?s)<create\s+path="([^"]*)"[^>]*>(.*?)</create>"#,
            |c| Directive::Create {
                path: group(c, 1).trim().to_string(),
                body: group(c, 2).trim().to_string(),
            },
        ),
        (
            r#"(?s)<edit\s+path="([^"]*)"[^>]*>\s*<find>(.*?)</find>\s*<replace>(.*?)</replace>\s*</edit>"#,
            |c| Directive::Edit {
                path: group(c, 1).trim().to_string(),
                find: group(c, 2).to_string(),
                replace: group(c, 3).to_string(),
            },
        ),
        (
            r"(?s)<request_files>(.*?)</request_files>",
            |c| Directive::RequestFiles(path_list(group(c, 1))),
        ),
        (
            r"(?s)<drop_files>(.*?)</drop_files>",
            |c| Directive::DropFiles(path_list(group(c, 1))),
        ),
        (
            r"(?s)<detail_map>(.*?)</detail_map>",
            |c| Directive::DetailMap(path_list(group(c, 1))),
        ),
        (r"(?s)<shell>(.*?)</shell>", |c| {
            Directive::Shell(group(c, 1).trim().to_string())
        }),
        (r"(?s)<bash>(.*?)</bash>", |c| {
            Directive::Shell(group(c, 1).trim().to_string())
        }),
        (r"(?s)<commit_message>(.*?)</commit_message>", |c| {
            Directive::CommitMessage(group(c, 1).trim().to_string())
        }),
    ];

    patterns
        .into_iter()
        .map(|(p, build)| (Regex::new(p).expect("valid regex"), build))
        .collect()
});

fn group<'t>(caps: &Captures<'t>, i: usize) -> &'t str {
    caps.get(i).map_or("", |m| m.as_str())
}

fn path_list(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract every directive from `text` in textual order.
///
/// A match that starts inside an earlier directive (for example a `<shell>`
/// tag written inside a `<create>` body) is not a directive of its own.
pub fn extract(text: &str) -> Vec<Directive> {
    let mut found: Vec<(usize, usize, Directive)> = PATTERNS
        .iter()
        .flat_map(|(re, build)| {
            re.captures_iter(text).filter_map(move |caps| {
                let whole = caps.get(0)?;
                Some((whole.start(), whole.end(), build(&caps)))
            })
        })
        .collect();
    found.sort_by_key(|(start, _, _)| *start);

    let mut directives = Vec::with_capacity(found.len());
    let mut covered = 0;
    for (start, end, directive) in found {
        if start < covered {
            continue;
        }
        covered = end;
        directives.push(directive);
    }
    directives
}

/// The first non-empty commit message, or [`DEFAULT_COMMIT_MESSAGE`].
pub fn commit_message(directives: &[Directive]) -> &str {
    directives
        .iter()
        .find_map(|d| match d {
            Directive::CommitMessage(msg) if !msg.is_empty() => Some(msg.as_str()),
            _ => None,
        })
        .unwrap_or(DEFAULT_COMMIT_MESSAGE)
}
