//! Project instruction loading
//!
//! Instruction files (QUILL.md or AGENTS.md) are read from:
//! 1. Global: the quill config directory
//! 2. Every directory from the repository root down to the working directory
//!
//! Later files take priority and are appended after earlier ones. The
//! combined text is added to the system instructions.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Names of instruction files to look for (in order of preference)
const CONTEXT_FILE_NAMES: &[&str] = &["QUILL.md", "AGENTS.md"];

const SEPARATOR: &str = "\n\n---\n\n";

/// Load all instruction files that apply to `cwd` inside `root`.
pub fn load_context(root: &Path, cwd: &Path) -> Option<String> {
    let mut dirs = vec![crate::config::Config::config_dir()];
    dirs.extend(dirs_between(root, cwd));
    combine(&dirs)
}

fn combine(dirs: &[PathBuf]) -> Option<String> {
    let parts: Vec<String> = dirs
        .iter()
        .filter_map(|dir| load_context_from_dir(dir))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(SEPARATOR))
    }
}

/// Directories from `root` down to `cwd`, both included.
///
/// When `cwd` is outside `root`, only `root` is returned.
fn dirs_between(root: &Path, cwd: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut current = Some(cwd);

    while let Some(dir) = current {
        if !dir.starts_with(root) {
            break;
        }
        dirs.push(dir.to_path_buf());
        if dir == root {
            break;
        }
        current = dir.parent();
    }

    if dirs.is_empty() {
        dirs.push(root.to_path_buf());
    }
    dirs.reverse();
    dirs
}

/// Load the first non-empty instruction file in `dir`
fn load_context_from_dir(dir: &Path) -> Option<String> {
    for name in CONTEXT_FILE_NAMES {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let content = content.trim();
                if !content.is_empty() {
                    debug!("Loaded project instructions from {}", path.display());
                    return Some(content.to_string());
                }
            }
            Err(e) => warn!("Cannot read {}: {}", path.display(), e),
        }
    }
    None
}
