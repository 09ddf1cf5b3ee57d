//! Environment summary sent to the model as a system message.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

/// Tools whose presence is reported
const TOOLS: &[&str] = &[
    "apt", "bash", "cargo", "curl", "docker", "gcc", "git", "make", "node", "npm", "perl", "pip",
    "python3", "rustc", "sh", "tar", "unzip", "wget", "zip",
];

/// Tools whose `--version` line is reported
const VERSIONED: &[&str] = &["git", "cargo", "rustc", "python3", "node", "npm", "docker", "gcc"];

const VERSION_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_VERSION_CHARS: usize = 80;

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentSummary {
    pub os: String,
    pub release: String,
    pub machine: String,
    pub cwd: String,
    pub shell: String,
    pub path: String,
    pub tools: Vec<String>,
    pub versions: BTreeMap<String, String>,
}

impl EnvironmentSummary {
    /// Inspect the host. Computed once at startup.
    pub async fn collect(cwd: &Path) -> Self {
        let path = std::env::var("PATH").unwrap_or_default();
        let tools: Vec<String> = TOOLS
            .iter()
            .filter(|tool| which(tool, &path).is_some())
            .map(|tool| tool.to_string())
            .collect();

        let mut versions = BTreeMap::new();
        for tool in VERSIONED.iter().filter(|t| tools.iter().any(|have| have.as_str() == **t)) {
            if let Some(version) = first_line_of(tool, &["--version"]).await {
                versions.insert(tool.to_string(), version);
            }
        }

        let release = if cfg!(unix) {
            first_line_of("uname", &["-r"]).await.unwrap_or_default()
        } else {
            String::new()
        };

        Self {
            os: std::env::consts::OS.to_string(),
            release,
            machine: std::env::consts::ARCH.to_string(),
            cwd: cwd.display().to_string(),
            shell: std::env::var("SHELL")
                .or_else(|_| std::env::var("ComSpec"))
                .unwrap_or_default(),
            path,
            tools,
            versions,
        }
    }

    /// Compact JSON form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Locate `tool` on `path` (a `PATH`-style list).
fn which(tool: &str, path: &str) -> Option<PathBuf> {
    let names: Vec<String> = if cfg!(windows) {
        vec![format!("{}.exe", tool), format!("{}.cmd", tool), tool.to_string()]
    } else {
        vec![tool.to_string()]
    };
    std::env::split_paths(path)
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

async fn first_line_of(program: &str, args: &[&str]) -> Option<String> {
    let run = Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true)
        .output();
    let output = match tokio::time::timeout(VERSION_TIMEOUT, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("{} {:?} failed: {}", program, args, e);
            return None;
        }
        Err(_) => {
            debug!("{} {:?} timed out", program, args);
            return None;
        }
    };

    let text = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    let line: String = String::from_utf8_lossy(&text)
        .lines()
        .next()?
        .trim()
        .chars()
        .take(MAX_VERSION_CHARS)
        .collect();
    (!line.is_empty()).then_some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_which_searches_path_list() {
        let dir = TempDir::new().unwrap();
        let name = if cfg!(windows) { "fake.exe" } else { "fake" };
        std::fs::write(dir.path().join(name), "").unwrap();
        let path = std::env::join_paths([dir.path()]).unwrap();
        let path = path.to_string_lossy();

        assert_eq!(which("fake", &path), Some(dir.path().join(name)));
        assert_eq!(which("missing", &path), None);
    }

    #[tokio::test]
    async fn test_summary_json_fields() {
        let dir = TempDir::new().unwrap();
        let summary = EnvironmentSummary::collect(dir.path()).await;
        let value: serde_json::Value = serde_json::from_str(&summary.to_json()).unwrap();

        assert_eq!(value["os"], std::env::consts::OS);
        assert_eq!(value["machine"], std::env::consts::ARCH);
        assert_eq!(value["cwd"], dir.path().display().to_string());
        assert!(value["tools"].is_array());
        assert!(value["versions"].is_object());
        for tool in value["versions"].as_object().unwrap().keys() {
            assert!(summary.tools.contains(tool));
        }
    }
}
