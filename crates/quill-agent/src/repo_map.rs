//! Repository structure summaries sent with every request.
//!
//! The map lists each tracked file with its top-level definitions. Rust
//! files are parsed with `syn`; other languages (and Rust files that fail to
//! parse) fall back to a line-oriented regex heuristic.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use syn::Item;
use tokio::fs;
use tracing::{debug, warn};

use crate::edit::resolve_within;
use crate::vcs;

/// Files larger than this are listed without definitions.
const MAX_SCAN_BYTES: u64 = 256 * 1024;

const SKIP_DIRS: &[&str] = &[
    "target",
    "node_modules",
    "__pycache__",
    "dist",
    "build",
    "venv",
];

const OUTLINED_EXTENSIONS: &[&str] = &["rs", "py", "js", "jsx", "mjs", "ts", "tsx", "go"];

static RUST_TOP_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?(?:fn|struct|enum|trait|type|mod|union)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("valid regex")
});

static OTHER_TOP_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(?:export\s+)?(?:default\s+)?(?:async\s+)?(?:def|class|function|interface|type|enum|func)\s+(?:\([^)]*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)",
    )
    .expect("valid regex")
});

/// Any definition line, nested or not.
static DEFINITION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:pub(?:\([^)]*\))?|export|default|async|unsafe|static|abstract|public|private|protected)\s+)*(?:fn|struct|enum|trait|type|impl|mod|def|class|function|interface|func)\b",
    )
    .expect("valid regex")
});

fn is_outlined(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| OUTLINED_EXTENSIONS.contains(&ext))
}

/// Names of the top-level definitions in `content`.
pub fn top_level_names(path: &str, content: &str) -> Vec<String> {
    if path.ends_with(".rs") {
        match syn::parse_file(content) {
            Ok(file) => return file.items.iter().filter_map(item_name).collect(),
            Err(e) => debug!("{} did not parse ({}), using heuristic outline", path, e),
        }
        return captures(&RUST_TOP_LEVEL, content);
    }
    captures(&OTHER_TOP_LEVEL, content)
}

fn item_name(item: &Item) -> Option<String> {
    let ident = match item {
        Item::Fn(f) => &f.sig.ident,
        Item::Struct(s) => &s.ident,
        Item::Enum(e) => &e.ident,
        Item::Trait(t) => &t.ident,
        Item::Type(t) => &t.ident,
        Item::Mod(m) => &m.ident,
        Item::Union(u) => &u.ident,
        Item::Macro(m) => m.ident.as_ref()?,
        _ => return None,
    };
    Some(ident.to_string())
}

fn captures(re: &Regex, content: &str) -> Vec<String> {
    re.captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Every file in the repository, relative to `root` and sorted.
///
/// Uses `git ls-files` when available, otherwise walks the tree skipping
/// hidden and build directories.
pub async fn list_files(root: &Path) -> Vec<String> {
    match vcs::tracked_files(root).await {
        Some(files) if !files.is_empty() => files,
        _ => walk(root),
    }
}

fn walk(root: &Path) -> Vec<String> {
    let pattern = format!("{}/**/*", glob::Pattern::escape(&root.to_string_lossy()));
    let Ok(entries) = glob::glob(&pattern) else {
        return Vec::new();
    };

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            let relative = path.strip_prefix(root).ok()?;
            let skipped = relative.components().any(|c| {
                let name = c.as_os_str().to_string_lossy();
                name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref())
            });
            (!skipped).then(|| relative.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

async fn read_small(path: &Path) -> Option<String> {
    let meta = fs::metadata(path).await.ok()?;
    if !meta.is_file() || meta.len() > MAX_SCAN_BYTES {
        return None;
    }
    fs::read_to_string(path).await.ok()
}

/// One line per file: `path` or `path: name, name, ...`.
pub async fn repo_map(root: &Path) -> String {
    let mut lines = Vec::new();
    for file in list_files(root).await {
        let names = if is_outlined(&file) {
            match read_small(&root.join(&file)).await {
                Some(content) => top_level_names(&file, &content),
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };
        if names.is_empty() {
            lines.push(file);
        } else {
            lines.push(format!("{}: {}", file, names.join(", ")));
        }
    }
    lines.join("\n")
}

/// Definition lines (nested ones included) with line numbers for each
/// requested file.
pub async fn detail_map(root: &Path, paths: &[String]) -> String {
    let mut out = Vec::new();
    for path in paths {
        let Some(target) = resolve_within(root, path) else {
            warn!("detail map: refusing {}", path);
            out.push(format!("File: {} (outside the repository)", path));
            continue;
        };
        let Ok(content) = fs::read_to_string(&target).await else {
            warn!("detail map: cannot read {}", path);
            out.push(format!("File: {} (not found)", path));
            continue;
        };
        out.push(format!("File: {}", path));
        let mut found = false;
        for (number, line) in content.lines().enumerate() {
            if DEFINITION_LINE.is_match(line) {
                let line = line.trim_end().trim_end_matches('{').trim_end();
                out.push(format!("{:>5}: {}", number + 1, line));
                found = true;
            }
        }
        if !found {
            out.push("  (no definitions found)".to_string());
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rust_names_with_syn() {
        let src = "pub struct Config;\nimpl Config { fn a(&self) {} }\nenum E { A }\n\
                   pub(crate) fn parse() {}\nmacro_rules! m { () => {} }\nuse std::fmt;\n";
        assert_eq!(
            top_level_names("src/lib.rs", src),
            vec!["Config", "E", "parse", "m"]
        );
    }

    #[test]
    fn test_rust_fallback_on_parse_error() {
        let src = "pub fn ok() {}\nfn broken( {\nstruct Later;\n";
        assert_eq!(top_level_names("a.rs", src), vec!["ok", "broken", "Later"]);
    }

    #[test]
    fn test_other_languages() {
        let py = "import os\n\nclass App:\n    def run(self):\n        pass\n\ndef main():\n    pass\n";
        assert_eq!(top_level_names("app.py", py), vec!["App", "main"]);

        let ts = "export default async function handler() {}\nexport interface Props {}\nconst x = 1;\n";
        assert_eq!(top_level_names("a.ts", ts), vec!["handler", "Props"]);

        let go = "package main\nfunc (s *Server) Start() {}\ntype Server struct {}\n";
        assert_eq!(top_level_names("main.go", go), vec!["Start", "Server"]);
    }

    #[tokio::test]
    async fn test_repo_map_walks_without_git() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        std::fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn run() {}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# hi\n").unwrap();
        std::fs::write(dir.path().join("target/debug/out.rs"), "fn x() {}").unwrap();
        std::fs::write(dir.path().join(".hidden/secret.rs"), "fn y() {}").unwrap();

        let map = repo_map(dir.path()).await;
        assert_eq!(map, "README.md\nsrc/lib.rs: run");
    }

    #[tokio::test]
    async fn test_detail_map() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("lib.rs"),
            "use x;\n\npub struct A {\n    n: u8,\n}\n\nimpl A {\n    pub async fn go(&self) {\n    }\n}\n",
        )
        .unwrap();

        let detail = detail_map(dir.path(), &["lib.rs".to_string(), "gone.py".to_string()]).await;
        assert_eq!(
            detail,
            "File: lib.rs\n    3: pub struct A\n    7: impl A\n    8:     pub async fn go(&self)\nFile: gone.py (not found)"
        );
    }

    #[tokio::test]
    async fn test_detail_map_stays_inside_root() {
        let outer = TempDir::new().unwrap();
        std::fs::write(outer.path().join("secret.py"), "def token():\n    pass\n").unwrap();
        let root = outer.path().join("repo");
        std::fs::create_dir(&root).unwrap();
        let absolute = outer.path().join("secret.py").display().to_string();

        let detail = detail_map(&root, &["../secret.py".to_string(), absolute.clone()]).await;
        assert_eq!(
            detail,
            format!(
                "File: ../secret.py (outside the repository)\nFile: {} (outside the repository)",
                absolute
            )
        );
        assert!(!detail.contains("def token"));
    }
}
