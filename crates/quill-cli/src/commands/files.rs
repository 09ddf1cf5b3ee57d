//! `/add`, `/drop` and `/files`

use quill_agent::Session;

pub fn add(session: &mut Session, pattern: &str) -> String {
    if pattern.is_empty() {
        return "Usage: /add <glob>".to_string();
    }
    match session.add_files(pattern) {
        Ok(found) => format!("Added {} files", found.len()),
        Err(e) => format!("Invalid pattern {}: {}", pattern, e),
    }
}

pub fn drop(session: &mut Session, path: &str) -> String {
    if path.is_empty() {
        return "Usage: /drop <file>".to_string();
    }
    if session.drop_file(path) {
        format!("Dropped {}", path)
    } else {
        format!("Not in context: {}", path)
    }
}

pub fn list(session: &Session) -> String {
    let files = session.context_files();
    if files.is_empty() {
        return "No files in context.".to_string();
    }
    let mut out = format!("Files in context ({}):", files.len());
    for file in files {
        out.push_str("\n  ");
        out.push_str(&file);
    }
    out
}
