//! Prompt assembly.

use quill_ai::Message;

/// Fixed instructions describing the directive vocabulary.
pub const SYSTEM_PROMPT: &str = r#"You are a coding expert working inside the user's repository. Answer any questions the user might have. If the user asks you to modify code, use this format:
<edit path="src/file.rs">
<find>exact code to replace</find>
<replace>new code</replace>
</edit>
The find text must match the current file exactly; only its first occurrence is replaced. To delete code, leave <replace></replace> empty.
To create a new file: <create path="src/new_file.rs">file content</create>. Existing files are never overwritten.
To request the contents of files, one path per line: <request_files>src/a.rs</request_files>.
To drop irrelevant files from context: <drop_files>src/a.rs</drop_files>.
To get a detailed outline (definitions with line numbers) of files: <detail_map>src/a.rs</detail_map>.
To run a shell command: <shell>cargo test</shell>. The user approves each command. The output is returned truncated (first 10 lines, then a [TRUNCATED] marker, then the last 40 lines; full output if it has 50 lines or fewer).
When making edits, provide a commit message: <commit_message>Short summary</commit_message>."#;

/// System instructions, with project instructions appended when present.
pub fn system_instructions(project: Option<&str>) -> String {
    match project.map(str::trim).filter(|p| !p.is_empty()) {
        Some(project) => format!("{}\n\n### Project instructions\n{}", SYSTEM_PROMPT, project),
        None => SYSTEM_PROMPT.to_string(),
    }
}

/// The final user message: repository map, context files and the request.
pub fn request_message(repo_map: &str, files: &[(String, String)], request: &str) -> String {
    let files = files
        .iter()
        .map(|(path, content)| format!("File: {}\n```\n{}\n```", path, content))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "### Repo Map\n{}\n### Files\n{}\nRequest: {}",
        repo_map, files, request
    )
}

/// Full message list for one round.
pub fn build_messages(
    instructions: &str,
    environment: &str,
    history: &[Message],
    repo_map: &str,
    files: &[(String, String)],
    request: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(Message::system(instructions));
    messages.push(Message::system(format!("System summary: {}", environment)));
    messages.extend_from_slice(history);
    messages.push(Message::user(request_message(repo_map, files, request)));
    messages
}
