//! The closed vocabulary of directive tags and prefix matching over it.

/// A directive tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Edit,
    Find,
    Replace,
    Create,
    RequestFiles,
    DropFiles,
    DetailMap,
    Shell,
    /// Accepted spelling of `shell`
    Bash,
    CommitMessage,
}

impl Tag {
    pub const ALL: [Tag; 10] = [
        Tag::Edit,
        Tag::Find,
        Tag::Replace,
        Tag::Create,
        Tag::RequestFiles,
        Tag::DropFiles,
        Tag::DetailMap,
        Tag::Shell,
        Tag::Bash,
        Tag::CommitMessage,
    ];

    /// The name as written between the angle brackets
    pub fn name(self) -> &'static str {
        match self {
            Tag::Edit => "edit",
            Tag::Find => "find",
            Tag::Replace => "replace",
            Tag::Create => "create",
            Tag::RequestFiles => "request_files",
            Tag::DropFiles => "drop_files",
            Tag::DetailMap => "detail_map",
            Tag::Shell => "shell",
            Tag::Bash => "bash",
            Tag::CommitMessage => "commit_message",
        }
    }

    pub fn from_name(name: &str) -> Option<Tag> {
        Tag::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// Result of matching a tag token at the start of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMatch {
    /// A whole tag token of `len` bytes
    Complete { len: usize, tag: Tag, closing: bool },
    /// Could still become a tag once more text arrives
    Partial,
    /// Cannot be a tag
    NoMatch,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_lowercase() || b == b'_'
}

/// Match `<name>`, `<name attrs>` or `</name>` at the start of `s`.
///
/// `s` must begin with `<`. Attributes may not span a line break. With
/// `eof` set, an incomplete candidate is reported as [`TagMatch::NoMatch`].
pub fn match_tag(s: &str, eof: bool) -> TagMatch {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'<') {
        return TagMatch::NoMatch;
    }

    let closing = bytes.get(1) == Some(&b'/');
    let name_start = if closing { 2 } else { 1 };
    let mut i = name_start;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = &s[name_start.min(bytes.len())..i];

    if i >= bytes.len() {
        let viable = Tag::ALL.iter().any(|t| t.name().starts_with(name));
        return if viable && !eof {
            TagMatch::Partial
        } else {
            TagMatch::NoMatch
        };
    }

    let Some(tag) = Tag::from_name(name) else {
        return TagMatch::NoMatch;
    };

    match bytes[i] {
        b'>' => TagMatch::Complete {
            len: i + 1,
            tag,
            closing,
        },
        b' ' | b'\t' => match s[i..].find(['>', '\n']) {
            Some(n) if bytes[i + n] == b'>' => TagMatch::Complete {
                len: i + n + 1,
                tag,
                closing,
            },
            Some(_) => TagMatch::NoMatch,
            None if eof => TagMatch::NoMatch,
            None => TagMatch::Partial,
        },
        _ => TagMatch::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(len: usize, tag: Tag, closing: bool) -> TagMatch {
        TagMatch::Complete { len, tag, closing }
    }

    #[test]
    fn test_names_round_trip() {
        for tag in Tag::ALL {
            assert_eq!(Tag::from_name(tag.name()), Some(tag));
        }
        assert_eq!(Tag::from_name("shell_command"), None);
    }

    #[test]
    fn test_plain_open_and_close() {
        assert_eq!(match_tag("<edit>rest", false), complete(6, Tag::Edit, false));
        assert_eq!(match_tag("</find>", false), complete(7, Tag::Find, true));
    }

    #[test]
    fn test_attributes() {
        let s = r#"<edit path="src/a.rs">"#;
        assert_eq!(match_tag(s, false), complete(s.len(), Tag::Edit, false));
    }

    #[test]
    fn test_prefixes_are_partial() {
        assert_eq!(match_tag("<", false), TagMatch::Partial);
        assert_eq!(match_tag("</", false), TagMatch::Partial);
        assert_eq!(match_tag("<req", false), TagMatch::Partial);
        assert_eq!(match_tag("<request_files", false), TagMatch::Partial);
        assert_eq!(match_tag(r#"<create path="x"#, false), TagMatch::Partial);
    }

    #[test]
    fn test_eof_resolves_partial() {
        assert_eq!(match_tag("<req", true), TagMatch::NoMatch);
        assert_eq!(match_tag("<edit path=", true), TagMatch::NoMatch);
    }

    #[test]
    fn test_non_tags() {
        assert_eq!(match_tag("<div>", false), TagMatch::NoMatch);
        assert_eq!(match_tag("<editor>", false), TagMatch::NoMatch);
        assert_eq!(match_tag("<edit\n", false), TagMatch::NoMatch);
        assert_eq!(match_tag("<edit path=\"a\nb\">", false), TagMatch::NoMatch);
        assert_eq!(match_tag("< edit>", false), TagMatch::NoMatch);
        assert_eq!(match_tag("a <= b", false), TagMatch::NoMatch);
        assert_eq!(match_tag("<Edit>", false), TagMatch::NoMatch);
    }
}
