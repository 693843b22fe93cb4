use super::types::LineKind;

/// Check if line is a comment
pub fn is_comment(line: &str) -> bool {
    let trimmed = line.trim();
    let upper = trimmed.to_uppercase();
    trimmed.starts_with("::") || upper == "REM" || upper.starts_with("REM ") || upper.starts_with("REM\t")
}

/// Classify a logical line.
pub fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if is_comment(trimmed) {
        return LineKind::Comment;
    }
    if let Some(rest) = trimmed.strip_prefix(':') {
        let name = rest.split_whitespace().next().unwrap_or("");
        if name.is_empty() {
            return LineKind::Comment;
        }
        return LineKind::Label(name);
    }
    LineKind::Statement(trimmed)
}

/// Strip a leading case-insensitive keyword followed by whitespace (or end of
/// line) and return the remainder, trimmed.
pub fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let head = line.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &line[keyword.len()..];
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        Some(_) => None,
    }
}

/// Split an argument string shell-style. `None` when quotes are unbalanced.
pub fn split_args(text: &str) -> Option<Vec<String>> {
    shlex::split(text)
}

/// Expand `%NAME%`, `%1`..`%9` and `%~1`..`%~9` (strip surrounding quotes).
///
/// Undefined variables expand to nothing, `%%` is a literal percent and an
/// unterminated `%NAME` is kept as written.
pub fn expand<F>(text: &str, args: &[String], lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        let mut chars = tail.chars();

        match chars.next() {
            Some('%') => {
                out.push('%');
                rest = &tail[1..];
            }
            Some('~') if matches!(chars.next(), Some('1'..='9')) => {
                let idx = (tail.as_bytes()[1] - b'1') as usize;
                let val = args.get(idx).map(String::as_str).unwrap_or("");
                out.push_str(val.trim_matches('"'));
                rest = &tail[2..];
            }
            Some(d @ '1'..='9') => {
                let idx = (d as u8 - b'1') as usize;
                out.push_str(args.get(idx).map(String::as_str).unwrap_or(""));
                rest = &tail[1..];
            }
            _ => match tail.find('%') {
                Some(end) if end > 0 => {
                    if let Some(val) = lookup(&tail[..end]) {
                        out.push_str(&val);
                    }
                    rest = &tail[end + 1..];
                }
                _ => {
                    out.push('%');
                    rest = tail;
                }
            },
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name.to_uppercase().as_str() {
            "NAME" => Some("Alice".to_string()),
            _ => None,
        }
    }

    #[test]
    fn comment_detection() {
        assert!(is_comment("REM This is a comment"));
        assert!(is_comment(":: This is also a comment"));
        assert!(is_comment("rem"));
        assert!(!is_comment("echo Hello"));
        assert!(!is_comment("remove-sash 1"));
    }

    #[test]
    fn classifies_lines() {
        assert_eq!(classify("   "), LineKind::Blank);
        assert_eq!(classify(":main extra"), LineKind::Label("main"));
        assert_eq!(classify("  echo hi "), LineKind::Statement("echo hi"));
    }

    #[test]
    fn keyword_must_be_a_whole_word() {
        assert_eq!(strip_keyword("set X=1", "SET"), Some("X=1"));
        assert_eq!(strip_keyword("SETLOCAL", "SET"), None);
        assert_eq!(strip_keyword("endlocal", "ENDLOCAL"), Some(""));
    }

    #[test]
    fn expands_variables_and_arguments() {
        let args = vec!["\"quoted arg\"".to_string(), "two".to_string()];
        assert_eq!(expand("Hello %NAME%!", &args, env), "Hello Alice!");
        assert_eq!(expand("%1|%~1|%2|%3", &args, env), "\"quoted arg\"|quoted arg|two|");
        assert_eq!(expand("100%% sure", &args, env), "100% sure");
        assert_eq!(expand("missing=%NOPE%.", &args, env), "missing=.");
        assert_eq!(expand("trailing %", &args, env), "trailing %");
    }

    #[test]
    fn splits_quoted_arguments() {
        assert_eq!(
            split_args("a \"b c\" d"),
            Some(vec!["a".to_string(), "b c".to_string(), "d".to_string()])
        );
        assert_eq!(split_args("\"unterminated"), None);
    }
}
