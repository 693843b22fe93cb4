use super::types::LogicalLine;

/// Whether a physical line ends with an unescaped continuation caret.
fn continues(line: &str) -> bool {
    let carets = line
        .trim_end_matches([' ', '\t'])
        .chars()
        .rev()
        .take_while(|&c| c == '^')
        .count();
    carets % 2 == 1
}

/// Join physical lines that are continued with a trailing caret `^`.
fn join_continued_lines(physical: &[&str]) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut i = 0usize;

    while i < physical.len() {
        let start = i;
        let mut buf = String::new();

        loop {
            let raw = physical[i];
            let more = continues(raw);
            let piece = if more {
                let det = raw.trim_end_matches([' ', '\t']);
                &det[..det.len() - 1]
            } else {
                raw
            };

            if !buf.is_empty() {
                buf.push(' ');
            }
            buf.push_str(piece);

            if more && i + 1 < physical.len() {
                i += 1;
            } else {
                break;
            }
        }

        out.push(LogicalLine {
            text: buf,
            line: start + 1,
        });
        i += 1;
    }

    out
}

/// Split script source into logical lines.
pub fn preprocess(source: &str) -> Vec<LogicalLine> {
    let physical: Vec<&str> = source.lines().collect();
    join_continued_lines(&physical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_caret_continuations() {
        let lines = preprocess("echo This is a ^\ncontinued line\necho next");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "echo This is a  continued line");
        assert_eq!(lines[0].line, 1);
        assert_eq!(lines[1].line, 3);
    }

    #[test]
    fn escaped_caret_does_not_continue() {
        let lines = preprocess("echo a^^\necho b");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "echo a^^");
    }

    #[test]
    fn trailing_caret_on_last_line_is_dropped() {
        let lines = preprocess("echo end ^");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "echo end ");
    }
}
