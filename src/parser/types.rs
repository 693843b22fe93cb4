/// One physical→logical joined line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub text: String,
    /// First physical line, 1-based. Reported as the line number.
    pub line: usize,
}

/// Classification of a logical line before compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Comment,
    Label(&'a str),
    Statement(&'a str),
}
