use std::collections::HashMap;

use super::commands::classify;
use super::types::{LineKind, LogicalLine};

/// Scan labels (case-insensitive). The first definition of a name wins.
pub fn build_label_map(lines: &[LogicalLine]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        if let LineKind::Label(name) = classify(&line.text) {
            map.entry(name.to_lowercase()).or_insert(i);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::preprocess;

    #[test]
    fn finds_labels_case_insensitively() {
        let lines = preprocess("call :Sub\nexit /b 0\n\n:SUB extra words\necho in sub\n:sub\n");
        let labels = build_label_map(&lines);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.get("sub"), Some(&3));
    }
}
