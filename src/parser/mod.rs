mod commands;
mod labels;
mod preprocessor;
mod types;

pub use commands::{classify, expand, is_comment, split_args, strip_keyword};
pub use labels::build_label_map;
pub use preprocessor::preprocess;
pub use types::{LineKind, LogicalLine};
