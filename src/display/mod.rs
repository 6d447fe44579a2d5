//! Terminal display module
//!
//! Prints command summaries as styled Markdown when stdout is a terminal
//! and as plain text otherwise.

mod formatter;
mod terminal;

pub use formatter::print_markdown;
pub use terminal::should_use_colors;
