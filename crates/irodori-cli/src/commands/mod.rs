pub mod common;
pub mod completions;
pub mod config;
pub mod note;
pub mod prompt;
pub mod sync;
pub mod task;
