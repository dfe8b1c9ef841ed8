pub mod cli;
pub mod errors;
pub mod loader;
pub mod prompt;
pub mod report;

pub use cli::{FLOOR_PROMPT, LabelOutcome, LabelRequest, run_grids, run_label};
pub use errors::FrontendError;
pub use prompt::ConsolePrompter;
