pub mod completions;
pub mod run;
pub mod status;

pub use completions::CompletionsCommand;
pub use run::RunCommand;
pub use status::StatusCommand;
