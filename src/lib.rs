pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod lineage;
pub mod logging;
pub mod parser;
pub mod process;
pub mod schema;
pub mod ui;
pub mod writer;

pub use cli::{Cli, Commands};
pub use config::Settings;
pub use error::{LineageError, LineageResult};
pub use process::{process_directory, process_file, process_script, BatchReport, Mode, ScriptOutcome};
pub use ui::{LogUi, Phase, SilentUi, Ui, UiApp};
