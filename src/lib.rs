//! cmdspec - declarative command-line applications
//!
//! Commands are declared in code or in a TOML/YAML/JSON schema. Each command
//! has positional arguments and named options whose permissible values come
//! from a [`ValueSource`](command::ValueSource): a static list, files,
//! directories, a shell script, another command, or a registered function.
//! The same sources drive validation before an action runs and dynamic shell
//! completion.
//!
//! - **`command`** - commands, argument and option binding, value sources, templates
//! - **`cli`** - the application: schema loading, clap integration, completion protocol
//! - **`completion`** - completion directives and candidate lists
//! - **`runtime`** - environment toggles (verbosity, colors, validation)
//!
//! # Example
//!
//! ```rust,no_run
//! use cmdspec::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Application::new(AppConfig::new("deployer", "0.1.0")).register(
//!         Command::new(["deploy"])
//!             .with_argument(
//!                 Argument::new("environment")
//!                     .required()
//!                     .with_values(ValueSource::static_values(["dev", "prod"])),
//!             )
//!             .with_action(|cmd, out| {
//!                 writeln!(out, "deploying to {}", cmd.arguments[0].value_string())?;
//!                 Ok(())
//!             }),
//!     );
//!     std::process::exit(app.run().await);
//! }
//! ```

pub mod cli;
pub mod command;
pub mod completion;
pub mod error;
pub mod exec;
pub mod logging;
pub mod runtime;

pub use error::{CommandError, CommandResult};

/// Commonly used types.
pub mod prelude {
    pub use std::io::Write;

    pub use crate::cli::{AppConfig, Application, CliConfig, CommandTree, Outcome};
    pub use crate::command::{
        register_value_source, Argument, Command, CommandOption, Resolution, ResolveContext, Value,
        ValueSource, ValueType,
    };
    pub use crate::completion::{CompletionDirective, Completions};
    pub use crate::error::{status, CommandError, CommandResult};
    pub use crate::runtime::RuntimeConfig;
}
