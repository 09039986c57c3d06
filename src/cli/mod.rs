//! Application layer: schema files, the command tree, clap integration and
//! the `__complete` protocol.
//!
//! ```rust,no_run
//! use cmdspec::cli::Application;
//!
//! #[tokio::main]
//! async fn main() {
//!     let code = match Application::from_file("cli.yaml") {
//!         Ok(app) => app.run().await,
//!         Err(e) => {
//!             eprintln!("{}", e);
//!             e.exit_code()
//!         }
//!     };
//!     std::process::exit(code);
//! }
//! ```

pub mod builder;
pub mod complete;
pub mod config;
pub mod executor;
pub mod registry;

pub use builder::CliBuilder;
pub use complete::COMPLETE_COMMAND;
pub use config::{AppConfig, CliConfig};
pub use executor::{Application, Outcome};
pub use registry::{root_options, CommandTree};
