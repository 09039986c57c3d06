//! The application entry point.
//!
//! Usage: `Application::from_file("cli.yaml")?.run().await`

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::ArgMatches;
use tracing::{debug, error};

use super::builder::CliBuilder;
use super::complete::{self, COMPLETE_COMMAND};
use super::config::{AppConfig, CliConfig};
use super::registry::CommandTree;
use crate::command::{Action, Command};
use crate::error::{status, CommandError, CommandResult};
use crate::exec::run_shell;
use crate::logging;
use crate::runtime::{EnvNames, RuntimeConfig};

/// What an invocation ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A command's action ran.
    Ran,
    /// Help was printed.
    Help,
    /// The version was printed.
    Version,
    /// Completion candidates were printed.
    Completed,
}

/// A declared application: metadata, commands and named handlers.
pub struct Application {
    app: AppConfig,
    commands: Vec<Command>,
    handlers: HashMap<String, Action>,
    runtime: RuntimeConfig,
}

impl Application {
    /// Create an application without commands; runtime toggles come from the environment.
    pub fn new(app: AppConfig) -> Self {
        let names = match &app.env_prefix {
            Some(prefix) => EnvNames::prefixed(prefix),
            None => EnvNames::default(),
        };
        Self {
            app,
            commands: Vec::new(),
            handlers: HashMap::new(),
            runtime: RuntimeConfig::from_env_with(names),
        }
    }

    /// Create an application from a loaded schema.
    pub fn from_config(config: CliConfig) -> Self {
        let mut application = Self::new(config.app);
        application.commands = config.commands;
        application
    }

    /// Auto-detect format and create from file
    pub fn from_file(path: impl AsRef<Path>) -> CommandResult<Self> {
        Ok(Self::from_config(CliConfig::from_file(path)?))
    }

    /// Replace the runtime toggles.
    pub fn with_runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    /// Add a command declared in code.
    pub fn register(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Register a handler referenced by `handler:` in the schema.
    pub fn register_handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Command, &mut dyn Write) -> CommandResult<()> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// Build the command tree, binding handlers and exec templates to their commands.
    pub fn tree(&self) -> CommandResult<CommandTree> {
        self.tree_with(self.runtime.clone())
    }

    fn tree_with(&self, runtime: RuntimeConfig) -> CommandResult<CommandTree> {
        let env = runtime.environment_map();
        let mut tree = CommandTree::new(runtime);

        for command in &self.commands {
            let mut command = command.clone();
            if command.action.is_none() {
                command.action = self.bind_action(&command, &env)?;
            }
            tree.insert(command)?;
        }

        Ok(tree)
    }

    fn bind_action(&self, command: &Command, env: &HashMap<String, String>) -> CommandResult<Option<Action>> {
        if let Some(name) = &command.handler {
            let handler = self.handlers.get(name).ok_or_else(|| {
                CommandError::configuration(format!(
                    "command {} uses handler {} which is not registered",
                    command.full_name(),
                    name
                ))
            })?;
            return Ok(Some(Arc::clone(handler)));
        }

        if let Some(template) = &command.exec {
            let template = template.clone();
            let env = env.clone();
            let action: Action = Arc::new(move |cmd: &Command, out: &mut dyn Write| {
                let script = cmd.resolve_template(&template, "")?;
                run_shell(&script, &env, out)
            });
            return Ok(Some(action));
        }

        Ok(None)
    }

    /// Parse the process arguments and run the selected command, writing to stdout.
    pub async fn execute(&self) -> CommandResult<Outcome> {
        let mut stdout = std::io::stdout();
        self.execute_from(std::env::args_os(), &mut stdout).await
    }

    /// Parse `args` (including the binary name) and run the selected command.
    pub async fn execute_from<I, T>(&self, args: I, out: &mut (dyn Write + Send)) -> CommandResult<Outcome>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

        if args.get(1).map(|a| a == COMPLETE_COMMAND).unwrap_or(false) {
            let words: Vec<String> = args[2..]
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            let tree = self.tree()?;
            complete::respond(&tree, &words, out).await?;
            return Ok(Outcome::Completed);
        }

        let matches = {
            let tree = self.tree()?;
            let cli = CliBuilder::new(&self.app, &tree).build();
            match cli.try_get_matches_from(&args) {
                Ok(matches) => matches,
                Err(e) => return self.clap_error(e, out),
            }
        };

        let runtime = self.runtime_for(&matches);
        logging::init(&runtime);
        let tree = self.tree_with(runtime)?;

        let (path, leaf) = selected(&matches);
        let mut command = tree.find(&path).cloned().ok_or_else(|| {
            CommandError::not_found(format!("could not find a command named {}", path.join(" ")))
        })?;

        debug!("running {}", command.full_name());
        command.parse_input(leaf, Some(&tree)).await?;
        command.run(out)?;
        Ok(Outcome::Ran)
    }

    fn clap_error(&self, e: clap::Error, out: &mut (dyn Write + Send)) -> CommandResult<Outcome> {
        match e.kind() {
            ErrorKind::DisplayHelp => {
                write!(out, "{}", e.render())?;
                Ok(Outcome::Help)
            }
            ErrorKind::DisplayVersion => {
                write!(out, "{}", e.render())?;
                Ok(Outcome::Version)
            }
            ErrorKind::InvalidSubcommand
            | ErrorKind::MissingSubcommand
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                Err(CommandError::not_found(e.to_string().trim_end().to_string()))
            }
            _ => Err(CommandError::bad_arguments(e.to_string().trim_end().to_string())),
        }
    }

    /// Runtime toggles adjusted by the global flags of this invocation.
    fn runtime_for(&self, matches: &ArgMatches) -> RuntimeConfig {
        let flag = |name: &str| {
            matches
                .try_get_one::<bool>(name)
                .ok()
                .flatten()
                .copied()
                .unwrap_or(false)
        };

        let mut runtime = self.runtime.clone();
        if flag("verbose") {
            runtime.verbose = true;
        }
        if flag("silent") {
            runtime.silent = true;
        }
        if flag("no-color") {
            runtime.color_enabled = false;
            runtime.force_color = false;
        } else if flag("color") {
            runtime.color_enabled = true;
            runtime.force_color = true;
        }
        if flag(crate::command::SKIP_VALIDATION_FLAG) {
            runtime.validation_enabled = false;
        }
        runtime
    }

    /// Run the process arguments and return the exit status, logging any error.
    pub async fn run(&self) -> i32 {
        match self.execute().await {
            Ok(Outcome::Help) => status::RENDER_HELP,
            Ok(_) => status::OK,
            Err(e) => {
                logging::init(&self.runtime);
                error!("{}", e);
                e.exit_code()
            }
        }
    }
}

/// Path and matches of the innermost subcommand.
fn selected(matches: &ArgMatches) -> (Vec<String>, &ArgMatches) {
    let mut path = Vec::new();
    let mut current = matches;
    while let Some((name, sub)) = current.subcommand() {
        path.push(name.to_string());
        current = sub;
    }
    (path, current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Argument, CommandOption, ValueSource, ValueType};

    fn application() -> Application {
        Application::new(AppConfig::new("test", "1.2.3"))
            .with_runtime(RuntimeConfig::default())
            .register(
                Command::new(["greet"])
                    .with_argument(Argument::new("name").required())
                    .with_option(
                        "greeting",
                        CommandOption::new(ValueType::String)
                            .with_default("hello")
                            .with_values(ValueSource::static_values(["hello", "bye"])),
                    )
                    .with_handler("greet"),
            )
            .register(Command::new(["shell", "echo"]).with_argument(Argument::new("word")).with_exec(
                r#"echo "{{ Arg "word" }}""#,
            ))
            .register_handler("greet", |cmd, out| {
                writeln!(
                    out,
                    "{} {}",
                    cmd.options["greeting"].value_string(),
                    cmd.arguments[0].value_string()
                )?;
                Ok(())
            })
    }

    async fn run(app: &Application, args: &[&str]) -> (CommandResult<Outcome>, String) {
        let mut out = Vec::new();
        let result = app.execute_from(args.iter().copied(), &mut out).await;
        (result, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_runs_handler() {
        let app = application();
        let (result, out) = run(&app, &["test", "greet", "world", "--greeting", "bye"]).await;
        assert_eq!(result.unwrap(), Outcome::Ran);
        assert_eq!(out, "bye world\n");
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let app = application();
        let (result, _) = run(&app, &["test", "greet"]).await;
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Missing argument for NAME");
        assert_eq!(err.exit_code(), status::USAGE);

        let (result, _) = run(&app, &["test", "greet", "x", "--greeting", "howdy"]).await;
        assert!(result
            .unwrap_err()
            .to_string()
            .starts_with("howdy is not a valid value for option <greeting>"));

        let (result, out) = run(&app, &["test", "greet", "x", "--greeting", "howdy", "--skip-validation"]).await;
        assert!(result.is_ok());
        assert_eq!(out, "howdy x\n");
    }

    #[tokio::test]
    async fn test_exec_template() {
        let app = application();
        let (result, out) = run(&app, &["test", "shell", "echo", "hi"]).await;
        assert_eq!(result.unwrap(), Outcome::Ran);
        assert_eq!(out, "hi\n");
    }

    #[tokio::test]
    async fn test_unknown_and_bad_input() {
        let app = application();
        let (result, _) = run(&app, &["test", "nope"]).await;
        assert_eq!(result.unwrap_err().exit_code(), status::NOT_FOUND);

        let (result, _) = run(&app, &["test"]).await;
        assert_eq!(result.unwrap_err().exit_code(), status::NOT_FOUND);

        let (result, _) = run(&app, &["test", "greet", "x", "--bogus"]).await;
        assert_eq!(result.unwrap_err().exit_code(), status::USAGE);
    }

    #[tokio::test]
    async fn test_help_and_version() {
        let app = application();
        let (result, out) = run(&app, &["test", "--help"]).await;
        assert_eq!(result.unwrap(), Outcome::Help);
        assert!(out.contains("greet"));

        let (result, out) = run(&app, &["test", "--version"]).await;
        assert_eq!(result.unwrap(), Outcome::Version);
        assert!(out.contains("1.2.3"));
    }

    #[tokio::test]
    async fn test_completion_protocol() {
        let app = application();
        let (result, out) = run(&app, &["test", "__complete", "greet", "x", "--greeting", "b"]).await;
        assert_eq!(result.unwrap(), Outcome::Completed);
        assert_eq!(out, "bye\n_activeHelp_ \n:0\n");
    }

    #[test]
    fn test_missing_handler_is_a_bug() {
        let app = Application::new(AppConfig::new("test", "1"))
            .register(Command::new(["x"]).with_handler("missing"));
        let err = app.tree().unwrap_err();
        assert_eq!(err.exit_code(), status::PROGRAMMER_ERROR);
    }
}
