//! The tree of declared commands.
//!
//! Commands are registered by full path. Intermediate path segments without a
//! command of their own are groups.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use super::builder::CliBuilder;
use crate::command::{Command, CommandOption, Options, ValueType, SKIP_VALIDATION_FLAG};
use crate::error::{CommandError, CommandResult};
use crate::runtime::RuntimeConfig;

/// Future returned by [`CommandTree::invoke`].
pub type InvokeFuture<'a> = Pin<Box<dyn Future<Output = CommandResult<String>> + Send + 'a>>;

/// Options available to every command.
pub fn root_options(runtime: &RuntimeConfig) -> Options {
    let mut options = Options::default();
    options.insert(
        "verbose".into(),
        CommandOption::new(ValueType::Bool)
            .with_short('v')
            .with_default(runtime.verbose)
            .with_description("Log verbose output to stderr"),
    );
    options.insert(
        "silent".into(),
        CommandOption::new(ValueType::Bool)
            .with_default(runtime.silent)
            .with_description("Silence non-error logging"),
    );
    options.insert(
        "no-color".into(),
        CommandOption::new(ValueType::Bool)
            .with_default(!runtime.color_enabled)
            .with_description("Disable printing of colors to stderr"),
    );
    options.insert(
        "color".into(),
        CommandOption::new(ValueType::Bool)
            .with_default(runtime.force_color)
            .with_description("Always print colors to stderr"),
    );
    options.insert(
        SKIP_VALIDATION_FLAG.into(),
        CommandOption::new(ValueType::Bool)
            .with_default(!runtime.validation_enabled)
            .with_description("Do not validate any arguments or options"),
    );
    options
}

/// Names clap reserves on every command.
const RESERVED: &[&str] = &["help", "version"];

/// All registered commands, plus the options and runtime settings they share.
#[derive(Debug, Clone)]
pub struct CommandTree {
    commands: BTreeMap<String, Command>,
    globals: Options,
    runtime: RuntimeConfig,
}

impl Default for CommandTree {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl CommandTree {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self {
            commands: BTreeMap::new(),
            globals: root_options(&runtime),
            runtime,
        }
    }

    /// Register a command after checking its declaration.
    pub fn insert(&mut self, mut command: Command) -> CommandResult<()> {
        command.check()?;

        let key = command.full_name();
        if self.commands.contains_key(&key) {
            return Err(CommandError::configuration(format!(
                "command {} is declared twice",
                key
            )));
        }

        for name in command.options.keys().chain(command.arguments.iter().map(|a| &a.name)) {
            if self.globals.contains_key(name) || RESERVED.contains(&name.as_str()) {
                return Err(CommandError::configuration(format!(
                    "command {}: {} is reserved for a global option",
                    key, name
                )));
            }
        }
        let global_shorts: Vec<char> = self.globals.values().filter_map(|o| o.short_name).collect();
        for (name, option) in command.options.iter() {
            if let Some(short) = option.short_name {
                if global_shorts.contains(&short) || short == 'h' || short == 'V' {
                    return Err(CommandError::configuration(format!(
                        "command {}: short name -{} of option {} is reserved",
                        key, short, name
                    )));
                }
            }
        }

        debug!("registered command {}", key);
        self.commands.insert(key, command);
        Ok(())
    }

    /// The command at exactly `path`.
    pub fn find(&self, path: &[String]) -> Option<&Command> {
        self.commands.get(&path.join(" "))
    }

    /// Distinct next path segments below `prefix`, sorted.
    pub fn children(&self, prefix: &[String]) -> Vec<String> {
        let children: BTreeSet<&str> = self
            .commands
            .values()
            .filter(|cmd| cmd.path.len() > prefix.len() && cmd.path.starts_with(prefix))
            .map(|cmd| cmd.path[prefix.len()].as_str())
            .collect();
        children.into_iter().map(str::to_string).collect()
    }

    /// Whether `prefix` has commands below it.
    pub fn is_group(&self, prefix: &[String]) -> bool {
        self.commands
            .values()
            .any(|cmd| cmd.path.len() > prefix.len() && cmd.path.starts_with(prefix))
    }

    /// Whether every command at or below `prefix` is hidden.
    pub fn is_hidden(&self, prefix: &[String]) -> bool {
        self.commands
            .values()
            .filter(|cmd| cmd.path.starts_with(prefix))
            .all(|cmd| cmd.hidden)
    }

    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Options every command accepts.
    pub fn globals(&self) -> &Options {
        &self.globals
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// Run the command at `path` with `args` and capture what it writes.
    ///
    /// Input is bound and validated exactly as for a top-level invocation.
    pub fn invoke<'a>(&'a self, path: &'a [String], args: Vec<String>) -> InvokeFuture<'a> {
        Box::pin(async move {
            let mut command = self.find(path).cloned().ok_or_else(|| {
                CommandError::not_found(format!(
                    "could not find a command named {}",
                    path.join(" ")
                ))
            })?;

            debug!("invoking {} with {:?}", command.full_name(), args);
            let argv = std::iter::once(command.name().to_string()).chain(args);
            let matches = CliBuilder::leaf(&command, &self.globals)
                .try_get_matches_from(argv)
                .map_err(|e| CommandError::bad_arguments(e.to_string().trim_end().to_string()))?;

            command.parse_input(&matches, Some(self)).await?;

            let task = tokio::task::spawn_blocking(move || {
                let mut out = Vec::new();
                command.run(&mut out).map(|_| out)
            });
            let out = match task.await {
                Ok(result) => result?,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => return Err(CommandError::execution(e.to_string())),
            };

            Ok(String::from_utf8_lossy(&out).into_owned())
        })
    }
}
