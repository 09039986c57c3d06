//! Declared commands: arguments, options, value sources and actions.

pub mod argument;
pub mod option;
pub mod source;
pub mod template;
pub mod value;

use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use clap::ArgMatches;
use serde::Deserialize;
use tracing::debug;

pub use argument::{Argument, Arguments};
pub use option::{CommandOption, Options};
pub use source::{register_value_source, CompletionFn, ResolveContext, Resolution, SourceKind, ValueSource};
pub use template::TemplateData;
pub use value::{Value, ValueType};

use crate::cli::registry::CommandTree;
use crate::completion::{CompletionDirective, Completions};
use crate::error::{CommandError, CommandResult};

/// Name of the global flag that disables validation for one invocation.
pub const SKIP_VALIDATION_FLAG: &str = "skip-validation";

/// Code run once a command's input is bound and validated.
///
/// Output meant for the user goes to the writer.
pub type Action = Arc<dyn Fn(&Command, &mut dyn Write) -> CommandResult<()> + Send + Sync>;

/// A runnable command.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Command {
    /// Words leading to this command, e.g. `["db", "migrate"]`.
    pub path: Vec<String>,
    /// One-line summary shown in listings.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub arguments: Arguments,
    #[serde(default)]
    pub options: Options,
    /// Name of a handler registered with the application.
    #[serde(default)]
    pub handler: Option<String>,
    /// Shell template run as the action.
    #[serde(default)]
    pub exec: Option<String>,
    /// Free-form data for the application.
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(skip)]
    pub action: Option<Action>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("path", &self.path)
            .field("summary", &self.summary)
            .field("arguments", &self.arguments)
            .field("options", &self.options)
            .field("handler", &self.handler)
            .field("exec", &self.exec)
            .field("hidden", &self.hidden)
            .field("action", &self.action.is_some())
            .finish()
    }
}

impl Command {
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, option: CommandOption) -> Self {
        self.options.insert(name.into(), option);
        self
    }

    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&Command, &mut dyn Write) -> CommandResult<()> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    pub fn with_exec(mut self, template: impl Into<String>) -> Self {
        self.exec = Some(template.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Path joined by spaces.
    pub fn full_name(&self) -> String {
        self.path.join(" ")
    }

    /// Check the declaration for mistakes, normalizing option defaults.
    ///
    /// Integer and boolean defaults written as strings are converted, and a
    /// single default of a repeated option becomes a list.
    pub fn check(&mut self) -> CommandResult<()> {
        let name = self.full_name();
        let bug = |msg: String| CommandError::configuration(format!("command {}: {}", name, msg));

        if self.path.is_empty() || self.path.iter().any(|p| p.is_empty() || p.contains(char::is_whitespace)) {
            return Err(bug("path segments must be non-empty words".to_string()));
        }

        let mut names = HashSet::new();
        let last = self.arguments.len().saturating_sub(1);
        for (index, argument) in self.arguments.iter().enumerate() {
            if argument.name.is_empty() {
                return Err(bug(format!("argument {} has no name", index)));
            }
            if !names.insert(argument.name.as_str()) {
                return Err(bug(format!("argument {} is declared twice", argument.name)));
            }
            if argument.variadic && index != last {
                return Err(bug(format!("variadic argument {} must be the last one", argument.name)));
            }
        }

        let mut shorts = HashSet::new();
        for (opt_name, option) in self.options.iter_mut() {
            if names.contains(opt_name.as_str()) {
                return Err(bug(format!("{} is both an argument and an option", opt_name)));
            }
            if option.repeated && option.kind != ValueType::String {
                return Err(bug(format!("option {} can only be repeated if it is a string", opt_name)));
            }
            if let Some(short) = option.short_name {
                if !short.is_ascii_alphanumeric() {
                    return Err(bug(format!("option {} has an invalid short name {:?}", opt_name, short)));
                }
                if !shorts.insert(short) {
                    return Err(bug(format!("short name -{} is used twice", short)));
                }
            }
            if let Some(default) = option.default.take() {
                let normalized = normalize_default(default, option.kind, option.repeated)
                    .ok_or_else(|| bug(format!("default of option {} is not a {}", opt_name, option.kind)))?;
                option.default = Some(normalized);
            }
        }

        Ok(())
    }

    /// Values visible to templates, with `current` as the value being resolved.
    pub fn template_data(&self, current: &str) -> TemplateData {
        TemplateData {
            args: self.arguments.all_known_str(),
            opts: self.options.all_known_str(),
            current: current.to_string(),
        }
    }

    /// Render `template` against this command's bound values.
    pub fn resolve_template(&self, template: &str, current: &str) -> CommandResult<String> {
        template::render(template, &self.template_data(current))
    }

    /// Bind positional tokens and options from `matches`, then validate
    /// unless validation is disabled.
    pub async fn parse_input(&mut self, matches: &ArgMatches, tree: Option<&CommandTree>) -> CommandResult<()> {
        let tokens = positional_tokens(matches, &self.arguments);
        self.arguments.parse(&tokens)?;
        self.options.parse(matches);

        let skip_flag = matches
            .try_get_one::<bool>(SKIP_VALIDATION_FLAG)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false);
        let enabled = tree.map(|t| t.runtime().validation_enabled).unwrap_or(true);

        if skip_flag || !enabled {
            debug!("skipping validation for {}", self.full_name());
            return Ok(());
        }

        self.validate(tree).await
    }

    /// Validate all arguments, then all options.
    pub async fn validate(&self, tree: Option<&CommandTree>) -> CommandResult<()> {
        let ctx = ResolveContext::new(self, tree);
        self.arguments.are_valid(&ctx).await?;
        self.options.are_valid(&ctx).await
    }

    /// Run the bound action.
    pub fn run(&self, out: &mut dyn Write) -> CommandResult<()> {
        let action = self.action.as_ref().ok_or_else(|| {
            CommandError::configuration(format!("command {} has no action", self.full_name()))
        })?;
        action(self, out)
    }

    /// Candidates for the positional argument following `typed`.
    pub async fn complete_argument(
        &mut self,
        tree: Option<&CommandTree>,
        typed: &[String],
        to_complete: &str,
    ) -> Completions {
        if self.arguments.is_empty() {
            return Completions::error();
        }

        // surplus tokens are still bound, which is all completion needs
        let _ = self.arguments.parse(typed);

        let Some(index) = self.arguments.active_index(typed.len()) else {
            return Completions::new(Vec::new(), CompletionDirective::NO_FILE_COMP);
        };

        let argument = &self.arguments[index];
        let Some(source) = &argument.values else {
            return Completions::hint(&argument.description);
        };

        let ctx = ResolveContext::new(self, tree);
        source.complete(&ctx, to_complete, &argument.description).await
    }

    /// Candidates for the value of option `name`.
    pub async fn complete_option(
        &mut self,
        tree: Option<&CommandTree>,
        name: &str,
        typed: &[String],
        to_complete: &str,
    ) -> Completions {
        let _ = self.arguments.parse(typed);

        let Some(option) = self.options.get(name) else {
            return Completions::error();
        };
        let Some(source) = &option.values else {
            return Completions::hint(&option.description);
        };

        let ctx = ResolveContext::new(self, tree);
        source.complete(&ctx, to_complete, &option.description).await
    }
}

fn normalize_default(default: Value, kind: ValueType, repeated: bool) -> Option<Value> {
    match (default, kind, repeated) {
        (Value::String(s), ValueType::String, true) => Some(Value::List(vec![s])),
        (Value::String(s), ValueType::Int, false) => s.trim().parse().ok().map(Value::Int),
        (Value::String(s), ValueType::Bool, false) => s.trim().parse().ok().map(Value::Bool),
        (scalar @ (Value::Int(_) | Value::Bool(_)), ValueType::String, false) => {
            Some(Value::String(scalar.to_string()))
        }
        (value, kind, repeated) if value.matches(kind, repeated) => Some(value),
        _ => None,
    }
}

fn positional_tokens(matches: &ArgMatches, arguments: &Arguments) -> Vec<String> {
    let mut tokens = Vec::new();
    for argument in arguments.iter() {
        let values: Vec<String> = match matches.try_get_many::<String>(&argument.name) {
            Ok(Some(values)) => values.cloned().collect(),
            _ => break,
        };
        if values.is_empty() {
            break;
        }
        tokens.extend(values);
    }
    tokens
}
