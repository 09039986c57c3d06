//! Value sources: where an argument or option gets its permissible values.
//!
//! A source is resolved at most once per instance; the first successful
//! resolution is kept for the rest of the process.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use serde::Deserialize;
use tokio::time::timeout;
use tracing::{debug, trace};

use super::Command;
use crate::cli::registry::CommandTree;
use crate::completion::{active_help, filter_prefix, CompletionDirective, Completions};
use crate::error::{CommandError, CommandResult};
use crate::exec::{split_lines, CommandExecutor, SHELL};

/// Seconds to wait for scripts, sub-commands and functions.
pub const DEFAULT_TIMEOUT: u64 = 5;

/// Values produced by a source, and how the shell should treat them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub values: Vec<String>,
    pub directive: CompletionDirective,
}

impl Resolution {
    pub fn new(values: Vec<String>, directive: CompletionDirective) -> Self {
        Self { values, directive }
    }
}

/// In-process value callback: `(command, current value, custom config)`.
pub type CompletionFn =
    Arc<dyn Fn(&Command, &str, &str) -> CommandResult<Resolution> + Send + Sync>;

/// A reference to another command whose stdout lines become values.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SourceCommand {
    /// Path of the command to run, e.g. `["db", "list-tables"]`.
    pub path: Vec<String>,
    /// Argument template, rendered then split on whitespace.
    #[serde(default)]
    pub args: String,
}

/// The mechanism a [`ValueSource`] uses.
#[derive(Clone)]
pub enum SourceKind {
    /// A fixed list.
    Static(Vec<String>),
    /// Files with the given extensions; suggest only.
    Files(Vec<String>),
    /// Directories under the given prefix; suggest only.
    Directories(String),
    /// A `bash -c` template, one value per stdout line.
    Script(String),
    /// Another command, one value per stdout line.
    Command(SourceCommand),
    /// A registered or in-code function.
    Func {
        func: CompletionFn,
        custom: String,
    },
}

impl SourceKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::Files(_) => "files",
            Self::Directories(_) => "dirs",
            Self::Script(_) => "script",
            Self::Command(_) => "command",
            Self::Func { .. } => "func",
        }
    }
}

impl fmt::Debug for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(values) => f.debug_tuple("Static").field(values).finish(),
            Self::Files(exts) => f.debug_tuple("Files").field(exts).finish(),
            Self::Directories(prefix) => f.debug_tuple("Directories").field(prefix).finish(),
            Self::Script(script) => f.debug_tuple("Script").field(script).finish(),
            Self::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
            Self::Func { custom, .. } => f.debug_struct("Func").field("custom", custom).finish(),
        }
    }
}

/// What a resolution may look at besides the value being resolved.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    /// The command owning the argument or option.
    pub command: &'a Command,
    /// The tree used to find sub-commands and runtime settings.
    pub tree: Option<&'a CommandTree>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(command: &'a Command, tree: Option<&'a CommandTree>) -> Self {
        Self { command, tree }
    }

    fn environment(&self) -> HashMap<String, String> {
        self.tree
            .map(|tree| tree.runtime().environment_map())
            .unwrap_or_default()
    }
}

/// Source for auto-completed and validated values of an argument or option.
#[derive(Clone, Deserialize)]
#[serde(try_from = "RawValueSource")]
pub struct ValueSource {
    kind: SourceKind,
    /// Seconds to wait for a script, command or function.
    pub timeout: u64,
    /// Only suggest values, never validate them.
    pub suggestion: bool,
    /// Don't add a space after an accepted suggestion.
    pub suggest_raw: bool,
    computed: OnceLock<Resolution>,
}

impl fmt::Debug for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSource")
            .field("kind", &self.kind)
            .field("timeout", &self.timeout)
            .field("suggestion", &self.suggestion)
            .field("suggest_raw", &self.suggest_raw)
            .field("computed", &self.computed.get())
            .finish()
    }
}

impl ValueSource {
    /// Create a source of the given kind with default settings.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            timeout: DEFAULT_TIMEOUT,
            suggestion: false,
            suggest_raw: false,
            computed: OnceLock::new(),
        }
    }

    pub fn static_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SourceKind::Static(values.into_iter().map(Into::into).collect()))
    }

    pub fn files<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SourceKind::Files(
            extensions.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn directories(prefix: impl Into<String>) -> Self {
        Self::new(SourceKind::Directories(prefix.into()))
    }

    pub fn script(script: impl Into<String>) -> Self {
        Self::new(SourceKind::Script(script.into()))
    }

    pub fn command<I, S>(path: I, args: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(SourceKind::Command(SourceCommand {
            path: path.into_iter().map(Into::into).collect(),
            args: args.into(),
        }))
    }

    pub fn func<F>(func: F) -> Self
    where
        F: Fn(&Command, &str, &str) -> CommandResult<Resolution> + Send + Sync + 'static,
    {
        Self::new(SourceKind::Func {
            func: Arc::new(func),
            custom: String::new(),
        })
    }

    /// Set the timeout in seconds; zero means the default.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = if seconds == 0 { DEFAULT_TIMEOUT } else { seconds };
        self
    }

    /// Suggest values without validating them.
    pub fn suggest_only(mut self) -> Self {
        self.suggestion = true;
        self
    }

    /// Don't add a trailing space after completing.
    pub fn raw(mut self) -> Self {
        self.suggest_raw = true;
        self
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// Whether supplied values must be members of the resolved values.
    pub fn validates(&self) -> bool {
        if matches!(self.kind, SourceKind::Files(_) | SourceKind::Directories(_)) {
            return false;
        }
        !self.suggestion
    }

    /// The cached resolution, if any.
    pub fn computed(&self) -> Option<&Resolution> {
        self.computed.get()
    }

    fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Resolve the permissible values.
    ///
    /// Once resolved, the cached result is returned regardless of `current`.
    pub async fn resolve(&self, ctx: &ResolveContext<'_>, current: &str) -> CommandResult<Resolution> {
        if let Some(cached) = self.computed.get() {
            trace!("using cached {} values", self.kind.label());
            return Ok(cached.clone());
        }

        let mut resolution = match &self.kind {
            SourceKind::Static(values) => {
                Resolution::new(values.clone(), CompletionDirective::DEFAULT)
            }
            SourceKind::Files(extensions) => {
                Resolution::new(extensions.clone(), CompletionDirective::FILTER_FILE_EXT)
            }
            SourceKind::Directories(prefix) => {
                Resolution::new(vec![prefix.clone()], CompletionDirective::FILTER_DIRS)
            }
            SourceKind::Func { func, custom } => {
                self.resolve_func(ctx, func, custom, current).await?
            }
            SourceKind::Command(source) => self.resolve_command(ctx, source, current).await?,
            SourceKind::Script(script) => self.resolve_script(ctx, script, current).await?,
        };

        if self.suggest_raw {
            resolution.directive |= CompletionDirective::NO_SPACE;
        }

        let _ = self.computed.set(resolution.clone());
        Ok(resolution)
    }

    async fn resolve_func(
        &self,
        ctx: &ResolveContext<'_>,
        func: &CompletionFn,
        custom: &str,
        current: &str,
    ) -> CommandResult<Resolution> {
        let func = Arc::clone(func);
        let command = ctx.command.clone();
        let current = current.to_string();
        let custom = custom.to_string();

        // The blocking task cannot be cancelled; on timeout it is left to finish
        // on its own and its result is dropped.
        let task = tokio::task::spawn_blocking(move || func(&command, &current, &custom));

        match timeout(self.timeout_duration(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic())
            }
            Ok(Err(join_error)) => Err(CommandError::execution(format!(
                "value function for {} did not finish: {}",
                ctx.command.full_name(),
                join_error
            ))),
            Err(_) => {
                debug!("value function for {} timed out", ctx.command.full_name());
                Err(CommandError::timeout(
                    format!("values for command {}", ctx.command.full_name()),
                    self.timeout,
                ))
            }
        }
    }

    async fn resolve_command(
        &self,
        ctx: &ResolveContext<'_>,
        source: &SourceCommand,
        current: &str,
    ) -> CommandResult<Resolution> {
        let tree = ctx.tree.ok_or_else(|| {
            CommandError::configuration(format!(
                "command value source of {} has no command tree to run {}",
                ctx.command.full_name(),
                source.path.join(" ")
            ))
        })?;

        let rendered = ctx.command.resolve_template(&source.args, current)?;
        let args: Vec<String> = rendered.split_whitespace().map(str::to_string).collect();
        let ran = source.path.iter().chain(args.iter()).cloned().collect::<Vec<_>>().join(" ");
        debug!("resolving values from command {}", ran);

        match timeout(self.timeout_duration(), tree.invoke(&source.path, args)).await {
            Ok(Ok(stdout)) => Ok(Resolution::new(
                split_lines(&stdout),
                CompletionDirective::DEFAULT,
            )),
            Ok(Err(e @ (CommandError::Timeout { .. } | CommandError::Configuration(_)))) => Err(e),
            Ok(Err(e)) => {
                debug!("error running {}: {}", ran, e);
                Err(CommandError::bad_arguments(format!(
                    "could not validate argument for command {}, ran <{}> failed: {}",
                    ctx.command.full_name(),
                    ran,
                    e
                )))
            }
            Err(_) => Err(CommandError::timeout(
                format!("command {}", source.path.join(" ")),
                self.timeout,
            )),
        }
    }

    async fn resolve_script(
        &self,
        ctx: &ResolveContext<'_>,
        script: &str,
        current: &str,
    ) -> CommandResult<Resolution> {
        let script = ctx.command.resolve_template(script, current)?;
        let args = vec!["-c".to_string(), script];

        let values = CommandExecutor::new(self.timeout)
            .with_env(ctx.environment())
            .lines(&ctx.command.full_name(), SHELL, &args)
            .await?;

        Ok(Resolution::new(values, CompletionDirective::DEFAULT))
    }

    /// Completion candidates for `to_complete`, followed by a hint built from `description`.
    ///
    /// Resolution failures offer nothing instead of failing.
    pub async fn complete(
        &self,
        ctx: &ResolveContext<'_>,
        to_complete: &str,
        description: &str,
    ) -> Completions {
        let resolution = match self.resolve(ctx, to_complete).await {
            Ok(resolution) => resolution,
            Err(e) => {
                debug!("could not resolve completions: {}", e);
                return Completions::error();
            }
        };

        let mut values = if resolution.directive.is_shell_filter() {
            resolution.values
        } else {
            filter_prefix(resolution.values, to_complete)
        };
        values.push(active_help(description));

        Completions::new(values, resolution.directive)
    }
}

fn custom_completers() -> &'static RwLock<HashMap<String, CompletionFn>> {
    static COMPLETERS: OnceLock<RwLock<HashMap<String, CompletionFn>>> = OnceLock::new();
    COMPLETERS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a function usable as a value source under `key` in schema files.
///
/// The value given for `key` in the schema is passed to `func` as its custom
/// configuration string.
pub fn register_value_source<F>(key: impl Into<String>, func: F)
where
    F: Fn(&Command, &str, &str) -> CommandResult<Resolution> + Send + Sync + 'static,
{
    let mut completers = custom_completers()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    completers.insert(key.into(), Arc::new(func));
}

fn registered_value_source(key: &str) -> Option<CompletionFn> {
    custom_completers()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(key)
        .cloned()
}

/// Schema form of a [`ValueSource`], before variant exclusivity is checked.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawValueSource {
    #[serde(default)]
    dirs: Option<String>,
    #[serde(default)]
    files: Option<Vec<String>>,
    #[serde(default)]
    script: Option<String>,
    #[serde(default, rename = "static")]
    static_values: Option<Vec<String>>,
    #[serde(default)]
    command: Option<SourceCommand>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    suggest_only: bool,
    #[serde(default)]
    suggest_raw: bool,
    #[serde(flatten)]
    custom: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<RawValueSource> for ValueSource {
    type Error = String;

    fn try_from(raw: RawValueSource) -> Result<Self, Self::Error> {
        let mut kinds = Vec::new();

        if let Some(values) = raw.static_values {
            kinds.push(SourceKind::Static(values));
        }
        if let Some(extensions) = raw.files {
            kinds.push(SourceKind::Files(extensions));
        }
        if let Some(prefix) = raw.dirs {
            kinds.push(SourceKind::Directories(prefix));
        }
        if let Some(script) = raw.script {
            kinds.push(SourceKind::Script(script));
        }
        if let Some(command) = raw.command {
            kinds.push(SourceKind::Command(command));
        }
        for (key, value) in raw.custom {
            let func = registered_value_source(&key)
                .ok_or_else(|| format!("unknown value source key: {}", key))?;
            let custom = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            kinds.push(SourceKind::Func { func, custom });
        }

        if kinds.len() > 1 {
            let names: Vec<&str> = kinds.iter().map(SourceKind::label).collect();
            return Err(format!(
                "value source must set exactly one of static, files, dirs, script, command or a registered source, found: {}",
                names.join(", ")
            ));
        }

        let kind = kinds.pop().ok_or_else(|| "empty value source".to_string())?;
        let mut source = ValueSource::new(kind).with_timeout(raw.timeout.unwrap_or(0));
        source.suggestion = raw.suggest_only;
        source.suggest_raw = raw.suggest_raw;
        Ok(source)
    }
}
