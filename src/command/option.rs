//! Named options: binding from parsed flags, validation.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use clap::parser::ValueSource as ClapSource;
use clap::ArgMatches;
use serde::Deserialize;
use tracing::trace;

use super::source::{ResolveContext, ValueSource};
use super::value::{Value, ValueType};
use crate::error::{CommandError, CommandResult};

/// A named option of a command.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandOption {
    /// Type of value the option holds.
    #[serde(default, rename = "type")]
    pub kind: ValueType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<Value>,
    /// Single-character alias, e.g. `-v`.
    #[serde(default)]
    pub short_name: Option<char>,
    /// Where permissible values come from.
    #[serde(default)]
    pub values: Option<ValueSource>,
    /// May be given multiple times; only for string options.
    #[serde(default)]
    pub repeated: bool,
    #[serde(skip)]
    provided: Option<Value>,
}

impl CommandOption {
    pub fn new(kind: ValueType) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_short(mut self, short: char) -> Self {
        self.short_name = Some(short);
        self
    }

    pub fn with_values(mut self, values: ValueSource) -> Self {
        self.values = Some(values);
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// Whether the user supplied this option.
    pub fn is_known(&self) -> bool {
        self.provided.is_some()
    }

    /// Bind `value` as if supplied by the user.
    pub fn provide(&mut self, value: impl Into<Value>) {
        self.provided = Some(value.into());
    }

    /// Whether the option consumes a value token.
    pub fn takes_value(&self) -> bool {
        self.kind != ValueType::Bool
    }

    /// The supplied value, falling back to the default.
    pub fn to_value(&self) -> Option<Value> {
        self.provided.clone().or_else(|| self.default.clone())
    }

    /// The value as text; lists are joined with spaces.
    pub fn value_string(&self) -> String {
        self.to_value().map(|v| v.to_string()).unwrap_or_default()
    }

    /// Check membership of the current value(s).
    pub async fn validate(&self, name: &str, ctx: &ResolveContext<'_>) -> CommandResult<()> {
        let Some(source) = &self.values else {
            return Ok(());
        };
        if !source.validates() {
            return Ok(());
        }

        if self.repeated {
            let values = self.to_value().map(|v| v.to_list()).unwrap_or_default();
            for value in values {
                validate_one(name, source, ctx, &value).await?;
            }
            Ok(())
        } else {
            validate_one(name, source, ctx, &self.value_string()).await
        }
    }
}

async fn validate_one(
    name: &str,
    source: &ValueSource,
    ctx: &ResolveContext<'_>,
    current: &str,
) -> CommandResult<()> {
    if current.is_empty() {
        return Ok(());
    }

    let resolved = source.resolve(ctx, current).await?;
    if !resolved.values.iter().any(|v| v == current) {
        return Err(CommandError::bad_arguments(format!(
            "{} is not a valid value for option <{}>. Valid options are: {}",
            current,
            name,
            resolved.values.join(", ")
        )));
    }
    Ok(())
}

/// Options of a command, by long name.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Options(pub BTreeMap<String, CommandOption>);

impl Deref for Options {
    type Target = BTreeMap<String, CommandOption>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Options {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<BTreeMap<String, CommandOption>> for Options {
    fn from(options: BTreeMap<String, CommandOption>) -> Self {
        Self(options)
    }
}

fn supplied(matches: &ArgMatches, name: &str) -> bool {
    matches.try_contains_id(name).unwrap_or(false)
        && matches!(
            matches.value_source(name),
            Some(ClapSource::CommandLine | ClapSource::EnvVariable)
        )
}

fn read(matches: &ArgMatches, name: &str, option: &CommandOption) -> Option<Value> {
    match (option.kind, option.repeated) {
        (ValueType::Bool, _) => matches
            .try_get_one::<bool>(name)
            .ok()
            .flatten()
            .map(|v| Value::Bool(*v)),
        (ValueType::Int, _) => matches
            .try_get_one::<i64>(name)
            .ok()
            .flatten()
            .map(|v| Value::Int(*v)),
        (ValueType::String, true) => matches
            .try_get_many::<String>(name)
            .ok()
            .flatten()
            .map(|values| Value::List(values.cloned().collect())),
        (ValueType::String, false) => matches
            .try_get_one::<String>(name)
            .ok()
            .flatten()
            .map(|v| Value::String(v.clone())),
    }
}

impl Options {
    /// Bind options the user actually supplied in `matches`.
    ///
    /// Options only filled in from defaults stay unknown; options that are
    /// missing from `matches` or hold an unexpected type are skipped.
    pub fn parse(&mut self, matches: &ArgMatches) {
        for (name, option) in self.0.iter_mut() {
            option.provided = None;
            if !supplied(matches, name) {
                continue;
            }

            option.provided = read(matches, name, option);
            if option.provided.is_none() {
                trace!("could not read option {} as {}", name, option.kind);
            }
        }
    }

    /// Every option's value by name; options without a value are left out.
    pub fn all_known(&self) -> BTreeMap<String, Value> {
        self.0
            .iter()
            .filter_map(|(name, opt)| opt.to_value().map(|v| (name.clone(), v)))
            .collect()
    }

    /// Every declared option's value as text, by name; unset options map to an empty string.
    pub fn all_known_str(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(name, opt)| (name.clone(), opt.value_string()))
            .collect()
    }

    /// Validate every option, stopping at the first error.
    pub async fn are_valid(&self, ctx: &ResolveContext<'_>) -> CommandResult<()> {
        for (name, option) in self.0.iter() {
            option.validate(name, ctx).await?;
        }
        Ok(())
    }

    /// Long name of the option with the given short alias.
    pub fn by_short(&self, short: char) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, opt)| opt.short_name == Some(short))
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use clap::{Arg, ArgAction};

    fn matches(args: &[&str]) -> ArgMatches {
        clap::Command::new("test")
            .arg(Arg::new("name").long("name").action(ArgAction::Set).default_value("fallback"))
            .arg(Arg::new("count").long("count").value_parser(clap::value_parser!(i64)))
            .arg(Arg::new("force").long("force").action(ArgAction::SetTrue))
            .arg(Arg::new("tag").long("tag").action(ArgAction::Append))
            .try_get_matches_from(args)
            .unwrap()
    }

    fn options() -> Options {
        let mut options = Options::default();
        options.insert("name".into(), CommandOption::new(ValueType::String).with_default("fallback"));
        options.insert("count".into(), CommandOption::new(ValueType::Int));
        options.insert("force".into(), CommandOption::new(ValueType::Bool).with_default(false));
        options.insert("tag".into(), CommandOption::new(ValueType::String).repeated());
        options.insert("absent".into(), CommandOption::new(ValueType::String));
        options
    }

    #[test]
    fn test_parse_only_marks_supplied() {
        let mut opts = options();
        opts.parse(&matches(&["test"]));

        assert!(!opts["name"].is_known());
        assert!(!opts["force"].is_known());
        assert!(!opts["absent"].is_known());
        assert_eq!(opts["name"].value_string(), "fallback");
        assert_eq!(opts["force"].to_value(), Some(Value::Bool(false)));
    }

    #[test]
    fn test_parse_typed_values() {
        let mut opts = options();
        opts.parse(&matches(&[
            "test", "--name", "given", "--count", "3", "--force", "--tag", "a", "--tag", "b",
        ]));

        assert!(opts["name"].is_known());
        assert_eq!(opts["name"].to_value(), Some(Value::from("given")));
        assert_eq!(opts["count"].to_value(), Some(Value::Int(3)));
        assert_eq!(opts["force"].to_value(), Some(Value::Bool(true)));
        assert_eq!(opts["tag"].to_value(), Some(Value::from(vec!["a", "b"])));
        assert_eq!(opts["tag"].value_string(), "a b");
    }

    #[test]
    fn test_all_known() {
        let mut opts = options();
        opts.parse(&matches(&["test", "--count", "7"]));

        let known = opts.all_known_str();
        assert_eq!(known["name"], "fallback");
        assert_eq!(known["count"], "7");
        assert_eq!(known["force"], "false");
        assert_eq!(known["absent"], "");
        assert_eq!(known["tag"], "");
        assert!(!opts.all_known().contains_key("absent"));
    }

    #[test]
    fn test_by_short() {
        let mut opts = options();
        opts.insert("verbose".into(), CommandOption::new(ValueType::Bool).with_short('v'));
        assert_eq!(opts.by_short('v'), Some("verbose"));
        assert_eq!(opts.by_short('x'), None);
    }

    #[tokio::test]
    async fn test_validation() {
        let mut cmd = Command::new(["test", "options"]);
        cmd.options.insert(
            "env".into(),
            CommandOption::new(ValueType::String)
                .with_default("default")
                .with_values(ValueSource::static_values(["default", "good"])),
        );
        let ctx = ResolveContext::new(&cmd, None);
        assert!(cmd.options.are_valid(&ctx).await.is_ok());

        cmd.options.get_mut("env").unwrap().provide("bad");
        let ctx = ResolveContext::new(&cmd, None);
        let err = cmd.options.are_valid(&ctx).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad is not a valid value for option <env>. Valid options are: default, good"
        );
    }

    #[tokio::test]
    async fn test_repeated_validation() {
        let mut cmd = Command::new(["test", "options"]);
        let mut option = CommandOption::new(ValueType::String)
            .repeated()
            .with_values(ValueSource::static_values(["default", "good"]));
        option.provide(vec!["default", "good", "bad"]);
        cmd.options.insert("tag".into(), option);

        let ctx = ResolveContext::new(&cmd, None);
        let err = cmd.options.are_valid(&ctx).await.unwrap_err();
        assert!(err.to_string().starts_with("bad is not a valid value for option <tag>"));

        cmd.options.get_mut("tag").unwrap().provide(vec!["default", "good"]);
        let ctx = ResolveContext::new(&cmd, None);
        assert!(cmd.options.are_valid(&ctx).await.is_ok());
    }

    #[test]
    fn test_deserialize() {
        let opt: CommandOption = serde_json::from_str(
            r#"{"type": "int", "short-name": "c", "default": 3, "description": "how many"}"#,
        )
        .unwrap();
        assert_eq!(opt.kind, ValueType::Int);
        assert_eq!(opt.short_name, Some('c'));
        assert_eq!(opt.default, Some(Value::Int(3)));
        assert!(opt.takes_value());
    }
}
