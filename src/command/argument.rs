//! Positional arguments: binding, validation and description.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use serde::Deserialize;
use tracing::trace;

use super::source::{ResolveContext, ValueSource};
use super::value::Value;
use crate::error::{CommandError, CommandResult};

/// Name of an argument as shown in usage and environment variables: `first-arg` becomes `FIRST_ARG`.
pub fn env_name(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

/// A positional argument of a command.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Argument {
    /// Name used in templates, usage and error messages.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Value used when nothing is supplied.
    #[serde(default)]
    pub default: Option<Value>,
    /// Absence (without a non-empty default) is an error.
    #[serde(default)]
    pub required: bool,
    /// Consumes all remaining positional tokens.
    #[serde(default)]
    pub variadic: bool,
    /// Where permissible values come from.
    #[serde(default)]
    pub values: Option<ValueSource>,
    #[serde(skip)]
    provided: Option<Vec<String>>,
}

impl Argument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
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

    pub fn with_values(mut self, values: ValueSource) -> Self {
        self.values = Some(values);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Whether the user supplied this argument.
    pub fn is_known(&self) -> bool {
        self.provided.is_some()
    }

    /// Tokens bound from the command line, if any.
    pub fn provided(&self) -> Option<&[String]> {
        self.provided.as_deref()
    }

    /// Bind `tokens` as if typed by the user.
    pub fn provide<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provided = Some(tokens.into_iter().map(Into::into).collect());
    }

    /// The supplied value, falling back to the default.
    ///
    /// Variadic arguments always produce a list.
    pub fn to_value(&self) -> Option<Value> {
        if let Some(tokens) = &self.provided {
            return Some(if self.variadic {
                Value::List(tokens.clone())
            } else {
                Value::String(tokens.first().cloned().unwrap_or_default())
            });
        }

        match (&self.default, self.variadic) {
            (Some(default), true) => Some(Value::List(default.to_list())),
            (None, true) => Some(Value::List(Vec::new())),
            (default, false) => default.clone(),
        }
    }

    /// The value as text, or an empty string when unset.
    pub fn value_string(&self) -> String {
        self.to_value().map(|v| v.to_string()).unwrap_or_default()
    }

    /// Usage fragment: `NAME`, `[NAME]`, `NAME...` or `[NAME...]`.
    pub fn to_desc(&self) -> String {
        let mut desc = env_name(&self.name);
        if self.variadic {
            desc.push_str("...");
        }
        if !self.required {
            desc = format!("[{}]", desc);
        }
        desc
    }

    fn is_missing(&self) -> bool {
        if self.is_known() {
            return false;
        }
        match &self.default {
            None => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::List(values)) => values.is_empty(),
            Some(_) => false,
        }
    }

    /// Check presence and membership of the current value.
    pub async fn validate(&self, ctx: &ResolveContext<'_>) -> CommandResult<()> {
        if self.required && self.is_missing() {
            return Err(CommandError::bad_arguments(format!(
                "Missing argument for {}",
                env_name(&self.name)
            )));
        }

        let Some(source) = &self.values else {
            return Ok(());
        };
        if !source.validates() {
            return Ok(());
        }

        if self.variadic {
            let values = self.to_value().map(|v| v.to_list()).unwrap_or_default();
            for value in values {
                self.validate_one(source, ctx, &value).await?;
            }
            Ok(())
        } else {
            self.validate_one(source, ctx, &self.value_string()).await
        }
    }

    async fn validate_one(
        &self,
        source: &ValueSource,
        ctx: &ResolveContext<'_>,
        current: &str,
    ) -> CommandResult<()> {
        // absent optional values have nothing to check
        if current.is_empty() {
            return Ok(());
        }

        let resolved = source.resolve(ctx, current).await?;
        trace!("validating argument {} value {} against {:?}", self.name, current, resolved.values);

        if !resolved.values.iter().any(|v| v == current) {
            return Err(CommandError::bad_arguments(format!(
                "{} is not a valid value for argument <{}>. Valid options are: {}",
                current,
                self.name,
                resolved.values.join(", ")
            )));
        }
        Ok(())
    }
}

/// Ordered positional arguments of a command.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Arguments(pub Vec<Argument>);

impl Deref for Arguments {
    type Target = Vec<Argument>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Arguments {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<Argument>> for Arguments {
    fn from(arguments: Vec<Argument>) -> Self {
        Self(arguments)
    }
}

impl Arguments {
    /// Bind positional tokens in order.
    ///
    /// Fewer tokens than arguments is fine; a variadic argument takes every
    /// remaining token. Surplus tokens without a variadic argument are an
    /// error, but every argument is still bound.
    pub fn parse(&mut self, tokens: &[String]) -> CommandResult<()> {
        let mut consumed = 0;

        for (index, argument) in self.0.iter_mut().enumerate() {
            argument.provided = None;
            if index >= tokens.len() {
                continue;
            }
            if argument.variadic {
                argument.provided = Some(tokens[index..].to_vec());
                consumed = tokens.len();
            } else {
                argument.provided = Some(vec![tokens[index].clone()]);
                consumed = index + 1;
            }
        }

        if consumed < tokens.len() {
            return Err(CommandError::bad_arguments(format!(
                "unexpected argument {}",
                tokens[consumed]
            )));
        }
        Ok(())
    }

    /// Every argument's value by name.
    ///
    /// Unset scalars map to an empty string, unset variadics to an empty list.
    pub fn all_known(&self) -> BTreeMap<String, Value> {
        self.0
            .iter()
            .map(|arg| {
                let value = arg
                    .to_value()
                    .unwrap_or_else(|| Value::String(String::new()));
                (arg.name.clone(), value)
            })
            .collect()
    }

    /// Every argument's value as text, by name.
    pub fn all_known_str(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|arg| (arg.name.clone(), arg.value_string()))
            .collect()
    }

    /// Validate every argument in declaration order, stopping at the first error.
    pub async fn are_valid(&self, ctx: &ResolveContext<'_>) -> CommandResult<()> {
        for argument in self.0.iter() {
            argument.validate(ctx).await?;
        }
        Ok(())
    }

    /// Index of the argument receiving the next token after `typed` tokens.
    pub fn active_index(&self, typed: usize) -> Option<usize> {
        if typed < self.0.len() {
            return Some(typed);
        }
        match self.0.last() {
            Some(last) if last.variadic => Some(self.0.len() - 1),
            _ => None,
        }
    }

    /// Usage fragments of every argument, in order.
    pub fn to_desc(&self) -> Vec<String> {
        self.0.iter().map(Argument::to_desc).collect()
    }
}
