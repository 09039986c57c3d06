//! CLI builder - converts a command tree into a clap Command

use clap::{value_parser, Arg, ArgAction, ColorChoice, ValueHint};

use super::config::AppConfig;
use super::registry::CommandTree;
use crate::command::argument::env_name;
use crate::command::{Argument, Command, CommandOption, Options, SourceKind, Value, ValueSource, ValueType};

/// Builds clap commands for an application's command tree
pub struct CliBuilder<'a> {
    app: &'a AppConfig,
    tree: &'a CommandTree,
}

impl<'a> CliBuilder<'a> {
    pub fn new(app: &'a AppConfig, tree: &'a CommandTree) -> Self {
        Self { app, tree }
    }

    /// Build the root command with every registered command below it.
    pub fn build(&self) -> clap::Command {
        let runtime = self.tree.runtime();
        let color = if !runtime.color_enabled {
            ColorChoice::Never
        } else if runtime.force_color {
            ColorChoice::Always
        } else {
            ColorChoice::Auto
        };

        let mut root = clap::Command::new(self.app.name.clone())
            .subcommand_required(true)
            .color(color);

        if !self.app.version.is_empty() {
            root = root.version(self.app.version.clone());
        }
        if let Some(summary) = &self.app.summary {
            root = root.about(summary.clone());
        }
        if let Some(description) = &self.app.description {
            root = root.long_about(description.clone());
        }

        for (name, option) in self.tree.globals().iter() {
            root = root.arg(Self::build_option(name, option).global(true));
        }

        root.subcommands(self.build_level(&[]))
    }

    fn build_level(&self, prefix: &[String]) -> Vec<clap::Command> {
        self.tree
            .children(prefix)
            .into_iter()
            .map(|child| {
                let mut path = prefix.to_vec();
                path.push(child.clone());

                let mut cmd = match self.tree.find(&path) {
                    Some(command) => Self::build_command(command),
                    None => clap::Command::new(child)
                        .about(format!("{} commands", path.join(" ")))
                        .subcommand_required(true),
                };

                if self.tree.is_group(&path) {
                    cmd = cmd.subcommands(self.build_level(&path));
                }
                if self.tree.is_hidden(&path) {
                    cmd = cmd.hide(true);
                }
                cmd
            })
            .collect()
    }

    /// Build a standalone command with its own options and arguments.
    pub fn build_command(command: &Command) -> clap::Command {
        let mut cmd = clap::Command::new(command.name().to_string()).hide(command.hidden);

        if !command.summary.is_empty() {
            cmd = cmd.about(command.summary.clone());
        }
        if !command.description.is_empty() {
            cmd = cmd.long_about(command.description.clone());
        }

        let usage = format!(
            "{} [options] {}",
            command.full_name(),
            command.arguments.to_desc().join(" ")
        );
        cmd = cmd.override_usage(usage.trim_end().to_string());

        for (name, option) in command.options.iter() {
            cmd = cmd.arg(Self::build_option(name, option));
        }
        for argument in command.arguments.iter() {
            cmd = cmd.arg(Self::build_argument(argument));
        }

        cmd
    }

    /// Build a command that also accepts `globals`, for running it on its own.
    pub fn leaf(command: &Command, globals: &Options) -> clap::Command {
        let mut cmd = Self::build_command(command);
        for (name, option) in globals.iter() {
            cmd = cmd.arg(Self::build_option(name, option));
        }
        cmd
    }

    /// Build a `--name` flag for an option.
    fn build_option(name: &str, option: &CommandOption) -> Arg {
        let mut arg = Arg::new(name.to_string()).long(name.to_string());

        if let Some(short) = option.short_name {
            arg = arg.short(short);
        }
        if !option.description.is_empty() {
            arg = arg.help(option.description.clone());
        }

        arg = match (option.kind, option.repeated) {
            (ValueType::Bool, _) => arg.action(ArgAction::SetTrue),
            (ValueType::Int, _) => arg.action(ArgAction::Set).value_parser(value_parser!(i64)),
            (ValueType::String, true) => arg.action(ArgAction::Append),
            (ValueType::String, false) => arg.action(ArgAction::Set),
        };

        // defaults are shown in help; binding only trusts supplied values
        if option.takes_value() {
            arg = match &option.default {
                Some(Value::List(values)) => arg.default_values(values.clone()),
                Some(other) => arg.default_value(other.to_string()),
                None => arg,
            };
        }

        with_hint(arg, option.values.as_ref())
    }

    /// Build a positional argument; presence is checked by validation, not clap.
    fn build_argument(argument: &Argument) -> Arg {
        let mut arg = Arg::new(argument.name.clone())
            .value_name(env_name(&argument.name))
            .required(false);

        if !argument.description.is_empty() {
            arg = arg.help(argument.description.clone());
        }

        arg = if argument.variadic {
            arg.num_args(1..).action(ArgAction::Append)
        } else {
            arg.action(ArgAction::Set)
        };

        with_hint(arg, argument.values.as_ref())
    }
}

fn with_hint(arg: Arg, values: Option<&ValueSource>) -> Arg {
    match values.map(ValueSource::kind) {
        Some(SourceKind::Files(_)) => arg.value_hint(ValueHint::FilePath),
        Some(SourceKind::Directories(_)) => arg.value_hint(ValueHint::DirPath),
        _ => arg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> CommandTree {
        let mut tree = CommandTree::default();
        tree.insert(
            Command::new(["db", "migrate"])
                .with_summary("Run migrations")
                .with_argument(Argument::new("target").required())
                .with_argument(Argument::new("extra-args").variadic())
                .with_option("steps", CommandOption::new(ValueType::Int).with_default(1).with_short('s'))
                .with_option("tag", CommandOption::new(ValueType::String).repeated()),
        )
        .unwrap();
        tree.insert(Command::new(["secret"]).hidden()).unwrap();
        tree
    }

    #[test]
    fn test_build_tree() {
        let app = AppConfig::new("test", "1.0.0");
        let tree = tree();
        let root = CliBuilder::new(&app, &tree).build();

        assert_eq!(root.get_name(), "test");
        assert_eq!(root.get_version(), Some("1.0.0"));
        assert!(root.get_arguments().any(|a| a.get_id() == "skip-validation"));

        let db = root.find_subcommand("db").unwrap();
        assert!(db.is_subcommand_required_set());
        let migrate = db.find_subcommand("migrate").unwrap();
        assert_eq!(migrate.get_about().map(|s| s.to_string()), Some("Run migrations".to_string()));

        assert!(root.find_subcommand("secret").unwrap().is_hide_set());
    }

    #[test]
    fn test_parse_leaf() {
        let app = AppConfig::new("test", "1.0.0");
        let tree = tree();
        let matches = CliBuilder::new(&app, &tree)
            .build()
            .try_get_matches_from(["test", "db", "migrate", "-s", "3", "up", "a", "b", "--tag", "x", "-v"])
            .unwrap();

        let (_, db) = matches.subcommand().unwrap();
        let (name, migrate) = db.subcommand().unwrap();
        assert_eq!(name, "migrate");
        assert_eq!(migrate.get_one::<i64>("steps"), Some(&3));
        assert_eq!(migrate.get_one::<String>("target").map(String::as_str), Some("up"));
        let extra: Vec<&String> = migrate.get_many::<String>("extra-args").unwrap().collect();
        assert_eq!(extra, vec!["a", "b"]);
        assert!(migrate.get_flag("verbose"));
    }

    #[test]
    fn test_usage_uses_argument_descriptions() {
        let tree = tree();
        let command = tree.find(&["db".to_string(), "migrate".to_string()]).unwrap();
        let mut cmd = CliBuilder::build_command(command);
        let usage = cmd.render_usage().to_string();
        assert!(usage.contains("db migrate [options] TARGET [EXTRA_ARGS...]"));
    }

    #[test]
    fn test_missing_positional_is_not_a_clap_error() {
        let tree = tree();
        let command = tree.find(&["db".to_string(), "migrate".to_string()]).unwrap();
        let matches = CliBuilder::leaf(command, tree.globals())
            .try_get_matches_from(["migrate"])
            .unwrap();
        assert!(matches.get_one::<String>("target").is_none());
        assert!(!matches.get_flag("skip-validation"));
    }
}
