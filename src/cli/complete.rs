//! The hidden `__complete` command used by shell completion scripts.
//!
//! Shells call `<app> __complete <words...> <partial>` and read one candidate
//! per line followed by `:<directive>`.

use std::io::Write;

use tracing::debug;

use super::builder::CliBuilder;
use super::registry::CommandTree;
use crate::command::{Command, Options};
use crate::completion::{filter_prefix, CompletionDirective, Completions, ACTIVE_HELP_MARKER};
use crate::error::CommandResult;

/// Name of the hidden completion command.
pub const COMPLETE_COMMAND: &str = "__complete";

/// Answer a completion request for `words`, the last of which is being typed.
pub async fn respond(tree: &CommandTree, words: &[String], out: &mut (dyn Write + Send)) -> CommandResult<()> {
    let completions = complete(tree, words).await;
    debug!(
        "completed {:?} with {} candidates, directive {}",
        words,
        completions.values.len(),
        completions.directive
    );
    completions.write_to(out)?;
    Ok(())
}

/// Candidates for `words`, the last of which is being typed.
pub async fn complete(tree: &CommandTree, words: &[String]) -> Completions {
    let (to_complete, typed) = match words.split_last() {
        Some((last, typed)) => (last.as_str(), typed),
        None => ("", words),
    };

    let mut path = Vec::new();
    let mut index = 0;
    while let Some(word) = typed.get(index) {
        if word.starts_with('-') {
            break;
        }
        let mut next = path.clone();
        next.push(word.clone());
        if !tree.is_group(&next) && tree.find(&next).is_none() {
            break;
        }
        path = next;
        index += 1;
    }

    // a command that is also a group completes its children until it takes arguments
    let leaf = tree
        .find(&path)
        .filter(|command| !(tree.is_group(&path) && command.arguments.is_empty()));

    match leaf {
        Some(command) => complete_command(tree, command.clone(), &typed[index..], to_complete).await,
        None => {
            let children = tree
                .children(&path)
                .into_iter()
                .filter(|child| {
                    let mut child_path = path.clone();
                    child_path.push(child.clone());
                    !tree.is_hidden(&child_path)
                })
                .collect();
            Completions::new(filter_prefix(children, to_complete), CompletionDirective::NO_FILE_COMP)
        }
    }
}

/// Long name for a `--long` or `-s` flag word, without any `=value`.
fn option_name(options: &Options, word: &str) -> Option<String> {
    if let Some(long) = word.strip_prefix("--") {
        let name = long.split('=').next().unwrap_or(long);
        return options.contains_key(name).then(|| name.to_string());
    }
    let mut chars = word.strip_prefix('-')?.chars();
    let short = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    options.by_short(short).map(str::to_string)
}

async fn complete_command(
    tree: &CommandTree,
    mut command: Command,
    rest: &[String],
    to_complete: &str,
) -> Completions {
    let mut options = command.options.clone();
    options.extend(tree.globals().iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut positionals = Vec::new();
    let mut flags = Vec::new();
    let mut pending: Option<String> = None;
    let mut only_positionals = false;

    for word in rest {
        if pending.take().is_some() {
            flags.push(word.clone());
            continue;
        }
        if only_positionals || !word.starts_with('-') || word == "-" {
            positionals.push(word.clone());
            continue;
        }
        if word == "--" {
            only_positionals = true;
            continue;
        }

        flags.push(word.clone());
        if let Some(name) = option_name(&options, word) {
            let inline = word.starts_with("--") && word.contains('=');
            if !inline && options.get(&name).map(|o| o.takes_value()).unwrap_or(false) {
                pending = Some(name);
            }
        }
    }

    bind_flags(&mut command, tree, &flags);

    if let Some(long) = to_complete.strip_prefix("--") {
        if let Some((name, partial)) = long.split_once('=') {
            let completions = complete_option_value(tree, &mut command, &options, name, &positionals, partial).await;
            return prefix_values(completions, &format!("--{}=", name));
        }
    }

    if to_complete.starts_with('-') {
        let flags = options
            .iter()
            .map(|(name, opt)| {
                if opt.description.is_empty() {
                    format!("--{}", name)
                } else {
                    format!("--{}\t{}", name, opt.description)
                }
            })
            .filter(|candidate| candidate.starts_with(to_complete))
            .collect();
        return Completions::new(flags, CompletionDirective::NO_FILE_COMP);
    }

    match pending {
        Some(name) => complete_option_value(tree, &mut command, &options, &name, &positionals, to_complete).await,
        None => command.complete_argument(Some(tree), &positionals, to_complete).await,
    }
}

async fn complete_option_value(
    tree: &CommandTree,
    command: &mut Command,
    options: &Options,
    name: &str,
    positionals: &[String],
    to_complete: &str,
) -> Completions {
    if command.options.contains_key(name) {
        return command.complete_option(Some(tree), name, positionals, to_complete).await;
    }
    // global options carry no value sources
    match options.get(name) {
        Some(option) => Completions::hint(&option.description),
        None => Completions::error(),
    }
}

/// Bind already typed flags so templates can see them.
fn bind_flags(command: &mut Command, tree: &CommandTree, flags: &[String]) {
    if flags.is_empty() {
        return;
    }
    let argv = std::iter::once(command.name().to_string()).chain(flags.iter().cloned());
    match CliBuilder::leaf(command, tree.globals())
        .ignore_errors(true)
        .try_get_matches_from(argv)
    {
        Ok(matches) => command.options.parse(&matches),
        Err(e) => debug!("could not bind typed flags: {}", e),
    }
}

fn prefix_values(mut completions: Completions, prefix: &str) -> Completions {
    for value in completions.values.iter_mut() {
        if !value.starts_with(ACTIVE_HELP_MARKER) {
            value.insert_str(0, prefix);
        }
    }
    completions
}
