//! Templates for dynamic scripts and sub-command arguments.
//!
//! Actions are written between `{{` and `}}`:
//!
//! ```text
//! {{ Arg "name" }}            resolved argument value
//! {{ Opt "name" }}            "--name value", or nothing for undeclared options
//! {{ .Args.name }}            resolved argument value
//! {{ .Opts.name }}            resolved option value
//! {{ Current }}               the value being completed or validated
//! {{ Arg "name" | toUpper }}  pipelines pass the left value as the last operand
//! ```
//!
//! String helpers: `toUpper`, `toLower`, `trim`, `replace`, `trimPrefix`, `trimSuffix`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CommandError, CommandResult};

/// Values available while rendering a template.
#[derive(Clone, Debug, Default)]
pub struct TemplateData {
    /// Stringified argument values by name.
    pub args: BTreeMap<String, String>,
    /// Stringified option values by name.
    pub opts: BTreeMap<String, String>,
    /// The value being completed or validated.
    pub current: String,
}

impl TemplateData {
    fn arg(&self, name: &str) -> String {
        self.args.get(name).cloned().unwrap_or_default()
    }

    fn opt(&self, name: &str) -> String {
        match self.opts.get(name) {
            Some(value) => format!("--{} {}", name, value),
            None => String::new(),
        }
    }
}

fn action_regex() -> &'static Regex {
    static ACTION: OnceLock<Regex> = OnceLock::new();
    ACTION.get_or_init(|| {
        Regex::new(r"(?s)\{\{(-\s)?(.*?)(\s-)?\}\}").expect("action regex is valid")
    })
}

/// Render `template` against `data`.
pub fn render(template: &str, data: &TemplateData) -> CommandResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    let mut trim_next = false;

    for caps in action_regex().captures_iter(template) {
        let whole = caps.get(0).expect("group 0 always matches");
        let mut text = &template[last..whole.start()];
        check_text(text)?;

        if trim_next {
            text = text.trim_start();
        }
        out.push_str(text);
        if caps.get(1).is_some() {
            let trimmed = out.trim_end().len();
            out.truncate(trimmed);
        }

        let expr = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        out.push_str(&eval_pipeline(expr, data)?);

        trim_next = caps.get(3).is_some();
        last = whole.end();
    }

    let mut rest = &template[last..];
    check_text(rest)?;
    if trim_next {
        rest = rest.trim_start();
    }
    out.push_str(rest);

    Ok(out)
}

fn check_text(text: &str) -> CommandResult<()> {
    if text.contains("{{") {
        return Err(CommandError::template("unclosed action"));
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Token {
    Literal(String),
    Word(String),
}

fn tokenize(expr: &str) -> CommandResult<Vec<Vec<Token>>> {
    let mut commands = vec![Vec::new()];
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '|' => commands.push(Vec::new()),
            '"' => {
                let mut literal = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                literal.push(match escaped {
                                    'n' => '\n',
                                    't' => '\t',
                                    other => other,
                                });
                            }
                        }
                        '"' => {
                            closed = true;
                            break;
                        }
                        other => literal.push(other),
                    }
                }
                if !closed {
                    return Err(CommandError::template("unterminated quoted string"));
                }
                push_token(&mut commands, Token::Literal(literal));
            }
            c => {
                let mut word = c.to_string();
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || next == '|' || next == '"' {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                push_token(&mut commands, Token::Word(word));
            }
        }
    }

    Ok(commands)
}

fn push_token(commands: &mut [Vec<Token>], token: Token) {
    if let Some(current) = commands.last_mut() {
        current.push(token);
    }
}

fn eval_pipeline(expr: &str, data: &TemplateData) -> CommandResult<String> {
    let commands = tokenize(expr)?;
    let mut piped: Option<String> = None;

    for command in commands {
        if command.is_empty() {
            return Err(CommandError::template(format!("missing command in \"{}\"", expr.trim())));
        }
        piped = Some(eval_command(command, piped, data)?);
    }

    Ok(piped.unwrap_or_default())
}

fn eval_command(tokens: Vec<Token>, piped: Option<String>, data: &TemplateData) -> CommandResult<String> {
    let mut tokens = tokens.into_iter();
    let Some(head) = tokens.next() else {
        return Err(CommandError::template("missing command"));
    };

    let name = match head {
        Token::Word(word) if !is_operand(&word) => word,
        operand => {
            if tokens.next().is_some() || piped.is_some() {
                return Err(CommandError::template("can't give arguments to a non-function"));
            }
            return eval_operand(operand, data);
        }
    };

    let mut operands = tokens
        .map(|token| eval_operand(token, data))
        .collect::<CommandResult<Vec<_>>>()?;
    operands.extend(piped);

    call(&name, operands, data)
}

fn is_operand(word: &str) -> bool {
    word.starts_with('.')
}

fn eval_operand(token: Token, data: &TemplateData) -> CommandResult<String> {
    match token {
        Token::Literal(value) => Ok(value),
        Token::Word(word) => match word.as_str() {
            "Current" => Ok(data.current.clone()),
            field if field.starts_with(".Args.") => Ok(data.arg(&field[".Args.".len()..])),
            field if field.starts_with(".Opts.") => Ok(data
                .opts
                .get(&field[".Opts.".len()..])
                .cloned()
                .unwrap_or_default()),
            field if field.starts_with('.') => Err(CommandError::template(format!(
                "can't evaluate field {}",
                field
            ))),
            name => Err(CommandError::template(format!(
                "function \"{}\" not defined",
                name
            ))),
        },
    }
}

fn call(name: &str, args: Vec<String>, data: &TemplateData) -> CommandResult<String> {
    let arity = |n: usize| -> CommandResult<()> {
        if args.len() != n {
            return Err(CommandError::template(format!(
                "wrong number of args for {}: want {} got {}",
                name,
                n,
                args.len()
            )));
        }
        Ok(())
    };

    match name {
        "Current" => {
            arity(0)?;
            Ok(data.current.clone())
        }
        "Arg" => {
            arity(1)?;
            Ok(data.arg(&args[0]))
        }
        "Opt" => {
            arity(1)?;
            Ok(data.opt(&args[0]))
        }
        "toUpper" => {
            arity(1)?;
            Ok(args[0].to_uppercase())
        }
        "toLower" => {
            arity(1)?;
            Ok(args[0].to_lowercase())
        }
        "trim" => {
            arity(1)?;
            Ok(args[0].trim().to_string())
        }
        "replace" => {
            arity(3)?;
            Ok(args[0].replace(&args[1], &args[2]))
        }
        "trimPrefix" => {
            arity(2)?;
            Ok(args[0]
                .strip_prefix(args[1].as_str())
                .unwrap_or(&args[0])
                .to_string())
        }
        "trimSuffix" => {
            arity(2)?;
            Ok(args[0]
                .strip_suffix(args[1].as_str())
                .unwrap_or(&args[0])
                .to_string())
        }
        other => Err(CommandError::template(format!(
            "function \"{}\" not defined",
            other
        ))),
    }
}
