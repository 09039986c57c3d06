//! Completion directives and candidate lists.
//!
//! Directive numbering matches the dynamic completion protocol used by the
//! generated shell scripts, so the value can be printed as-is after `:`.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Prefix that marks a candidate as a hint to display rather than a value to insert.
pub const ACTIVE_HELP_MARKER: &str = "_activeHelp_ ";

/// How the invoking shell should interpret completion candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CompletionDirective(u32);

impl CompletionDirective {
    /// Plain list of candidates; the shell may fall back to file completion.
    pub const DEFAULT: Self = Self(0);
    /// Something went wrong; offer nothing.
    pub const ERROR: Self = Self(1);
    /// Do not add a trailing space after the accepted candidate.
    pub const NO_SPACE: Self = Self(1 << 1);
    /// Do not fall back to file completion.
    pub const NO_FILE_COMP: Self = Self(1 << 2);
    /// Candidates are file extensions to filter by.
    pub const FILTER_FILE_EXT: Self = Self(1 << 3);
    /// Complete directories only; a single candidate is the base directory.
    pub const FILTER_DIRS: Self = Self(1 << 4);

    /// Raw protocol value.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether candidates are interpreted natively by the shell and must not be
    /// prefix-filtered here.
    pub fn is_shell_filter(self) -> bool {
        self.contains(Self::FILTER_FILE_EXT) || self.contains(Self::FILTER_DIRS)
    }
}

impl BitOr for CompletionDirective {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CompletionDirective {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for CompletionDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "ShellCompDirectiveDefault");
        }

        let names = [
            (Self::ERROR, "ShellCompDirectiveError"),
            (Self::NO_SPACE, "ShellCompDirectiveNoSpace"),
            (Self::NO_FILE_COMP, "ShellCompDirectiveNoFileComp"),
            (Self::FILTER_FILE_EXT, "ShellCompDirectiveFilterFileExt"),
            (Self::FILTER_DIRS, "ShellCompDirectiveFilterDirs"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", set.join(", "))
    }
}

/// A hint line shown by the shell instead of a candidate.
pub fn active_help(message: &str) -> String {
    format!("{}{}", ACTIVE_HELP_MARKER, message)
}

/// Keep only the candidates starting with `prefix`.
pub fn filter_prefix(values: Vec<String>, prefix: &str) -> Vec<String> {
    if prefix.is_empty() {
        return values;
    }

    values
        .into_iter()
        .filter(|value| value.starts_with(prefix))
        .collect()
}

/// Candidates offered for one completion request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completions {
    /// Candidate values, possibly followed by active help lines.
    pub values: Vec<String>,
    /// How the shell should treat `values`.
    pub directive: CompletionDirective,
}

impl Completions {
    /// Build a completion result.
    pub fn new(values: Vec<String>, directive: CompletionDirective) -> Self {
        Self { values, directive }
    }

    /// Nothing to offer; the shell should not fall back to anything.
    pub fn error() -> Self {
        Self::new(Vec::new(), CompletionDirective::ERROR)
    }

    /// Only a hint, no candidates.
    pub fn hint(message: &str) -> Self {
        Self::new(vec![active_help(message)], CompletionDirective::ERROR)
    }

    /// Write the protocol representation: one candidate per line, then `:<directive>`.
    pub fn write_to(&self, out: &mut dyn std::io::Write) -> std::io::Result<()> {
        for value in &self.values {
            writeln!(out, "{}", value)?;
        }
        writeln!(out, ":{}", self.directive.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_bits() {
        assert_eq!(CompletionDirective::DEFAULT.bits(), 0);
        assert_eq!(CompletionDirective::ERROR.bits(), 1);
        assert_eq!(CompletionDirective::NO_SPACE.bits(), 2);
        assert_eq!(CompletionDirective::NO_FILE_COMP.bits(), 4);
        assert_eq!(CompletionDirective::FILTER_FILE_EXT.bits(), 8);
        assert_eq!(CompletionDirective::FILTER_DIRS.bits(), 16);
    }

    #[test]
    fn test_directive_combination() {
        let mut directive = CompletionDirective::FILTER_DIRS;
        directive |= CompletionDirective::NO_SPACE;
        assert!(directive.contains(CompletionDirective::NO_SPACE));
        assert!(directive.is_shell_filter());
        assert!(!CompletionDirective::DEFAULT.is_shell_filter());
        assert_eq!(directive.bits(), 18);
        assert_eq!(
            directive.to_string(),
            "ShellCompDirectiveNoSpace, ShellCompDirectiveFilterDirs"
        );
    }

    #[test]
    fn test_filter_prefix() {
        let values = vec!["au", "to", "com", "plete", "auto"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        assert_eq!(filter_prefix(values.clone(), "a"), vec!["au", "auto"]);
        assert_eq!(filter_prefix(values.clone(), ""), values);
        assert!(filter_prefix(values, "z").is_empty());
    }

    #[test]
    fn test_hint_and_write() {
        let hint = Completions::hint("");
        assert_eq!(hint.values, vec!["_activeHelp_ ".to_string()]);
        assert_eq!(hint.directive, CompletionDirective::ERROR);

        let mut out = Vec::new();
        Completions::new(vec!["a".into(), "b".into()], CompletionDirective::NO_SPACE)
            .write_to(&mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\nb\n:2\n");
    }
}
