//! Runtime toggles read from the process environment.
//!
//! Applications may rename every variable through [`EnvNames`] before
//! resolving a [`RuntimeConfig`].

use std::collections::HashMap;
use std::env;

const FALSE_ISH: &[&str] = &[
    "", "0", "no", "false", "disable", "disabled", "off", "never",
];

const TRUE_ISH: &[&str] = &["1", "yes", "true", "enable", "enabled", "on", "always"];

fn is_false_ish(value: &str) -> bool {
    FALSE_ISH.contains(&value)
}

fn is_true_ish(value: &str) -> bool {
    TRUE_ISH.contains(&value)
}

/// Names of the environment variables that drive runtime behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvNames {
    /// Render help without styling.
    pub help_unstyled: String,
    /// Theme used for help rendering.
    pub help_style: String,
    /// Verbose logging.
    pub verbose: String,
    /// Only log errors.
    pub silent: String,
    /// Disable colors.
    pub no_color: String,
    /// Force colors.
    pub force_color: String,
    /// Skip argument and option validation.
    pub validation_disabled: String,
    /// Debug logging.
    pub debug: String,
}

impl Default for EnvNames {
    fn default() -> Self {
        Self {
            help_unstyled: "HELP_STYLE_PLAIN".to_string(),
            help_style: "HELP_STYLE".to_string(),
            verbose: "VERBOSE".to_string(),
            silent: "SILENT".to_string(),
            no_color: "NO_COLOR".to_string(),
            force_color: "COLOR".to_string(),
            validation_disabled: "SKIP_VALIDATION".to_string(),
            debug: "DEBUG".to_string(),
        }
    }
}

impl EnvNames {
    /// Prefix every variable name, e.g. `MY_APP_` turns `VERBOSE` into `MY_APP_VERBOSE`.
    pub fn prefixed(prefix: &str) -> Self {
        let base = Self::default();
        let p = |name: String| format!("{}{}", prefix, name);
        Self {
            help_unstyled: p(base.help_unstyled),
            help_style: p(base.help_style),
            verbose: p(base.verbose),
            silent: p(base.silent),
            no_color: p(base.no_color),
            force_color: p(base.force_color),
            validation_disabled: p(base.validation_disabled),
            debug: p(base.debug),
        }
    }
}

/// Resolved runtime toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    names: EnvNames,
    /// Debug logging requested.
    pub debug: bool,
    /// Verbose logging requested.
    pub verbose: bool,
    /// Only errors should be logged.
    pub silent: bool,
    /// Arguments and options are validated before actions run.
    pub validation_enabled: bool,
    /// Colors may be printed.
    pub color_enabled: bool,
    /// Colors were explicitly forced on.
    pub force_color: bool,
    /// Help should be rendered without styling.
    pub unstyled_help: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_lookup(EnvNames::default(), |_| None)
    }
}

impl RuntimeConfig {
    /// Resolve toggles from the process environment using the default names.
    pub fn from_env() -> Self {
        Self::from_env_with(EnvNames::default())
    }

    /// Resolve toggles from the process environment using custom names.
    pub fn from_env_with(names: EnvNames) -> Self {
        Self::from_lookup(names, |key| env::var(key).ok())
    }

    /// Resolve toggles through an arbitrary lookup function.
    pub fn from_lookup<F>(names: EnvNames, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).unwrap_or_default();

        let unstyled_help = is_true_ish(&get(&names.help_unstyled));
        let color_enabled = is_false_ish(&get(&names.no_color)) && !unstyled_help;

        Self {
            debug: is_true_ish(&get(&names.debug)),
            verbose: is_true_ish(&get(&names.verbose)),
            silent: is_true_ish(&get(&names.silent)),
            validation_enabled: is_false_ish(&get(&names.validation_disabled)),
            force_color: color_enabled && is_true_ish(&get(&names.force_color)),
            color_enabled,
            unstyled_help,
            names,
        }
    }

    /// The variable names these toggles were read from.
    pub fn names(&self) -> &EnvNames {
        &self.names
    }

    /// Normalized environment handed down to subprocesses.
    pub fn environment_map(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        let truthy = true.to_string();

        if !self.color_enabled {
            env.insert(self.names.no_color.clone(), truthy.clone());
        } else if self.force_color {
            env.insert(self.names.force_color.clone(), "always".to_string());
        }

        if self.debug {
            env.insert(self.names.debug.clone(), truthy.clone());
        }

        if self.verbose {
            env.insert(self.names.verbose.clone(), truthy);
        } else if self.silent {
            env.insert(self.names.silent.clone(), true.to_string());
        }

        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(EnvNames::default(), move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let runtime = config(&[]);
        assert!(runtime.validation_enabled);
        assert!(runtime.color_enabled);
        assert!(!runtime.verbose);
        assert!(!runtime.debug);
        assert!(!runtime.silent);
    }

    #[test]
    fn test_skip_validation() {
        assert!(!config(&[("SKIP_VALIDATION", "1")]).validation_enabled);
        assert!(!config(&[("SKIP_VALIDATION", "always")]).validation_enabled);
        assert!(config(&[("SKIP_VALIDATION", "off")]).validation_enabled);
        // anything neither truthy nor falsy still disables validation
        assert!(!config(&[("SKIP_VALIDATION", "maybe")]).validation_enabled);
    }

    #[test]
    fn test_color_rules() {
        assert!(!config(&[("NO_COLOR", "yes")]).color_enabled);
        assert!(!config(&[("HELP_STYLE_PLAIN", "true")]).color_enabled);
        assert!(config(&[("COLOR", "always")]).force_color);
        assert!(!config(&[("COLOR", "always"), ("NO_COLOR", "1")]).force_color);
    }

    #[test]
    fn test_environment_map() {
        let env = config(&[("VERBOSE", "on"), ("SILENT", "on"), ("NO_COLOR", "1")])
            .environment_map();
        assert_eq!(env.get("VERBOSE"), Some(&"true".to_string()));
        assert_eq!(env.get("NO_COLOR"), Some(&"true".to_string()));
        assert!(!env.contains_key("SILENT"));

        let env = config(&[("SILENT", "yes"), ("COLOR", "on")]).environment_map();
        assert_eq!(env.get("SILENT"), Some(&"true".to_string()));
        assert_eq!(env.get("COLOR"), Some(&"always".to_string()));
    }

    #[test]
    fn test_prefixed_names() {
        let names = EnvNames::prefixed("MY_APP_");
        assert_eq!(names.verbose, "MY_APP_VERBOSE");
        assert_eq!(names.validation_disabled, "MY_APP_SKIP_VALIDATION");

        let runtime = RuntimeConfig::from_lookup(names, |key| {
            (key == "MY_APP_DEBUG").then(|| "yes".to_string())
        });
        assert!(runtime.debug);
    }
}
