//! Logging setup.
//!
//! All diagnostics go through `tracing` and are written to stderr so that
//! stdout stays reserved for command output and completion candidates.

use tracing_subscriber::EnvFilter;

use crate::runtime::RuntimeConfig;

/// Default filter directive for the given runtime toggles.
pub fn default_directive(runtime: &RuntimeConfig) -> &'static str {
    if runtime.debug {
        "debug"
    } else if runtime.verbose {
        "info"
    } else if runtime.silent {
        "error"
    } else {
        "warn"
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the runtime toggles. Calling this more
/// than once keeps the first subscriber.
pub fn init(runtime: &RuntimeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(runtime)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(runtime.color_enabled)
        .with_target(runtime.debug)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::EnvNames;

    fn runtime(key: &'static str) -> RuntimeConfig {
        RuntimeConfig::from_lookup(EnvNames::default(), move |k| {
            (k == key).then(|| "1".to_string())
        })
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(&RuntimeConfig::default()), "warn");
        assert_eq!(default_directive(&runtime("DEBUG")), "debug");
        assert_eq!(default_directive(&runtime("VERBOSE")), "info");
        assert_eq!(default_directive(&runtime("SILENT")), "error");
    }

    #[test]
    fn test_init_twice() {
        init(&RuntimeConfig::default());
        init(&runtime("DEBUG"));
    }
}
