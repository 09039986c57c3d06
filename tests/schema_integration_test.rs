//! Schema integration tests
//!
//! These tests load schema files from disk and run whole invocations through
//! an application, the way a binary built on the crate would.

use cmdspec::cli::{Application, CliConfig, Outcome};
use cmdspec::command::{register_value_source, Resolution};
use cmdspec::completion::CompletionDirective;
use cmdspec::error::{status, CommandResult};
use cmdspec::runtime::RuntimeConfig;
use tempfile::TempDir;

#[cfg(feature = "yaml")]
const OPS_YAML: &str = r#"
app:
  name: ops
  version: 0.3.0
  summary: Operations toolbox
commands:
  - path: [env, list]
    summary: List environments
    exec: "echo dev; echo staging; echo prod"
  - path: [deploy]
    summary: Deploy services
    handler: deploy
    arguments:
      - name: environment
        description: target environment
        required: true
        values:
          command:
            path: [env, list]
      - name: services
        variadic: true
        values:
          script: "echo api; echo web; echo worker"
    options:
      replicas:
        type: int
        default: 1
        short-name: r
      dry-run:
        type: bool
"#;

#[cfg(feature = "yaml")]
fn ops(dir: &TempDir) -> Application {
    let path = dir.path().join("ops.yaml");
    std::fs::write(&path, OPS_YAML).unwrap();

    Application::from_file(&path)
        .unwrap()
        .with_runtime(RuntimeConfig::default())
        .register_handler("deploy", |cmd, out| {
            let known = cmd.arguments.all_known_str();
            writeln!(
                out,
                "deploying {} to {} x{}{}",
                known["services"],
                known["environment"],
                cmd.options["replicas"].value_string(),
                if cmd.options["dry-run"].is_known() { " (dry run)" } else { "" }
            )?;
            Ok(())
        })
}

async fn run(app: &Application, args: &[&str]) -> (CommandResult<Outcome>, String) {
    let mut out = Vec::new();
    let result = app.execute_from(args.iter().copied(), &mut out).await;
    (result, String::from_utf8(out).unwrap())
}

/// Test a full invocation validated against a sub-command and a script
#[cfg(feature = "yaml")]
#[tokio::test]
async fn test_deploy_from_yaml_schema() {
    let dir = TempDir::new().unwrap();
    let app = ops(&dir);

    let (result, out) = run(&app, &["ops", "deploy", "prod", "api", "web", "-r", "3", "--dry-run"]).await;
    assert_eq!(result.unwrap(), Outcome::Ran);
    assert_eq!(out, "deploying api web to prod x3 (dry run)\n");
}

/// Test that values outside the command-provided list are rejected
#[cfg(feature = "yaml")]
#[tokio::test]
async fn test_deploy_rejects_unknown_environment() {
    let dir = TempDir::new().unwrap();
    let app = ops(&dir);

    let (result, out) = run(&app, &["ops", "deploy", "qa"]).await;
    let err = result.unwrap_err();
    assert_eq!(
        err.to_string(),
        "qa is not a valid value for argument <environment>. Valid options are: dev, staging, prod"
    );
    assert_eq!(err.exit_code(), status::USAGE);
    assert!(out.is_empty());

    let (result, _) = run(&app, &["ops", "deploy", "dev", "api", "database"]).await;
    assert!(result
        .unwrap_err()
        .to_string()
        .starts_with("database is not a valid value for argument <services>"));

    let (result, _) = run(&app, &["ops", "deploy"]).await;
    assert_eq!(result.unwrap_err().to_string(), "Missing argument for ENVIRONMENT");
}

/// Test shell completion through the hidden completion command
#[cfg(feature = "yaml")]
#[tokio::test]
async fn test_completion_protocol() {
    let dir = TempDir::new().unwrap();
    let app = ops(&dir);

    let (result, out) = run(&app, &["ops", "__complete", "deploy", ""]).await;
    assert_eq!(result.unwrap(), Outcome::Completed);
    assert_eq!(out, "dev\nstaging\nprod\n_activeHelp_ target environment\n:0\n");

    let (_, out) = run(&app, &["ops", "__complete", "deploy", "prod", "api", "w"]).await;
    assert_eq!(out, "web\nworker\n_activeHelp_ \n:0\n");

    let (_, out) = run(&app, &["ops", "__complete", "e"]).await;
    assert_eq!(out, format!("env\n:{}\n", CompletionDirective::NO_FILE_COMP.bits()));

    let (_, out) = run(&app, &["ops", "__complete", "deploy", "--replicas", ""]).await;
    assert_eq!(out, "_activeHelp_ \n:1\n");
}

/// Test exec templates running as actions
#[cfg(feature = "yaml")]
#[tokio::test]
async fn test_exec_command() {
    let dir = TempDir::new().unwrap();
    let app = ops(&dir);

    let (result, out) = run(&app, &["ops", "env", "list"]).await;
    assert_eq!(result.unwrap(), Outcome::Ran);
    assert_eq!(out, "dev\nstaging\nprod\n");

    let (result, _) = run(&app, &["ops", "env"]).await;
    assert_eq!(result.unwrap_err().exit_code(), status::NOT_FOUND);
}

/// Test a schema using a registered value source and an exec template
#[tokio::test]
async fn test_registered_value_source_from_toml() {
    register_value_source("regions", |_, _, custom| {
        Ok(Resolution::new(
            custom.split(',').map(str::to_string).collect(),
            CompletionDirective::DEFAULT,
        ))
    });

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cloud.toml");
    std::fs::write(
        &path,
        r#"
[app]
name = "cloud"
version = "1.0.0"

[[commands]]
path = ["region", "use"]
exec = "echo using {{ Arg \"region\" | toUpper }}"

[[commands.arguments]]
name = "region"
required = true
values = { regions = "eu,us" }
"#,
    )
    .unwrap();

    let config = CliConfig::from_file(&path).unwrap();
    let app = Application::from_config(config).with_runtime(RuntimeConfig::default());

    let (result, out) = run(&app, &["cloud", "region", "use", "eu"]).await;
    assert_eq!(result.unwrap(), Outcome::Ran);
    assert_eq!(out, "using EU\n");

    let (result, _) = run(&app, &["cloud", "region", "use", "mars"]).await;
    assert_eq!(
        result.unwrap_err().to_string(),
        "mars is not a valid value for argument <region>. Valid options are: eu, us"
    );
}

/// Test that broken schemas fail loudly
#[test]
fn test_invalid_schema() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(
        &path,
        r#"{"app": {"name": "x", "version": "1"}, "commands": [{"path": ["a"], "arguments": [{"name": "n", "values": {"nothing": true}}]}]}"#,
    )
    .unwrap();

    let err = match Application::from_file(&path) {
        Ok(_) => panic!("schema with an unknown value source loaded"),
        Err(e) => e,
    };
    assert_eq!(err.exit_code(), status::CONFIG_ERROR);
    assert!(err.to_string().contains("unknown value source key: nothing"));

    std::fs::write(
        &path,
        r#"{"app": {"name": "x", "version": "1"}, "commands": [{"path": ["a"], "arguments": [{"name": "rest", "variadic": true}, {"name": "last"}]}]}"#,
    )
    .unwrap();
    let app = Application::from_file(&path).unwrap();
    let err = app.tree().unwrap_err();
    assert_eq!(err.exit_code(), status::PROGRAMMER_ERROR);
}
