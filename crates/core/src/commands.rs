// Command builders: one argv recipe per tool kind
//
// The script is always a single argv token; nothing here goes through a shell.

use crate::config::InterpreterConfig;
use crate::error::ValidationError;
use crate::types::{CommandSpec, ToolKind};
use serde_json::{Map, Value};

const CODE_FLAG: &str = "-code";
const VERSION_FLAG: &str = "-version";
const ENGINE_VERSION_EXPR: &str = "$Version";
const LICENSE_TYPE_EXPR: &str = "$LicenseType";

/// Build the invocation for `kind`, validating its arguments first
pub fn build(
    kind: ToolKind,
    arguments: &Map<String, Value>,
    config: &InterpreterConfig,
) -> Result<CommandSpec, ValidationError> {
    match kind {
        ToolKind::Evaluate => evaluate(config, script_argument(arguments)?),
        ToolKind::VersionInterpreter => Ok(version_interpreter(config)),
        ToolKind::VersionEngine => Ok(version_engine(config)),
        ToolKind::LicenseType => Ok(license_type(config)),
    }
}

pub fn evaluate(config: &InterpreterConfig, script: &str) -> Result<CommandSpec, ValidationError> {
    if script.trim().is_empty() {
        return Err(ValidationError::Empty("script"));
    }
    Ok(CommandSpec {
        executable: config.executable.clone(),
        args: vec![CODE_FLAG.to_string(), script.to_string()],
        timeout: config.evaluate_timeout(),
    })
}

pub fn version_interpreter(config: &InterpreterConfig) -> CommandSpec {
    metadata_query(config, vec![VERSION_FLAG.to_string()])
}

pub fn version_engine(config: &InterpreterConfig) -> CommandSpec {
    metadata_query(
        config,
        vec![CODE_FLAG.to_string(), ENGINE_VERSION_EXPR.to_string()],
    )
}

pub fn license_type(config: &InterpreterConfig) -> CommandSpec {
    metadata_query(
        config,
        vec![CODE_FLAG.to_string(), LICENSE_TYPE_EXPR.to_string()],
    )
}

fn metadata_query(config: &InterpreterConfig, args: Vec<String>) -> CommandSpec {
    CommandSpec {
        executable: config.executable.clone(),
        args,
        timeout: config.metadata_timeout(),
    }
}

fn script_argument(arguments: &Map<String, Value>) -> Result<&str, ValidationError> {
    match arguments.get("script") {
        None | Some(Value::Null) => Err(ValidationError::MissingArgument("script")),
        Some(Value::String(script)) => Ok(script),
        Some(_) => Err(ValidationError::NotAString("script")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_evaluate_passes_script_as_single_token() {
        let config = InterpreterConfig::default();
        let script = "Print[\"a b\"]; x = 1; $(rm -rf /) | `id` && echo 'done'";
        let spec = build(ToolKind::Evaluate, &args(json!({ "script": script })), &config).unwrap();

        assert_eq!(spec.executable, config.executable);
        assert_eq!(spec.args, vec!["-code".to_string(), script.to_string()]);
        assert_eq!(spec.timeout, config.evaluate_timeout());
    }

    #[test]
    fn test_evaluate_keeps_script_verbatim() {
        let config = InterpreterConfig::default();
        let spec = evaluate(&config, "  Integrate[x^2, x]\n").unwrap();
        assert_eq!(spec.args[1], "  Integrate[x^2, x]\n");
    }

    #[test]
    fn test_evaluate_rejects_bad_script() {
        let config = InterpreterConfig::default();

        assert_eq!(
            build(ToolKind::Evaluate, &Map::new(), &config),
            Err(ValidationError::MissingArgument("script"))
        );
        assert_eq!(
            build(ToolKind::Evaluate, &args(json!({ "script": null })), &config),
            Err(ValidationError::MissingArgument("script"))
        );
        assert_eq!(
            build(ToolKind::Evaluate, &args(json!({ "script": "" })), &config),
            Err(ValidationError::Empty("script"))
        );
        assert_eq!(
            build(ToolKind::Evaluate, &args(json!({ "script": "  \n\t" })), &config),
            Err(ValidationError::Empty("script"))
        );
        assert_eq!(
            build(ToolKind::Evaluate, &args(json!({ "script": 42 })), &config),
            Err(ValidationError::NotAString("script"))
        );
    }

    #[test]
    fn test_metadata_queries() {
        let config = InterpreterConfig {
            executable: "/usr/local/bin/wolframscript".into(),
            metadata_timeout_secs: 3,
            ..Default::default()
        };

        let spec = build(ToolKind::VersionInterpreter, &Map::new(), &config).unwrap();
        assert_eq!(spec.args, vec!["-version"]);
        assert_eq!(spec.timeout, Duration::from_secs(3));

        let spec = build(ToolKind::VersionEngine, &Map::new(), &config).unwrap();
        assert_eq!(spec.args, vec!["-code", "$Version"]);

        let spec = build(ToolKind::LicenseType, &Map::new(), &config).unwrap();
        assert_eq!(spec.args, vec!["-code", "$LicenseType"]);
        assert_eq!(spec.executable, config.executable);
    }

    #[test]
    fn test_metadata_queries_ignore_extra_arguments() {
        let config = InterpreterConfig::default();
        let spec = build(
            ToolKind::LicenseType,
            &args(json!({ "script": "Quit[]" })),
            &config,
        )
        .unwrap();
        assert_eq!(spec, license_type(&config));
    }
}
