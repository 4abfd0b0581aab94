pub mod env_interpolation;

use std::fs;
use std::path::Path;

use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing::debug;

use crate::cli::{RunCmd, StepCliArgs};
use crate::types::StepRequest;
use env_interpolation::interpolate_yaml_content;

/// Builds the step for `run`: the step file, when given, supplies defaults and flags win over it.
pub fn load_step(run_cmd: &RunCmd) -> Result<StepRequest> {
    let from_file = match &run_cmd.step_file {
        Some(path) => read_step_file(path)?,
        None => StepCliArgs::default(),
    };
    let step = merge(from_file, run_cmd.step_args.clone())?;
    debug!(?step, "Loaded step");
    Ok(step)
}

/// Reads a YAML step file, expanding `${VAR}` and `${VAR:-default}` first.
pub fn read_step_file(path: &Path) -> Result<StepCliArgs> {
    let raw = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read step file {}", path.display()))?;
    let content = interpolate_yaml_content(&raw)
        .wrap_err_with(|| format!("Failed to interpolate step file {}", path.display()))?;
    serde_yaml::from_str(&content).wrap_err_with(|| format!("Failed to parse step file {}", path.display()))
}

fn merge(base: StepCliArgs, overrides: StepCliArgs) -> Result<StepRequest> {
    let command = overrides
        .command
        .or(base.command)
        .ok_or_else(|| eyre!("No command given: pass --command or set `command` in the step file"))?;

    Ok(StepRequest {
        command,
        endpoint: overrides.endpoint.or(base.endpoint),
        user: overrides.user.or(base.user),
        password: overrides.password.or(base.password),
        use_ssl: overrides.use_ssl.or(base.use_ssl).unwrap_or(false),
        bucket_name: overrides.bucket_name.or(base.bucket_name),
        object_name: overrides.object_name.or(base.object_name),
        object_content: overrides.object_content.or(base.object_content),
    })
}
