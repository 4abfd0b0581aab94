use color_eyre::eyre::{bail, Result};
use regex::Regex;

const PLACEHOLDER_PATTERN: &str = r"\$\{([^}:]+)(?::-(.*?))?\}";

/// Interpolate environment variables in a string
/// Supports ${VAR} and ${VAR:-default} syntax
pub fn interpolate_env_vars(input: &str) -> Result<String> {
    let pattern = Regex::new(PLACEHOLDER_PATTERN)?;
    let mut missing_vars = Vec::new();

    let result = pattern.replace_all(input, |caps: &regex::Captures<'_>| {
        let var_name = &caps[1];
        match (std::env::var(var_name), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                missing_vars.push(var_name.to_string());
                caps[0].to_string()
            }
        }
    });

    if !missing_vars.is_empty() {
        bail!("Missing required environment variables: {}", missing_vars.join(", "));
    }

    Ok(result.into_owned())
}

/// Interpolate environment variables in YAML content, leaving comment lines untouched
pub fn interpolate_yaml_content(yaml_content: &str) -> Result<String> {
    let lines = yaml_content
        .lines()
        .map(|line| if line.trim().starts_with('#') { Ok(line.to_string()) } else { interpolate_env_vars(line) })
        .collect::<Result<Vec<_>>>()?;

    Ok(lines.join("\n"))
}
