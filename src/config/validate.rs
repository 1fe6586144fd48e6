// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::ConfigError;

impl TryFrom<RawGraphFile> for GraphFile {
    type Error = ConfigError;

    fn try_from(raw: RawGraphFile) -> Result<Self, Self::Error> {
        validate_raw_graph(&raw)?;
        let timeout = raw.run.timeout.as_deref().map(parse_timeout).transpose()?;
        Ok(GraphFile::new_unchecked(raw.run, raw.action, timeout))
    }
}

fn parse_timeout(s: &str) -> Result<std::time::Duration, ConfigError> {
    parse_duration(s)
        .map_err(|e| ConfigError::Invalid(format!("invalid [run].timeout '{s}': {e}")))
}

fn validate_raw_graph(raw: &RawGraphFile) -> Result<(), ConfigError> {
    ensure_has_actions(raw)?;
    validate_commands(raw)?;
    validate_action_dependencies(raw)?;
    Ok(())
}

fn ensure_has_actions(raw: &RawGraphFile) -> Result<(), ConfigError> {
    if raw.action.is_empty() {
        return Err(ConfigError::Invalid(
            "graph file must contain at least one [action.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_commands(raw: &RawGraphFile) -> Result<(), ConfigError> {
    for (name, action) in raw.action.iter() {
        if action.cmd.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "action '{name}' has an empty `cmd`"
            )));
        }
    }
    Ok(())
}

fn validate_action_dependencies(raw: &RawGraphFile) -> Result<(), ConfigError> {
    for (name, action) in raw.action.iter() {
        for dep in action.after.iter() {
            if dep == name {
                return Err(ConfigError::Invalid(format!(
                    "action '{name}' cannot depend on itself in `after`"
                )));
            }
            if !raw.action.contains_key(dep) {
                return Err(ConfigError::Invalid(format!(
                    "action '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}
