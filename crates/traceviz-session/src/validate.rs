use thiserror::Error;
use traceviz_model::{UnknownPreference, VisualizationPreference};

pub const INVALID_HOSTNAME_HINT: &str = "Please Enter a Valid Hostname";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("enter a hostname to trace")]
    EmptyTarget,
    #[error("choose a visualization type (map, graph or both)")]
    EmptyPreference,
    #[error(transparent)]
    UnknownPreference(#[from] UnknownPreference),
}

/// Gate for the submit action: both fields must be filled in.
pub fn validate_submission(
    target: &str,
    preference: &str,
) -> Result<(String, VisualizationPreference), SubmitError> {
    if target.trim().is_empty() {
        return Err(SubmitError::EmptyTarget);
    }
    if preference.trim().is_empty() {
        return Err(SubmitError::EmptyPreference);
    }
    let preference = preference.parse::<VisualizationPreference>()?;
    Ok((target.to_string(), preference))
}

/// Advisory well-formedness check. Never blocks a submission.
pub fn hostname_hint(target: &str) -> Option<&'static str> {
    if target.is_empty() {
        return None;
    }
    let tld_len = target
        .rsplit_once('.')
        .map(|(_, label)| label.chars().count())
        .unwrap_or(0);
    if tld_len < 2 {
        Some(INVALID_HOSTNAME_HINT)
    } else {
        None
    }
}
