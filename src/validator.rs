use crate::error::ValidationError;
use crate::payload::Payload;
use crate::schema::{Descriptor, Operation, Stage};

/// Check a submission against the operation schedule.
///
/// Returns the descriptor the submission resolved to, so callers do not have
/// to look it up a second time.
///
/// # Rules
/// * The operation name must match exactly.
/// * Staged operations need a `start` or `end` stage (any case); flat
///   operations must not carry one.
/// * A field is missing when it is absent, `null`, `""`, `false` or `0`.
///   Fields with a conditional requirement are only checked while their
///   condition holds (`rework` while `qcResult` is `"Rework"`).
pub fn validate(
    operation: &str,
    stage: Option<&str>,
    payload: &Payload,
) -> Result<&'static Descriptor, ValidationError> {
    let op = Operation::from_name(operation)
        .ok_or_else(|| ValidationError::UnknownOperation(operation.to_string()))?;

    let invalid_stage = || ValidationError::InvalidStage {
        operation: operation.to_string(),
        stage: stage.map(str::to_lowercase),
    };

    let stage = match stage {
        Some(text) => Some(Stage::parse(text).ok_or_else(invalid_stage)?),
        None => None,
    };
    let descriptor = op.descriptor(stage).ok_or_else(invalid_stage)?;

    let missing: Vec<String> = descriptor
        .fields
        .iter()
        .filter(|field| field.requirement.is_active(payload))
        .filter(|field| !payload.is_truthy(field.key))
        .map(|field| field.key.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    Ok(descriptor)
}
