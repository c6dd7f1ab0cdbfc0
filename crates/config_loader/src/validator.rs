//! Blueprint validation
//!
//! Two passes:
//! - field ranges declared on the blueprint types (`validator` derive)
//! - cross-field rules that a single attribute cannot express:
//!   - camera device ids are unique
//!   - every device kind has the inputs it needs (paths, commands)
//!   - side-camera depth mode has a side camera
//!   - the pitch grid stays inside the MIDI note range
//!   - shutdown bounds are non-zero

use std::collections::HashSet;

use contracts::{
    CameraConfig, CameraKind, ContractError, DepthMode, DetectorConfig, DetectorKind,
    SessionBlueprint,
};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a parsed blueprint.
///
/// Returns the first error encountered.
pub fn validate(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    if let Err(errors) = blueprint.validate() {
        return Err(first_field_error(&errors));
    }
    validate_camera_ids(blueprint)?;
    for camera in blueprint.all_cameras() {
        validate_camera_source(camera)?;
    }
    validate_detector("detectors.hand", &blueprint.detectors.hand)?;
    validate_detector("detectors.face", &blueprint.detectors.face)?;
    validate_depth_mode(blueprint)?;
    validate_pitch_grid(blueprint)?;
    validate_shutdown_bounds(blueprint)?;
    Ok(())
}

/// Convert derive-level errors into the dotted-path form used everywhere else
fn first_field_error(errors: &ValidationErrors) -> ContractError {
    let mut flat = Vec::new();
    flatten(errors, String::new(), &mut flat);
    flat.sort();
    match flat.into_iter().next() {
        Some((field, message)) => ContractError::config_validation(field, message),
        None => ContractError::config_validation("<root>", "invalid configuration"),
    }
}

fn flatten(errors: &ValidationErrors, prefix: String, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = match &error.message {
                        Some(message) => message.to_string(),
                        None => describe(error),
                    };
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten(inner, path, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    flatten(inner, format!("{path}[{idx}]"), out);
                }
            }
        }
    }
}

fn describe(error: &validator::ValidationError) -> String {
    let mut params: Vec<String> = error
        .params
        .iter()
        .filter(|(key, _)| *key != "value")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    params.sort();
    let value = error
        .params
        .get("value")
        .map(|v| format!(", got {v}"))
        .unwrap_or_default();
    format!("{} check failed ({}){value}", error.code, params.join(", "))
}

fn validate_camera_ids(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for camera in blueprint.all_cameras() {
        if !seen.insert(camera.device_id.as_str()) {
            return Err(ContractError::config_validation(
                format!("cameras[device_id={}]", camera.device_id),
                "duplicate device_id",
            ));
        }
    }
    Ok(())
}

fn validate_camera_source(camera: &CameraConfig) -> Result<(), ContractError> {
    if camera.kind == CameraKind::ImageSequence && camera.path.is_none() {
        return Err(ContractError::config_validation(
            format!("cameras[{}].path", camera.device_id),
            "image_sequence camera requires a path",
        ));
    }
    if camera.kind == CameraKind::Device && !camera.index.is_some_and(|i| i >= 0) {
        return Err(ContractError::config_validation(
            format!("cameras[{}].index", camera.device_id),
            "device camera requires a non-negative index",
        ));
    }
    if camera.frame_limit == Some(0) {
        return Err(ContractError::config_validation(
            format!("cameras[{}].frame_limit", camera.device_id),
            "frame_limit must be > 0 when set",
        ));
    }
    Ok(())
}

fn validate_detector(field: &str, detector: &DetectorConfig) -> Result<(), ContractError> {
    match detector.kind {
        DetectorKind::Scripted if detector.script.is_none() => {
            Err(ContractError::config_validation(
                format!("{field}.script"),
                "scripted detector requires a script",
            ))
        }
        DetectorKind::Process
            if detector
                .command
                .as_deref()
                .map_or(true, |cmd| cmd.trim().is_empty()) =>
        {
            Err(ContractError::config_validation(
                format!("{field}.command"),
                "process detector requires a command",
            ))
        }
        _ => Ok(()),
    }
}

fn validate_depth_mode(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    if blueprint.gesture.depth_mode == DepthMode::SideCamera && blueprint.cameras.side.is_none() {
        return Err(ContractError::config_validation(
            "gesture.depth_mode",
            "side_camera depth mode requires [cameras.side]",
        ));
    }
    Ok(())
}

/// The highest grid cell plus the widest chord interval must be a valid MIDI note
fn validate_pitch_grid(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    let sound = &blueprint.sound;
    if let Some(step) = sound.scale.iter().find(|step| **step >= 12) {
        return Err(ContractError::config_validation(
            "sound.scale",
            format!("scale steps must be < 12 semitones, got {step}"),
        ));
    }

    let scale_len = sound.scale.len() as u32;
    let top_col = sound.columns.saturating_sub(1);
    let top_row = sound.rows.saturating_sub(1);
    let max_step = sound.scale.iter().copied().max().unwrap_or(0) as u32;
    let max_chord = sound.chord.iter().copied().max().unwrap_or(0) as u32;
    let highest = sound.base_note as u32
        + 12 * top_row
        + 12 * (top_col / scale_len)
        + max_step
        + max_chord;

    if highest > 127 {
        return Err(ContractError::config_validation(
            "sound.base_note / sound.rows / sound.columns",
            format!("highest grid pitch {highest} exceeds MIDI range (127)"),
        ));
    }
    Ok(())
}

fn validate_shutdown_bounds(blueprint: &SessionBlueprint) -> Result<(), ContractError> {
    if blueprint.pipeline.join_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "pipeline.join_timeout_ms",
            "join_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate(&SessionBlueprint::default()).is_ok());
    }

    #[test]
    fn test_range_error_uses_dotted_path() {
        let mut bp = SessionBlueprint::default();
        bp.sound.velocity = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("sound.velocity"), "got: {err}");
    }

    #[test]
    fn test_duplicate_device_id() {
        let mut bp = SessionBlueprint::default();
        bp.cameras.face.device_id = bp.cameras.hand.device_id.clone();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate device_id"), "got: {err}");
    }

    #[test]
    fn test_image_sequence_requires_path() {
        let mut bp = SessionBlueprint::default();
        bp.cameras.hand.kind = CameraKind::ImageSequence;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("requires a path"), "got: {err}");
    }

    #[test]
    fn test_device_camera_requires_index() {
        let mut bp = SessionBlueprint::default();
        bp.cameras.face.kind = CameraKind::Device;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cameras[face_cam].index"), "got: {err}");

        bp.cameras.face.index = Some(-1);
        assert!(validate(&bp).is_err());

        bp.cameras.face = CameraConfig::device("face_cam", 1, 640, 480);
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_process_detector_requires_command() {
        let mut bp = SessionBlueprint::default();
        bp.detectors.face.kind = DetectorKind::Process;
        bp.detectors.face.command = Some("  ".into());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("detectors.face.command"), "got: {err}");
    }

    #[test]
    fn test_side_mode_requires_side_camera() {
        let mut bp = SessionBlueprint::default();
        bp.gesture.depth_mode = DepthMode::SideCamera;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cameras.side"), "got: {err}");

        bp.cameras.side = Some(CameraConfig::synthetic("side_cam", 320, 240));
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_pitch_grid_overflow() {
        let mut bp = SessionBlueprint::default();
        bp.sound.base_note = 120;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("exceeds MIDI range"), "got: {err}");
    }

    #[test]
    fn test_scale_step_too_wide() {
        let mut bp = SessionBlueprint::default();
        bp.sound.scale = vec![0, 12];
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("< 12 semitones"), "got: {err}");
    }
}
