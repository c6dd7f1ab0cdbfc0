//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DetectorKind, SessionBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    cameras: Vec<String>,
    hand_detector: String,
    face_detector: String,
    sound_output: String,
    depth_mode: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(summarize(&blueprint)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(blueprint: &SessionBlueprint) -> ConfigSummary {
    ConfigSummary {
        version: format!("{:?}", blueprint.version),
        cameras: blueprint
            .all_cameras()
            .map(|camera| camera.device_id.clone())
            .collect(),
        hand_detector: format!("{:?}", blueprint.detectors.hand.kind),
        face_detector: format!("{:?}", blueprint.detectors.face.kind),
        sound_output: blueprint
            .sound
            .output
            .clone()
            .unwrap_or_else(|| "(first available)".to_string()),
        depth_mode: format!("{:?}", blueprint.gesture.depth_mode),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &SessionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.cameras.side.is_some() && !blueprint.uses_side_camera() {
        warnings.push(
            "cameras.side is configured but gesture.depth_mode is single_camera - side camera will not be opened"
                .to_string(),
        );
    }

    if blueprint.sound.output.is_none() && !blueprint.sound.allow_silent {
        warnings.push(
            "sound.output is not set - the first available MIDI output will be used".to_string(),
        );
    }

    for (field, detector) in [
        ("detectors.hand", &blueprint.detectors.hand),
        ("detectors.face", &blueprint.detectors.face),
    ] {
        if detector.kind == DetectorKind::Synthetic {
            warnings.push(format!("{} uses the synthetic detector - landmarks are generated", field));
        }
    }

    if !blueprint.recorder.write_videos {
        warnings.push("recorder.write_videos is false - no session videos will be written".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Cameras: {}", summary.cameras.join(", "));
            println!("  Hand detector: {}", summary.hand_detector);
            println!("  Face detector: {}", summary.face_detector);
            println!("  Sound output: {}", summary.sound_output);
            println!("  Depth mode: {}", summary.depth_mode);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CameraConfig;
    use std::io::Write;

    #[test]
    fn test_side_camera_warning() {
        let mut blueprint = SessionBlueprint::default();
        blueprint.cameras.side = Some(CameraConfig::synthetic("side_cam", 320, 240));
        let warnings = collect_warnings(&blueprint);
        assert!(warnings.iter().any(|w| w.contains("cameras.side")));

        blueprint.gesture.depth_mode = contracts::DepthMode::SideCamera;
        let warnings = collect_warnings(&blueprint);
        assert!(!warnings.iter().any(|w| w.contains("cameras.side")));
    }

    #[test]
    fn test_silent_run_has_no_output_warning() {
        let mut blueprint = SessionBlueprint::default();
        blueprint.sound.allow_silent = true;
        let warnings = collect_warnings(&blueprint);
        assert!(!warnings.iter().any(|w| w.contains("sound.output")));
    }

    #[test]
    fn test_validate_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sound]\nchannel = 3\n").unwrap();

        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(result.valid, "error: {:?}", result.error);
        let summary = result.summary.unwrap();
        assert_eq!(summary.cameras, vec!["hand_cam", "face_cam"]);
        assert_eq!(summary.depth_mode, "SingleCamera");
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let args = ValidateArgs {
            config: "/nonexistent/handsynth.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
