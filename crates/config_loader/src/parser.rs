//! Blueprint parsing
//!
//! TOML is the primary format; JSON is accepted for generated configs.

use contracts::{ContractError, SessionBlueprint};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<SessionBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<SessionBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<SessionBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CameraKind, DepthMode, DetectorKind, Handedness};

    #[test]
    fn test_parse_toml_sections() {
        let content = r#"
[session]
output_dir = "runs"
max_frames = 200

[cameras.hand]
device_id = "hand_cam"
kind = "image_sequence"
path = "captures/hand"
height = 480

[cameras.face]
device_id = "face_cam"
kind = "device"
index = 1

[detectors.hand]
kind = "process"
command = "python3"
args = ["landmarks.py", "--hands"]

[detectors.face.synthetic]
handedness = "Left"

[gesture]
depth_mode = "single_camera"

[sound]
output = "IAC Driver Bus 1"
scale = [0, 3, 5, 7, 10]
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.session.max_frames, Some(200));
        assert_eq!(bp.cameras.hand.kind, CameraKind::ImageSequence);
        assert_eq!(bp.cameras.hand.width, 640);
        assert_eq!(bp.cameras.face.kind, CameraKind::Device);
        assert_eq!(bp.cameras.face.index, Some(1));
        assert_eq!(bp.detectors.hand.kind, DetectorKind::Process);
        assert_eq!(bp.detectors.hand.args.len(), 2);
        assert_eq!(bp.detectors.face.synthetic.handedness, Handedness::Left);
        assert_eq!(bp.gesture.depth_mode, DepthMode::SingleCamera);
        assert_eq!(bp.sound.output.as_deref(), Some("IAC Driver Bus 1"));
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "cameras": {
                "hand": { "device_id": "h", "width": 320, "height": 240 },
                "face": { "device_id": "f" }
            },
            "pipeline": { "queue_depth": 4 }
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.cameras.hand.width, 320);
        assert_eq!(bp.pipeline.queue_depth, 4);
        assert_eq!(bp.pipeline.submit_timeout_ms, 100);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_enum_value_is_parse_error() {
        let err = parse_toml("[gesture]\ndepth_mode = \"stereo\"\n").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("JSON"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
