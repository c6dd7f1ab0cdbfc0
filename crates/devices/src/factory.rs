//! DeviceFactory 核心实现
//!
//! 从 SessionBlueprint 打开采集设备、landmark 模型和音频输出；
//! 任何设备打开失败时回滚已打开的设备。

use contracts::{
    AudioBackend, AudioOutput, CameraConfig, CameraKind, ContractError, DetectorConfig,
    DetectorFactory, DetectorKind, FrameSource, LandmarkDetector, Modality, SessionBlueprint,
    SoundConfig,
};
use tracing::{info, instrument, warn};

use crate::audio::NullOutput;
use crate::camera::{ImageSequenceCamera, SyntheticCamera};
use crate::detector::{ProcessDetector, ScriptedDetector, SyntheticFaceDetector, SyntheticHandDetector};

/// Capture devices of one session
pub struct CameraSet {
    pub hand: Box<dyn FrameSource>,
    pub face: Box<dyn FrameSource>,
    pub side: Option<Box<dyn FrameSource>>,
}

impl CameraSet {
    /// Release every device (idempotent)
    pub fn close_all(&mut self) {
        self.hand.close();
        self.face.close();
        if let Some(side) = self.side.as_mut() {
            side.close();
        }
    }
}

/// Device Factory
///
/// Turns configuration sections into opened capability objects.
pub struct DeviceFactory;

impl DeviceFactory {
    /// Open one capture device
    #[instrument(name = "device_factory_open_camera", skip(config), fields(device_id = %config.device_id))]
    pub fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>, ContractError> {
        let source: Box<dyn FrameSource> = match config.kind {
            CameraKind::Synthetic => Box::new(SyntheticCamera::open(config)?),
            CameraKind::ImageSequence => Box::new(ImageSequenceCamera::open(config)?),
            #[cfg(feature = "opencv")]
            CameraKind::Device => Box::new(crate::camera::DeviceCamera::open(config)?),
            #[cfg(not(feature = "opencv"))]
            CameraKind::Device => {
                return Err(ContractError::device_unavailable(
                    &config.device_id,
                    "built without camera support (enable the `opencv` feature)",
                ))
            }
        };
        Ok(source)
    }

    /// Open all cameras of a blueprint.
    ///
    /// # 原子性保证
    /// 如果任何设备打开失败，已打开的设备会被关闭。
    #[instrument(name = "device_factory_open_cameras", skip(blueprint))]
    pub fn open_cameras(blueprint: &SessionBlueprint) -> Result<CameraSet, ContractError> {
        let mut hand = Self::open_camera(&blueprint.cameras.hand)?;

        let mut face = match Self::open_camera(&blueprint.cameras.face) {
            Ok(face) => face,
            Err(e) => {
                warn!(error = %e, "face camera failed, rolling back");
                hand.close();
                return Err(e);
            }
        };

        let side = match blueprint.cameras.side.as_ref().filter(|_| blueprint.uses_side_camera()) {
            Some(config) => match Self::open_camera(config) {
                Ok(side) => Some(side),
                Err(e) => {
                    warn!(error = %e, "side camera failed, rolling back");
                    hand.close();
                    face.close();
                    return Err(e);
                }
            },
            None => None,
        };

        info!(side = side.is_some(), "cameras opened");
        Ok(CameraSet { hand, face, side })
    }

    /// Deferred construction of a landmark model.
    ///
    /// The returned closure runs on the worker thread that will own the model.
    pub fn detector_factory(config: &DetectorConfig, modality: Modality) -> DetectorFactory {
        let config = config.clone();
        Box::new(move || Self::open_detector(&config, modality))
    }

    /// Construct a landmark model immediately
    pub fn open_detector(
        config: &DetectorConfig,
        modality: Modality,
    ) -> Result<Box<dyn LandmarkDetector>, ContractError> {
        let detector: Box<dyn LandmarkDetector> = match (config.kind, modality) {
            (DetectorKind::Synthetic, Modality::Hand) => {
                Box::new(SyntheticHandDetector::new(config.synthetic.clone()))
            }
            (DetectorKind::Synthetic, Modality::Face) => {
                Box::new(SyntheticFaceDetector::new(config.synthetic.clone()))
            }
            (DetectorKind::Scripted, _) => {
                let script = config.script.as_deref().ok_or_else(|| {
                    ContractError::device_unavailable(modality.as_str(), "no script configured")
                })?;
                Box::new(ScriptedDetector::load(script)?)
            }
            (DetectorKind::Process, _) => {
                let command = config.command.as_deref().ok_or_else(|| {
                    ContractError::device_unavailable(modality.as_str(), "no command configured")
                })?;
                Box::new(ProcessDetector::spawn(command, &config.args, modality)?)
            }
        };
        info!(modality = %modality, detector = detector.name(), "landmark model ready");
        Ok(detector)
    }

    /// Select and open the note output.
    ///
    /// Uses the configured port, else the first listed one. When nothing can be
    /// opened, `sound.allow_silent` decides between a silent output and failure.
    #[instrument(name = "device_factory_open_audio", skip(config, backend), fields(backend = backend.name()))]
    pub fn open_audio(
        config: &SoundConfig,
        backend: &dyn AudioBackend,
    ) -> Result<Box<dyn AudioOutput>, ContractError> {
        match Self::try_open_audio(config, backend) {
            Ok(output) => Ok(output),
            Err(e) if config.allow_silent => {
                warn!(error = %e, "no audio output, continuing silent");
                Ok(Box::new(NullOutput))
            }
            Err(e) => Err(e),
        }
    }

    fn try_open_audio(
        config: &SoundConfig,
        backend: &dyn AudioBackend,
    ) -> Result<Box<dyn AudioOutput>, ContractError> {
        let outputs = backend.list_outputs()?;
        info!(outputs = ?outputs, "available audio outputs");

        let name = match &config.output {
            Some(name) => name.clone(),
            None => outputs.first().cloned().ok_or_else(|| {
                ContractError::device_unavailable(backend.name(), "no audio outputs available")
            })?,
        };
        backend.open(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{MemoryBackend, NullBackend};
    use contracts::{DepthMode, Frame};

    #[test]
    fn test_open_default_cameras() {
        let bp = SessionBlueprint::default();
        let mut cameras = DeviceFactory::open_cameras(&bp).unwrap();
        assert_eq!(cameras.hand.device_id(), "hand_cam");
        assert_eq!(cameras.face.resolution(), (640, 480));
        assert!(cameras.side.is_none());
        cameras.close_all();
    }

    #[test]
    fn test_failed_face_camera_rolls_back() {
        let mut bp = SessionBlueprint::default();
        bp.cameras.face.kind = CameraKind::ImageSequence;
        bp.cameras.face.path = Some("/nonexistent/frames".into());
        let err = DeviceFactory::open_cameras(&bp).err().unwrap();
        assert!(err.is_fatal());
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_device_camera_needs_opencv() {
        let mut bp = SessionBlueprint::default();
        bp.cameras.hand = CameraConfig::device("hand_cam", 0, 640, 480);
        let err = DeviceFactory::open_cameras(&bp).err().unwrap();
        assert!(matches!(err, ContractError::DeviceUnavailable { .. }));
        assert!(err.to_string().contains("opencv"));
    }

    #[test]
    fn test_side_camera_opened_only_in_side_mode() {
        let mut bp = SessionBlueprint::default();
        bp.cameras.side = Some(CameraConfig::synthetic("side_cam", 64, 48));
        assert!(DeviceFactory::open_cameras(&bp).unwrap().side.is_none());

        bp.gesture.depth_mode = DepthMode::SideCamera;
        assert!(DeviceFactory::open_cameras(&bp).unwrap().side.is_some());
    }

    #[test]
    fn test_detector_factory_runs_deferred() {
        let bp = SessionBlueprint::default();
        let factory = DeviceFactory::detector_factory(&bp.detectors.hand, Modality::Hand);
        let mut detector = factory().unwrap();
        let sets = detector.detect(&Frame::filled(0, 0.0, 4, 4, [0, 0, 0])).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].len(), 21);
    }

    #[test]
    fn test_audio_selects_first_output() {
        let backend = MemoryBackend::new();
        let output = DeviceFactory::open_audio(&SoundConfig::default(), &backend).unwrap();
        assert_eq!(output.name(), MemoryBackend::OUTPUT_NAME);
    }

    #[test]
    fn test_audio_without_outputs() {
        let config = SoundConfig::default();
        let err = DeviceFactory::open_audio(&config, &NullBackend).err().unwrap();
        assert!(err.is_fatal());

        let silent = SoundConfig {
            allow_silent: true,
            ..SoundConfig::default()
        };
        let output = DeviceFactory::open_audio(&silent, &NullBackend).unwrap();
        assert_eq!(output.name(), "null");
    }

    #[test]
    fn test_configured_port_must_exist() {
        let config = SoundConfig {
            output: Some("IAC Driver Bus 1".into()),
            ..SoundConfig::default()
        };
        assert!(DeviceFactory::open_audio(&config, &MemoryBackend::new()).is_err());
    }
}
