//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约与示例配置测试
//! - 合成设备 e2e 测试（无需摄像头、模型或 MIDI 端口）
//! - 启动失败回滚与取消时的关闭顺序

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{CameraKind, DepthMode, DetectorKind, SessionBlueprint};

    const SAMPLE_CONFIG: &str = include_str!("../../../config/handsynth.toml");

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_sample_config_is_valid() {
        let blueprint = ConfigLoader::load_from_str(SAMPLE_CONFIG, ConfigFormat::Toml).unwrap();
        ConfigLoader::validate(&blueprint).unwrap();

        assert_eq!(blueprint.cameras.hand.kind, CameraKind::Synthetic);
        assert_eq!(blueprint.detectors.hand.kind, DetectorKind::Synthetic);
        assert_eq!(blueprint.detectors.hand.synthetic.palm_flip_every, 45);
        assert_eq!(blueprint.gesture.depth_mode, DepthMode::SingleCamera);
        assert_eq!(blueprint.sound.chord, vec![0, 4, 7]);
        assert!(!blueprint.uses_side_camera());
    }

    #[test]
    fn test_default_blueprint_survives_toml() {
        let blueprint = SessionBlueprint::default();
        let text = ConfigLoader::to_toml(&blueprint).unwrap();
        let parsed = ConfigLoader::load_from_str(&text, ConfigFormat::Toml).unwrap();
        assert_eq!(parsed.pipeline, blueprint.pipeline);
        assert_eq!(parsed.sound, blueprint.sound);
        assert_eq!(parsed.recorder, blueprint.recorder);
    }
}

#[cfg(test)]
mod gesture_tests {
    use contracts::{Frame, GestureConfig, Handedness, LandmarkDetector, SyntheticDetectorConfig};
    use devices::{SyntheticFaceDetector, SyntheticHandDetector};
    use gesture::{face_orientation, hand_state, DepthSource};

    /// Synthetic hands flip palm every N frames and the interpreter agrees
    #[test]
    fn test_synthetic_hand_drives_interpreter() {
        let mut detector = SyntheticHandDetector::new(SyntheticDetectorConfig {
            palm_flip_every: 10,
            ..Default::default()
        });
        let config = GestureConfig::default();

        for seq in [0u64, 9, 10, 19, 20] {
            let frame = Frame::filled(seq, 0.0, 64, 48, [0, 0, 0]);
            let hands = detector.detect(&frame).unwrap();
            let state = hand_state(&hands[0], DepthSource::SingleCamera, &config).unwrap();
            assert_eq!(state.is_palm_up, (seq / 10) % 2 == 0, "seq {seq}");
            assert_eq!(state.handedness, Handedness::Right);
            assert!(state.depth >= 0.0);
        }
    }

    #[test]
    fn test_synthetic_face_is_frontal() {
        let mut detector = SyntheticFaceDetector::new(SyntheticDetectorConfig::default());
        let frame = Frame::filled(0, 0.0, 64, 48, [0, 0, 0]);
        let faces = detector.detect(&frame).unwrap();
        let orientation = face_orientation(&faces[0]);
        assert!(orientation.yaw.abs() < 1.0, "yaw {}", orientation.yaw);
        assert!(orientation.roll.abs() < 1.0, "roll {}", orientation.roll);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::path::Path;
    use std::thread;
    use std::time::{Duration, Instant};

    use contracts::{
        CameraConfig, CameraKind, DepthMode, DetectorKind, Frame, Modality, SessionBlueprint,
    };
    use devices::{DeviceFactory, MemoryBackend};
    use handsynth_cli::{CliError, Pipeline, PipelineConfig, StopReason};
    use ingestion::{LandmarkWorker, SubmitOutcome, WorkerConfig};
    use recorder::session::{FACE_CSV, FACE_PLOT, HAND_ANIMATION, HAND_CSV};
    use tokio_util::sync::CancellationToken;

    /// Small synthetic session: cheap videos and a short animation
    fn blueprint(output_dir: &Path, frame_limit: Option<u64>) -> SessionBlueprint {
        let mut bp = SessionBlueprint::default();
        bp.session.output_dir = output_dir.to_path_buf();

        let mut hand = CameraConfig::synthetic("hand_cam", 96, 72);
        hand.frame_limit = frame_limit;
        let mut face = CameraConfig::synthetic("face_cam", 96, 72);
        face.frame_limit = frame_limit;
        bp.cameras.hand = hand;
        bp.cameras.face = face;

        bp.detectors.hand.synthetic.palm_flip_every = 10;
        bp.detectors.hand.synthetic.sweep_period = 0;
        bp.detectors.hand.synthetic.hands = 1;

        bp.sound.chord = vec![0];
        bp.recorder.max_animation_frames = 20;
        bp.recorder.animation_size = 120;
        bp.recorder.plot_width = 400;
        bp.recorder.plot_height = 400;
        bp
    }

    fn data_rows(path: &Path) -> usize {
        let content = fs::read_to_string(path).unwrap();
        content.lines().skip(1).filter(|l| !l.is_empty()).count()
    }

    /// 100 frames, palm flipping every 10: five up phases, five notes
    #[test]
    fn test_e2e_synthetic_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let cancel = CancellationToken::new();

        let config = PipelineConfig::from_blueprint(blueprint(dir.path(), Some(100)));
        let pipeline = Pipeline::start(config, &backend, &cancel).unwrap();
        let stats = pipeline.run();

        assert_eq!(
            stats.stop_reason,
            StopReason::StreamEnded {
                device: "hand_cam".to_string()
            }
        );
        assert_eq!(stats.ticks, 100);
        assert_eq!(stats.frames_dropped, 0);
        assert_eq!(stats.hand_results, 100);
        assert_eq!(stats.face_results, 100);

        assert_eq!(stats.notes.note_on, 5);
        assert_eq!(stats.notes.note_off, 5);
        let events = backend.events();
        assert_eq!(events.len(), 10);
        for pair in events.chunks(2) {
            assert!(pair[0].is_on());
            assert!(!pair[1].is_on());
            assert_eq!(pair[0].pitch, pair[1].pitch);
        }
        assert_eq!(backend.close_count(), 1);

        let session = &stats.session_dir;
        assert!(session.starts_with(dir.path()));
        assert_eq!(data_rows(&session.join(HAND_CSV)), 100);
        assert_eq!(data_rows(&session.join(FACE_CSV)), 100);
        assert!(session.join(FACE_PLOT).exists());
        assert!(session.join(HAND_ANIMATION).exists());
        assert!(stats.outputs.failed.is_empty(), "{:?}", stats.outputs.failed);

        let workers: Vec<_> = stats.workers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(workers, vec!["landmark-hand", "landmark-face"]);
        for (_, snapshot) in &stats.workers {
            assert_eq!(snapshot.frames_completed, 100);
            assert_eq!(snapshot.failures, 0);
        }
    }

    /// Cancelling with backed-up worker queues joins within the bound and leaves nothing sounding
    #[test]
    fn test_e2e_cancel_mid_stream() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let cancel = CancellationToken::new();

        let mut bp = blueprint(dir.path(), None);
        bp.recorder.write_videos = false;
        // 模型比采集慢，输入队列会堆满
        bp.detectors.hand.synthetic.latency_ms = 40;
        bp.detectors.face.synthetic.latency_ms = 40;
        bp.pipeline.queue_depth = 4;
        bp.pipeline.submit_timeout_ms = 5;
        bp.pipeline.result_timeout_ms = 5;
        let join_timeout = Duration::from_millis(bp.pipeline.join_timeout_ms);

        let run_backend = backend.clone();
        let run_cancel = cancel.clone();
        let handle = thread::spawn(move || {
            let pipeline =
                Pipeline::start(PipelineConfig::from_blueprint(bp), &run_backend, &run_cancel)?;
            Ok::<_, CliError>(pipeline.run())
        });

        thread::sleep(Duration::from_millis(400));
        let cancelled_at = Instant::now();
        cancel.cancel();
        let stats = handle.join().unwrap().unwrap();
        let elapsed = cancelled_at.elapsed();

        assert_eq!(stats.stop_reason, StopReason::Cancelled);
        assert!(stats.ticks > 0);
        assert!(
            stats.worker_join < join_timeout,
            "workers joined after {:?}",
            stats.worker_join
        );
        // 录制输出 (CSV / 图 / 动画) 在 join 之后生成
        assert!(elapsed < join_timeout * 3, "shutdown took {elapsed:?}");

        let discarded: u64 = stats.workers.iter().map(|(_, s)| s.frames_discarded).sum();
        assert!(discarded > 0, "queues were empty at cancel: {:?}", stats.workers);
        for (name, snapshot) in &stats.workers {
            assert_eq!(snapshot.in_flight(), 0, "{name} still reports frames in flight");
        }

        let events = backend.events();
        let ons = events.iter().filter(|e| e.is_on()).count();
        let offs = events.len() - ons;
        assert_eq!(ons, offs, "a note is still sounding");
        assert_eq!(backend.close_count(), 1);
    }

    #[test]
    fn test_e2e_side_camera_depth() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let cancel = CancellationToken::new();

        let mut bp = blueprint(dir.path(), Some(20));
        let mut side = CameraConfig::synthetic("side_cam", 64, 48);
        side.frame_limit = Some(40);
        bp.cameras.side = Some(side);
        bp.gesture.depth_mode = DepthMode::SideCamera;
        bp.recorder.write_videos = false;

        let pipeline =
            Pipeline::start(PipelineConfig::from_blueprint(bp), &backend, &cancel).unwrap();
        let stats = pipeline.run();

        assert_eq!(stats.ticks, 20);
        let workers: Vec<_> = stats.workers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(workers, vec!["landmark-hand", "landmark-face", "landmark-side"]);
        // palm up for frames 0-9, down for 10-19
        assert_eq!(stats.notes.note_on, 1);
        assert_eq!(stats.notes.note_off, 1);
    }

    #[test]
    fn test_e2e_frame_limit_from_session() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let cancel = CancellationToken::new();

        let mut bp = blueprint(dir.path(), None);
        bp.session.max_frames = Some(15);
        bp.recorder.write_videos = false;

        let pipeline =
            Pipeline::start(PipelineConfig::from_blueprint(bp), &backend, &cancel).unwrap();
        let stats = pipeline.run();

        assert_eq!(stats.stop_reason, StopReason::FrameLimit);
        assert_eq!(stats.ticks, 15);
        assert_eq!(data_rows(&stats.session_dir.join(HAND_CSV)), 15);
    }

    /// A malformed frame is skipped; the next valid frame is processed
    #[test]
    fn test_worker_survives_malformed_frame() {
        let cancel = CancellationToken::new();
        let detector = SessionBlueprint::default().detectors.hand;
        let mut worker = LandmarkWorker::spawn(
            Modality::Hand,
            DeviceFactory::detector_factory(&detector, Modality::Hand),
            WorkerConfig::default(),
            &cancel,
        )
        .unwrap();

        let malformed = Frame::new(0, 0.0, 16, 16, vec![0; 10]);
        assert_eq!(worker.submit(malformed).unwrap(), SubmitOutcome::Queued);
        let valid = Frame::filled(1, 0.1, 16, 16, [10, 20, 30]);
        assert_eq!(worker.submit(valid.clone()).unwrap(), SubmitOutcome::Queued);

        let result = worker
            .recv_result_timeout(Duration::from_secs(2))
            .unwrap()
            .unwrap();
        assert_eq!(result.frame, valid);
        assert_eq!(result.landmark_sets.len(), 1);

        worker.shutdown().unwrap();
        let metrics = worker.metrics();
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.results_emitted, 1);
    }

    /// A camera that cannot open fails the start; nothing is left behind
    #[test]
    fn test_startup_failure_missing_capture() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let cancel = CancellationToken::new();

        let mut bp = blueprint(dir.path(), None);
        bp.cameras.face.kind = CameraKind::ImageSequence;
        bp.cameras.face.path = Some(dir.path().join("no_such_captures"));

        let result = Pipeline::start(PipelineConfig::from_blueprint(bp), &backend, &cancel);
        assert!(matches!(result, Err(CliError::Startup(_))));
        assert_eq!(backend.close_count(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// A model that cannot start releases the already-opened audio output
    #[test]
    fn test_startup_failure_detector_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MemoryBackend::new();
        let cancel = CancellationToken::new();

        let mut bp = blueprint(dir.path(), None);
        bp.detectors.face.kind = DetectorKind::Process;
        bp.detectors.face.command = Some("/nonexistent/handsynth-face-model".to_string());

        let result = Pipeline::start(PipelineConfig::from_blueprint(bp), &backend, &cancel);
        assert!(matches!(result, Err(CliError::Worker(_))));
        assert_eq!(backend.close_count(), 1);
        assert!(backend.events().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_startup_without_audio_output() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();

        let mut bp = blueprint(dir.path(), Some(5));
        bp.recorder.write_videos = false;
        bp.sound.output = Some("missing port".to_string());

        let backend = MemoryBackend::new();
        let result = Pipeline::start(PipelineConfig::from_blueprint(bp.clone()), &backend, &cancel);
        assert!(matches!(result, Err(CliError::Startup(_))));

        bp.sound.allow_silent = true;
        let stats = Pipeline::start(PipelineConfig::from_blueprint(bp), &backend, &cancel)
            .unwrap()
            .run();
        assert_eq!(stats.ticks, 5);
        assert!(backend.events().is_empty());
        assert!(stats.notes.note_on > 0);
    }
}
