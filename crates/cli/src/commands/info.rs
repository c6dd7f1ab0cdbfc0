//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{
    CameraConfig, DetectorConfig, GestureConfig, PipelineSettings, RecorderConfig,
    SessionBlueprint, SoundConfig,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    output_dir: String,
    cameras: Vec<CameraInfo>,
    detectors: Vec<DetectorInfo>,
    sound: SoundInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<DetailInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_outputs: Option<Vec<String>>,
}

#[derive(Serialize)]
struct CameraInfo {
    role: &'static str,
    device_id: String,
    kind: String,
    width: u32,
    height: u32,
    fps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

#[derive(Serialize)]
struct DetectorInfo {
    modality: &'static str,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

#[derive(Serialize)]
struct SoundInfo {
    output: Option<String>,
    allow_silent: bool,
    channel: u8,
    base_note: u8,
    grid: String,
}

#[derive(Serialize)]
struct DetailInfo {
    pipeline: PipelineSettings,
    gesture: GestureConfig,
    recorder: RecorderConfig,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let outputs = if args.ports {
        Some(list_outputs())
    } else {
        None
    };

    if args.json {
        let info = build_config_info(&blueprint, args, outputs);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args, outputs.as_deref());
    }

    Ok(())
}

fn list_outputs() -> Vec<String> {
    let backend = devices::system_backend();
    match backend.list_outputs() {
        Ok(outputs) => outputs,
        Err(e) => {
            warn!(backend = backend.name(), error = %e, "Failed to enumerate outputs");
            Vec::new()
        }
    }
}

fn camera_roles(blueprint: &SessionBlueprint) -> Vec<(&'static str, &CameraConfig)> {
    let mut roles = vec![("hand", &blueprint.cameras.hand), ("face", &blueprint.cameras.face)];
    if let Some(ref side) = blueprint.cameras.side {
        roles.push(("side", side));
    }
    roles
}

fn detector_source(detector: &DetectorConfig) -> Option<String> {
    detector
        .script
        .as_ref()
        .map(|p| p.display().to_string())
        .or_else(|| {
            detector
                .command
                .as_ref()
                .map(|cmd| format!("{} {}", cmd, detector.args.join(" ")).trim_end().to_string())
        })
}

fn grid(sound: &SoundConfig) -> String {
    format!("{}x{}", sound.columns, sound.rows)
}

fn build_config_info(
    blueprint: &SessionBlueprint,
    args: &InfoArgs,
    available_outputs: Option<Vec<String>>,
) -> ConfigInfo {
    let cameras = camera_roles(blueprint)
        .into_iter()
        .map(|(role, c)| CameraInfo {
            role,
            device_id: c.device_id.clone(),
            kind: format!("{:?}", c.kind),
            width: c.width,
            height: c.height,
            fps: c.fps,
            index: c.index,
            path: c.path.as_ref().map(|p| p.display().to_string()),
        })
        .collect();

    let detectors = [("hand", &blueprint.detectors.hand), ("face", &blueprint.detectors.face)]
        .into_iter()
        .map(|(modality, d)| DetectorInfo {
            modality,
            kind: format!("{:?}", d.kind),
            source: detector_source(d),
        })
        .collect();

    let details = args.details.then(|| DetailInfo {
        pipeline: blueprint.pipeline.clone(),
        gesture: blueprint.gesture.clone(),
        recorder: blueprint.recorder.clone(),
    });

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        output_dir: blueprint.session.output_dir.display().to_string(),
        cameras,
        detectors,
        sound: SoundInfo {
            output: blueprint.sound.output.clone(),
            allow_silent: blueprint.sound.allow_silent,
            channel: blueprint.sound.channel,
            base_note: blueprint.sound.base_note,
            grid: grid(&blueprint.sound),
        },
        details,
        available_outputs,
    }
}

fn print_config_info(blueprint: &SessionBlueprint, args: &InfoArgs, outputs: Option<&[String]>) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 handsynth Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📁 Session");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Output dir: {}", blueprint.session.output_dir.display());
    match blueprint.session.max_frames {
        Some(max) => println!("   ├─ Max frames: {}", max),
        None => println!("   ├─ Max frames: unlimited"),
    }
    match blueprint.session.timeout_secs {
        Some(secs) => println!("   └─ Timeout: {:.1}s", secs),
        None => println!("   └─ Timeout: none"),
    }

    let cameras = camera_roles(blueprint);
    println!("\n📷 Cameras ({})", cameras.len());
    for (i, (role, camera)) in cameras.iter().enumerate() {
        let prefix = if i == cameras.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} {}: {} ({:?}, {}x{} @ {} fps)",
            prefix, role, camera.device_id, camera.kind, camera.width, camera.height, camera.fps
        );
    }

    println!("\n🖐  Detectors");
    for (prefix, modality, detector) in [
        ("├─", "hand", &blueprint.detectors.hand),
        ("└─", "face", &blueprint.detectors.face),
    ] {
        match detector_source(detector) {
            Some(source) => println!("   {} {}: {:?} ({})", prefix, modality, detector.kind, source),
            None => println!("   {} {}: {:?}", prefix, modality, detector.kind),
        }
    }

    let sound = &blueprint.sound;
    println!("\n🎹 Sound");
    println!(
        "   ├─ Output: {}",
        sound.output.as_deref().unwrap_or("(first available)")
    );
    println!("   ├─ Channel: {}", sound.channel);
    println!("   ├─ Grid: {} from note {}", grid(sound), sound.base_note);
    println!("   ├─ Scale: {:?}", sound.scale);
    println!("   ├─ Chord: {:?}", sound.chord);
    println!("   └─ Allow silent: {}", sound.allow_silent);

    if args.details {
        let pipeline = &blueprint.pipeline;
        println!("\n⚙️  Pipeline");
        println!("   ├─ Queue depth: {}", pipeline.queue_depth);
        println!("   ├─ Submit timeout: {} ms", pipeline.submit_timeout_ms);
        println!("   ├─ Result timeout: {} ms", pipeline.result_timeout_ms);
        println!("   ├─ Join timeout: {} ms", pipeline.join_timeout_ms);
        println!("   └─ Drain timeout: {} ms", pipeline.drain_timeout_ms);

        let gesture = &blueprint.gesture;
        println!("\n📐 Gesture");
        println!("   ├─ Depth mode: {:?}", gesture.depth_mode);
        println!(
            "   ├─ Depth: offset {} scale {}",
            gesture.depth_offset, gesture.depth_scale
        );
        println!(
            "   └─ Side: reference x {} scale {} default {}",
            gesture.side_reference_x, gesture.side_scale, gesture.side_default_depth
        );

        let recorder = &blueprint.recorder;
        println!("\n🎞  Recorder");
        println!("   ├─ Trail length: {}", recorder.trail_length);
        println!(
            "   ├─ Animation: {} fps, max {} frames",
            recorder.animation_fps, recorder.max_animation_frames
        );
        println!("   ├─ Plot: {}x{}", recorder.plot_width, recorder.plot_height);
        println!("   └─ Videos: {}", if recorder.write_videos { "on" } else { "off" });
    }

    if let Some(outputs) = outputs {
        println!("\n🔌 Available outputs ({})", outputs.len());
        for (i, name) in outputs.iter().enumerate() {
            let prefix = if i == outputs.len() - 1 { "└─" } else { "├─" };
            println!("   {} {}", prefix, name);
        }
    }

    println!();
}
