//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::SessionBlueprint;
use handsynth_cli::{CliError, Pipeline, PipelineConfig, StopReason};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::RunArgs;

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    apply_overrides(&mut blueprint, args);
    ConfigLoader::validate(&blueprint).context("Invalid command-line override")?;

    info!(
        hand_cam = %blueprint.cameras.hand.device_id,
        face_cam = %blueprint.cameras.face.device_id,
        side_cam = blueprint.uses_side_camera(),
        output_dir = %blueprint.session.output_dir.display(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping pipeline...");
        signal_cancel.cancel();
    });

    let config = PipelineConfig::from_blueprint(blueprint);
    info!("Starting pipeline...");

    // 采集循环和 worker 都是阻塞式线程
    let stats = tokio::task::spawn_blocking(move || {
        let backend = devices::system_backend();
        let pipeline = Pipeline::start(config, backend.as_ref(), &cancel)?;
        Ok::<_, CliError>(pipeline.run())
    })
    .await
    .context("Pipeline task panicked")?
    .context("Failed to start pipeline")?;

    signal_task.abort();
    stats.print_summary();

    if let StopReason::Failed { message } = &stats.stop_reason {
        return Err(CliError::pipeline_execution(message.clone()).into());
    }

    info!(reason = %stats.stop_reason, "handsynth finished");
    Ok(())
}

/// Command-line flags win over the file
fn apply_overrides(blueprint: &mut SessionBlueprint, args: &RunArgs) {
    if let Some(ref dir) = args.output_dir {
        info!(output_dir = %dir.display(), "Overriding output directory from CLI");
        blueprint.session.output_dir = dir.clone();
    }
    if args.max_frames > 0 {
        blueprint.session.max_frames = Some(args.max_frames);
    }
    if args.timeout > 0.0 {
        blueprint.session.timeout_secs = Some(args.timeout);
    }
    if let Some(ref port) = args.midi_port {
        info!(port = %port, "Overriding MIDI port from CLI");
        blueprint.sound.output = Some(port.clone());
    }
    if args.allow_silent {
        blueprint.sound.allow_silent = true;
    }
    if args.no_video {
        blueprint.recorder.write_videos = false;
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &SessionBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Session:");
    println!("  Output dir: {}", blueprint.session.output_dir.display());
    if let Some(max) = blueprint.session.max_frames {
        println!("  Max frames: {}", max);
    }
    if let Some(secs) = blueprint.session.timeout_secs {
        println!("  Timeout: {:.1}s", secs);
    }

    println!("\nCameras:");
    for camera in blueprint.all_cameras() {
        println!(
            "  - {} ({:?}, {}x{} @ {} fps)",
            camera.device_id, camera.kind, camera.width, camera.height, camera.fps
        );
    }

    println!("\nDetectors:");
    println!("  Hand: {:?}", blueprint.detectors.hand.kind);
    println!("  Face: {:?}", blueprint.detectors.face.kind);

    println!("\nSound:");
    println!(
        "  Output: {}",
        blueprint.sound.output.as_deref().unwrap_or("(first available)")
    );
    println!(
        "  Grid: {}x{}, base note {}",
        blueprint.sound.columns, blueprint.sound.rows, blueprint.sound.base_note
    );

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::{Cli, Commands};

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["handsynth", "run"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Run(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut blueprint = SessionBlueprint::default();
        let args = run_args(&[
            "--output-dir",
            "/tmp/sessions",
            "--max-frames",
            "50",
            "--midi-port",
            "Synth",
            "--allow-silent",
            "--no-video",
        ]);
        apply_overrides(&mut blueprint, &args);

        assert_eq!(blueprint.session.output_dir, std::path::PathBuf::from("/tmp/sessions"));
        assert_eq!(blueprint.session.max_frames, Some(50));
        assert_eq!(blueprint.session.timeout_secs, None);
        assert_eq!(blueprint.sound.output.as_deref(), Some("Synth"));
        assert!(blueprint.sound.allow_silent);
        assert!(!blueprint.recorder.write_videos);
    }

    #[test]
    fn test_zero_means_unset() {
        let mut blueprint = SessionBlueprint::default();
        blueprint.session.max_frames = Some(10);
        apply_overrides(&mut blueprint, &run_args(&[]));
        assert_eq!(blueprint.session.max_frames, Some(10));
        assert!(blueprint.recorder.write_videos);
    }

    #[tokio::test]
    async fn test_missing_config_rejected() {
        let args = run_args(&["--config", "/nonexistent/handsynth.toml"]);
        let err = run_pipeline(&args).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
