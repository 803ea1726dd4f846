mod callback;
mod cli;
mod flame_file;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use flame_core::{Settings, VecFlameSource};
use flame_device::RenderBackend;
use flame_engine::{start_engine, EngineConfig, Task};

use crate::callback::PngCallback;
use crate::cli::Cli;

fn build_settings(cli: &Cli) -> anyhow::Result<Settings> {
    Settings::builder()
        .width(cli.width)
        .height(cli.height)
        .max_time(cli.max_time)
        .max_quality(cli.max_quality)
        .use_blur(cli.blur)
        .blur_alpha(cli.blur_alpha)
        .blur_min_radius(cli.blur_min_radius)
        .blur_max_radius(cli.blur_max_radius)
        .build()
        .map_err(|err| anyhow::anyhow!("invalid settings: {err}"))
}

fn run<B: RenderBackend + 'static>(
    cli: &Cli,
    settings: Settings,
    backend: B,
) -> anyhow::Result<()> {
    let flames = match &cli.flame_file {
        Some(path) => flame_file::load_flame_file(path)?,
        None => flame_file::demo_flames(cli.frames),
    };
    let total_frames = flames.len() as u32;

    let config = EngineConfig {
        updates_per_sec: cli.updates_per_sec,
        update_images: !cli.no_update_images,
        batch_accelerated: !cli.no_batch_accelerate,
        max_batch_time_sec: cli.max_batch_time_sec,
    };

    let engine = start_engine(config, backend);
    let callback = Arc::new(PngCallback::new(cli.output.clone(), total_frames));
    let task = Task::new(Arc::new(settings), Box::new(VecFlameSource::new(flames)), callback);

    engine.queue().push(task.clone());
    task.await_termination();

    engine.shutdown();
    if !engine.await_termination(Duration::from_secs(10)) {
        anyhow::bail!("engine failed to shut down cleanly");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    ctrlc::set_handler(|| {
        tracing::info!("signal received, requesting immediate shutdown");
        flame_engine::run_hooks();
    })
    .expect("error registering signal handler");

    let cli = Cli::parse();
    let settings = build_settings(&cli)?;

    if cli.gpu {
        #[cfg(feature = "gpu")]
        {
            let backend = flame_device::WgpuBackend::new(wgpu::PowerPreference::HighPerformance)
                .map_err(|err| anyhow::anyhow!("failed to initialize GPU backend: {err}"))?;
            return run(&cli, settings, backend);
        }
        #[cfg(not(feature = "gpu"))]
        {
            anyhow::bail!("--gpu requires the crate's `gpu` feature to be compiled in");
        }
    }

    let backend = flame_device::CpuBackend::new();
    run(&cli, settings, backend)
}
