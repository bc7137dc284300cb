use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use std::fs::File;
use tree3d::color::Rgb;
use tree3d::graphics::FrameBuffer;
use tree3d::photos::{collect_photos, ImageRef, SyncLoader};
use tree3d::scene::{Scene, BACKGROUND};
use tree3d::{widget, Cli, Config};

/// Frame rendered at the end of a headless run
const HEADLESS_FRAME: (usize, usize) = (160, 96);

fn init_logging(cli: &Cli) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));

    // Set verbosity
    if cli.verbose > 0 {
        builder.filter_level(match cli.verbose {
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        });
    } else if cli.quiet {
        builder.filter_level(LevelFilter::Error);
    }

    if let Some(path) = &cli.log_file {
        let file = File::create(path)
            .with_context(|| format!("cannot create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    } else if cli.headless.is_none() {
        // stderr shares the screen with the tree
        builder.filter_level(LevelFilter::Off);
    }

    builder.init();
    Ok(())
}

/// Steps the scene at the configured frame rate without touching the terminal
fn run_headless(config: &Config, photos: Vec<ImageRef>, frames: u64) -> Result<()> {
    let mut loader = SyncLoader::new();
    let mut scene = Scene::new(config, photos, &mut loader);
    let dt = config.frame_time();
    let mut loaded = scene.pump_textures(&mut loader);

    for frame in 1..=frames {
        scene.advance(dt);
        loaded += scene.pump_textures(&mut loader);
        if frame % u64::from(config.fps) == 0 {
            info!(
                "frame {frame}: t={:.2}s progress={:.3}",
                scene.engine().time(),
                scene.engine().ornaments().transition().progress()
            );
        }
    }

    let (width, height) = HEADLESS_FRAME;
    let background = Rgb::hex(BACKGROUND);
    let mut frame = FrameBuffer::new(width, height, background);
    scene.render(&mut frame);
    let lit = frame
        .rows()
        .flatten()
        .filter(|c| c.luminance() > background.luminance() + 0.05)
        .count();

    println!(
        "{frames} frames, target {:?}, progress {:.3}, {loaded} textures loaded, {lit} lit pixels",
        scene.target(),
        scene.engine().ornaments().transition().progress(),
    );
    scene.teardown();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = Config::from_cli(&cli).context("invalid options")?;
    info!("seed {}", config.seed);
    let photos = collect_photos(&config.photos, config.photo_dir.as_deref())
        .context("cannot collect photos")?;
    info!("{} photos", photos.len());

    match cli.headless {
        Some(frames) => run_headless(&config, photos, frames),
        None => widget::run(config, photos).context("terminal session failed"),
    }
}
