use crate::error::{Result, TreeError};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// The two shapes every particle group morphs between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MorphTarget {
    /// Dispersed sphere
    Scattered,
    /// Assembled cone
    #[default]
    Tree,
}

impl MorphTarget {
    /// Progress value this target pulls towards
    pub fn progress(self) -> f32 {
        match self {
            MorphTarget::Scattered => 0.0,
            MorphTarget::Tree => 1.0,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            MorphTarget::Scattered => MorphTarget::Tree,
            MorphTarget::Tree => MorphTarget::Scattered,
        }
    }
}

/// Command line options
#[derive(Debug, Parser)]
#[command(name = "tree3d", version, about = "A console-based 3D particle Christmas tree")]
pub struct Cli {
    /// Number of ornament particles
    #[arg(long, default_value_t = 4000)]
    pub ornaments: usize,

    /// Number of photo frames hung on the tree
    #[arg(long, default_value_t = 30)]
    pub photo_slots: usize,

    /// Number of stars in the spiral around the tree
    #[arg(long, default_value_t = 800)]
    pub spiral_stars: usize,

    /// Number of background stars
    #[arg(long, default_value_t = 5000)]
    pub backdrop_stars: usize,

    /// Photo to hang on the tree (repeatable)
    #[arg(long = "photo", value_name = "PATH")]
    pub photos: Vec<PathBuf>,

    /// Directory scanned for photos, rescanned with `u`
    #[arg(long, value_name = "DIR")]
    pub photo_dir: Option<PathBuf>,

    /// Background track, looped; toggled with `m`
    #[arg(long, value_name = "PATH")]
    pub music: Option<PathBuf>,

    /// Seed for the particle layout
    #[arg(long)]
    pub seed: Option<u64>,

    /// Target frame rate
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Supersampling factor, clamped to [1, 2]
    #[arg(long, default_value_t = 1.0)]
    pub pixel_ratio: f32,

    /// Shape requested at launch
    #[arg(long, value_enum, default_value_t = MorphTarget::Tree)]
    pub start: MorphTarget,

    /// Simulate this many frames without a terminal and exit
    #[arg(long, value_name = "FRAMES")]
    pub headless: Option<u64>,

    /// Write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub ornaments: usize,
    pub photo_slots: usize,
    pub spiral_stars: usize,
    pub backdrop_stars: usize,
    pub photos: Vec<PathBuf>,
    pub photo_dir: Option<PathBuf>,
    pub music: Option<PathBuf>,
    pub seed: u64,
    pub fps: u32,
    pub pixel_ratio: usize,
    pub start: MorphTarget,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        for (name, count) in [
            ("ornaments", cli.ornaments),
            ("photo-slots", cli.photo_slots),
            ("spiral-stars", cli.spiral_stars),
        ] {
            if count == 0 {
                return Err(TreeError::InvalidConfig(format!(
                    "--{name} must be a positive count"
                )));
            }
        }
        if !cli.pixel_ratio.is_finite() {
            return Err(TreeError::InvalidConfig(
                "--pixel-ratio must be a number".to_string(),
            ));
        }

        Ok(Config {
            ornaments: cli.ornaments,
            photo_slots: cli.photo_slots,
            spiral_stars: cli.spiral_stars,
            backdrop_stars: cli.backdrop_stars,
            photos: cli.photos.clone(),
            photo_dir: cli.photo_dir.clone(),
            music: cli.music.clone(),
            seed: cli.seed.unwrap_or_else(rand::random),
            fps: cli.fps.clamp(1, 240),
            pixel_ratio: cli.pixel_ratio.clamp(1.0, 2.0).round() as usize,
            start: cli.start,
        })
    }

    /// Seconds per frame at the configured rate
    pub fn frame_time(&self) -> f32 {
        1.0 / self.fps as f32
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ornaments: 4000,
            photo_slots: 30,
            spiral_stars: 800,
            backdrop_stars: 5000,
            photos: Vec::new(),
            photo_dir: None,
            music: None,
            seed: 0,
            fps: 60,
            pixel_ratio: 1,
            start: MorphTarget::Tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("tree3d").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_match_the_card() {
        let config = Config::from_cli(&parse(&["--seed", "7"])).unwrap();
        assert_eq!(config.ornaments, 4000);
        assert_eq!(config.photo_slots, 30);
        assert_eq!(config.spiral_stars, 800);
        assert_eq!(config.start, MorphTarget::Tree);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn zero_counts_are_rejected() {
        let err = Config::from_cli(&parse(&["--photo-slots", "0"])).unwrap_err();
        assert!(matches!(err, TreeError::InvalidConfig(_)));
    }

    #[test]
    fn pixel_ratio_and_fps_are_clamped() {
        let config =
            Config::from_cli(&parse(&["--pixel-ratio", "3.5", "--fps", "1000"])).unwrap();
        assert_eq!(config.pixel_ratio, 2);
        assert_eq!(config.fps, 240);
    }

    #[test]
    fn toggled_flips_target() {
        assert_eq!(MorphTarget::Tree.toggled(), MorphTarget::Scattered);
        assert_eq!(MorphTarget::Scattered.toggled().progress(), 1.0);
    }
}
