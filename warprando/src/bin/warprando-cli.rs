use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;
use warprando::randomize::shuffle_warps;
use warprando::settings::{load_shuffle_settings, ShuffleSettings};
use warprando::spoiler_log::get_spoiler_log;
use warprando_game::World;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    world: PathBuf,

    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    random_seed: Option<usize>,

    #[arg(long)]
    target_swaps: Option<usize>,

    #[arg(long)]
    output_spoiler_log: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let world = World::load(&args.world)?;
    let mut settings = match &args.settings {
        Some(path) => load_shuffle_settings(path)?,
        None => ShuffleSettings::default(),
    };
    if let Some(target_swaps) = args.target_swaps {
        settings.target_swaps = target_swaps;
    }
    let seed = match args.random_seed {
        Some(s) => s,
        None => (rand::rngs::StdRng::from_entropy().next_u64() & 0xFFFFFFFF) as usize,
    };
    info!(
        "World {}: {} regions, {} exits, {} warps; seed={seed}",
        args.world.display(),
        world.regions.len(),
        world.exits.len(),
        world.warps.len()
    );

    let randomization = shuffle_warps(&world, &settings, seed)?;
    println!("{}", randomization.summary());

    if let Some(output_spoiler_log_path) = &args.output_spoiler_log {
        println!(
            "Writing spoiler log to {}",
            output_spoiler_log_path.display()
        );
        let spoiler_log = get_spoiler_log(&world, &randomization);
        let spoiler_str = serde_json::to_string_pretty(&spoiler_log)?;
        std::fs::write(output_spoiler_log_path, spoiler_str).with_context(|| {
            format!("Unable to write spoiler log to {}", output_spoiler_log_path.display())
        })?;
    }

    Ok(())
}
