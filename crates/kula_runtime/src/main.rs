//! Kula Runtime
//!
//! Loads a level into a [`World`], advances it a fixed number of frames and
//! optionally prints the resulting scope tree.
//!
//! ```bash
//! kula levels/arena.json
//! KULA_FRAMES=120 kula levels/arena.json
//! ```

mod boot_config;

use std::process::ExitCode;
use std::time::Duration;

use kula_core::GameClock;
use kula_gameplay::{load_level_file, World};

use crate::boot_config::RuntimeConfig;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = RuntimeConfig::load();
    config.print_summary();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &RuntimeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut world = World::new()?.with_parse_config(config.parse.clone());

    match &config.level {
        Some(path) => load_level_file(&mut world, path)?,
        None => log::warn!("No level given, running an empty world"),
    }

    if config.frame_ms == 0 {
        // Wall-clock frames
        let mut clock = GameClock::new();
        for _ in 0..config.frames {
            let mut time = *world.time();
            clock.update(&mut time);
            world.set_time(time);
            world.update()?;
        }
    } else {
        let step = Duration::from_millis(config.frame_ms);
        for _ in 0..config.frames {
            world.tick(step)?;
        }
    }
    log::info!(
        "Ran {} frames, game time {} ms",
        config.frames,
        world.time().total_ms()
    );

    if config.dump_json {
        println!("{}", serde_json::to_string_pretty(&world.to_json()?)?);
    }
    Ok(())
}
