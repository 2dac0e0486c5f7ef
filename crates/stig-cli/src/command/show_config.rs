use crate::config::Settings;

pub(crate) fn run() {
    let settings = Settings::from_env();
    let episode = settings.episode_config();

    println!("Episode:");
    println!(
        "  Control rate:     {} fps ({:?} per tick)",
        settings.frames_per_second, episode.tick_interval
    );
    println!("  Watchdog period:  {:?}", episode.watchdog_interval);
    println!("  Stuck timeout:    {:?}", episode.stuck_timeout);
    println!("  Countdown:        {:?}", episode.countdown);
    println!("  Lap timeout:      {:?}", episode.lap_timeout);
    println!("  Motion threshold: {}", settings.motion_threshold);
    println!("Training:");
    println!("  Mutation scale:   {}", settings.mutation_scale);
    match settings.seed {
        Some(seed) => println!("  Seed:             {seed}"),
        None => println!("  Seed:             (entropy)"),
    }
}
