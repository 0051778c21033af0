use anyhow::{Context, Result};

mod api;
mod api_types;
mod cache;
mod config;
mod error;
mod logging;
mod render;
mod state;
mod static_data;
mod train;

use api::MetroApi;
use cache::DiskCache;
use config::Config;
use logging::log_info;
use render::MapRenderer;
use state::NetworkState;

fn main() -> Result<()> {
    let config = Config::default();

    run(&config).with_context(|| {
        format!("refresh failed, {} left untouched", config.output_map.display())
    })
}

fn run(config: &Config) -> Result<()> {
    // 1. Build the network and pull every platform's arrivals
    log_info("Loading Metro network...");
    let mut api = MetroApi::new(config)?;
    if let Some(cache) = &config.cache {
        api = api.with_cache(Box::new(DiskCache::open(&cache.dir, cache.ttl)?));
    }
    let network = NetworkState::initialize(&api, &config.network)?;

    // 2. Work out where everything is
    let markers = network.snapshot();
    log_info(&format!(
        "{} of {} trains placed on the map",
        markers.len(),
        network.trains.len()
    ));

    // 3. Draw
    MapRenderer::new(&config.base_map, &config.output_map).render(&markers)?;

    println!("{}", network);
    for train in network.trains.values() {
        println!("{}", train);
    }

    api.flush_cache()?;
    Ok(())
}
