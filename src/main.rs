//! IPTV catalog - headless host
//! Loads every configured provider, keeps the EPG of the active one current,
//! and reloads on schedule until interrupted.

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use iptv_catalog::api::SearchHit;
use iptv_catalog::config::Settings;
use iptv_catalog::epg::format_time;
use iptv_catalog::http::UreqClient;
use iptv_catalog::Manager;

const LOOP_TICK: Duration = Duration::from_millis(250);

fn print_summary(manager: &Manager) {
    for provider in manager.providers() {
        println!("{}: {}", provider.name, provider.catalog().summary());
    }

    let Some(active) = manager.active_provider() else {
        return;
    };
    println!("Active provider: {}", active.name);

    let snapshot = manager.epg_snapshot();
    for channel in active.catalog().channels.iter().take(10) {
        let event = snapshot.get_current_event(channel);
        if event.length > 0 {
            println!(
                "  {} {}-{} {}",
                channel.name,
                format_time(event.start),
                format_time(event.end),
                event.title
            );
        }
    }
}

fn print_search(manager: &Manager, keyword: &str) {
    let Some(active) = manager.active_provider() else {
        return;
    };
    let catalog = active.catalog();
    match manager.search(keyword) {
        Ok(hits) => {
            for hit in hits {
                match hit {
                    SearchHit::Movie(movie) => println!("[movie]   {}", movie.name),
                    SearchHit::Channel(channel) => println!("[channel] {}", channel.name),
                    SearchHit::Serie(index) => {
                        if let Some(serie) = catalog.series.get(index) {
                            println!("[series]  {}", serie.name);
                        }
                    }
                }
            }
        }
        Err(e) => warn!("Invalid search `{}`: {}", keyword, e),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let once = args.iter().any(|a| a == "--once");
    let search = args
        .iter()
        .position(|a| a == "--search")
        .and_then(|i| args.get(i + 1).cloned());

    let settings = Settings::load();
    info!("Cache directory: {}", settings.cache_root().display());

    let mut manager = Manager::new(settings, Arc::new(UreqClient::new()));
    manager.start();

    let mut reported = false;
    loop {
        manager.wait(LOOP_TICK);
        if manager.is_loading() {
            reported = false;
            continue;
        }

        if !reported {
            reported = true;
            if let Some(name) = manager.active_provider().map(|p| p.name.clone()) {
                manager.download_logos(&name);
            }
            if let Some(ref keyword) = search {
                print_search(&manager, keyword);
            }
            if once {
                print_summary(&manager);
                break;
            }
        }
    }
}
