//! Wi-Fi client steering daemon.
//
// https://github.com/apsteer/apsteer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use log::{debug, info};
use structopt::StructOpt;

use apsteer::prelude::*;

#[derive(Debug, StructOpt)]
#[structopt(name = "apsteerd", about = "Cooperative Wi-Fi client steering daemon")]
struct Options {
    /// Increase debug level (repeat for more messages)
    #[structopt(short = "v", parse(from_occurrences))]
    verbose: u32,

    /// Output log messages via syslog instead of stderr
    #[structopt(short = "s")]
    syslog: bool,

    /// Connect to other instances on interface <iface> (repeatable)
    #[structopt(short = "i", name = "iface", number_of_values = 1)]
    interfaces: Vec<String>,
}

/// Wait granularity: sockets are polled, so never sleep long
const MAX_SLEEP_MS: u32 = 10;

fn main() -> anyhow::Result<()> {
    let opts = Options::from_args();

    let mut config = SteerConfig::default();
    config.debug_level = opts.verbose;
    config.syslog = opts.syslog;
    config.interfaces = opts.interfaces;

    let level = config.level_filter();
    if config.syslog {
        syslog::init(syslog::Facility::LOG_USER, level, Some("apsteerd"))
            .map_err(|e| anyhow!("syslog init failed: {}", e))?;
    } else {
        let _ = simplelog::TermLogger::init(
            level,
            simplelog::Config::default(),
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Auto,
        )
        .or_else(|_| simplelog::SimpleLogger::init(level, simplelog::Config::default()));
    }

    info!("starting apsteerd");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("error setting exit handler");

    let timer = SystemTimer::new();
    let mut controller = Controller::new(config, timer, NullBus::default(), UdpTransport::new())
        .map_err(|e| anyhow!("controller init failed: {:?}", e))?;

    debug!("entering main loop (peer id {:08x})", controller.local_id());

    while running.load(Ordering::SeqCst) {
        controller.run_once();

        let wait = controller
            .next_wakeup_ms()
            .unwrap_or(MAX_SLEEP_MS)
            .min(MAX_SLEEP_MS)
            .max(1);
        std::thread::sleep(Duration::from_millis(wait as u64));
    }

    info!("apsteerd stopped");
    Ok(())
}
