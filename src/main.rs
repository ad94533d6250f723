//! CLI entry point for the motion node.
//!
//! Subcommands:
//! - `run`: start the node: load the stored queue, open the modem serial
//!   port, boot the modem, and run the cooperative tick loop forever.
//! - `queue`: print the events currently held in non-volatile storage.
//!
//! # Usage
//!
//! ```bash
//! motion-node run
//! motion-node --config /etc/motion-node.toml queue
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use motion_node::config::NodeConfig;
use motion_node::error::NodeError;
use motion_node::storage::queue::IMAGE_LEN;
use motion_node::storage::{EventQueue, FileNv};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "motion-node")]
#[command(about = "Motion-sensing uplink node", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config/node.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node loop
    Run,

    /// List the events currently queued in storage
    Queue,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = NodeConfig::load_from(&cli.config)
        .map_err(NodeError::Config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    config.validate().map_err(NodeError::Configuration)?;

    match cli.command {
        Commands::Run => run(&config),
        Commands::Queue => list_queue(&config),
    }
}

fn open_queue(config: &NodeConfig) -> Result<EventQueue<FileNv>> {
    let store = FileNv::open(&config.storage.path, IMAGE_LEN)?;
    Ok(EventQueue::open(store))
}

#[cfg(feature = "modem_serial")]
fn run(config: &NodeConfig) -> Result<()> {
    use motion_node::link::modem::{LinkConfig, ModemLink};
    use motion_node::link::transport::SerialTransport;
    use motion_node::motion::SysfsLevel;
    use motion_node::node::Node;
    use motion_node::telemetry;
    use std::time::{Duration, Instant};
    use tracing::info;

    // Cooperative scheduler granularity.
    const TICK_PERIOD: Duration = Duration::from_millis(5);
    // How often the status line goes to the log.
    const STATUS_INTERVAL_MS: u32 = 10_000;

    telemetry::init_from_config(config).map_err(|e| anyhow::anyhow!(e))?;
    info!("{} starting", config.application.name);

    let queue = open_queue(config)?;
    info!(queued = queue.len(), "event storage loaded");

    let transport = SerialTransport::open(&config.modem.port, config.modem.baud_rate)?;
    let link = ModemLink::new(transport, LinkConfig::from(config));
    let level = SysfsLevel::new(config.motion.gpio_path.clone());
    let mut node = Node::new(queue, link, level);

    let started = Instant::now();
    node.power_on(started.elapsed().as_millis() as u32)?;

    let mut last_upload_ms = 0u32;
    let mut last_status_ms = 0u32;
    loop {
        let now_ms = started.elapsed().as_millis() as u32;
        node.tick(now_ms);

        if now_ms.wrapping_sub(last_upload_ms) >= config.uplink.interval_ms {
            node.request_upload();
            last_upload_ms = now_ms;
        }
        if now_ms.wrapping_sub(last_status_ms) >= STATUS_INTERVAL_MS {
            info!("{}", node.status());
            last_status_ms = now_ms;
        }

        std::thread::sleep(TICK_PERIOD);
    }
}

#[cfg(not(feature = "modem_serial"))]
fn run(_config: &NodeConfig) -> Result<()> {
    Err(motion_node::error::NodeError::SerialFeatureDisabled.into())
}

fn list_queue(config: &NodeConfig) -> Result<()> {
    let queue = open_queue(config)?;
    println!("{} stored event(s)", queue.len());
    for (i, event) in queue.snapshot().iter().enumerate() {
        println!(
            "{i}: duration_ms={} ts={}",
            event.duration_ms, event.timestamp
        );
    }
    Ok(())
}
