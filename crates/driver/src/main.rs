//! aes-regtool
//!
//! Command-line front end for AuthenTec sensor bring-up: list sensors,
//! preview how a register table is batched, push it to the device, and
//! decode raw frames into PGM images.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use common::{create_transfer_bridge, setup_logging};
use driver::config::DriverConfig;
use driver::table::load_table;
use driver::usb::{SensorDevice, list_sensors, spawn_usb_worker};
use protocol::{Image, pack_batch, plan_batches};
use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "aes-regtool")]
#[command(
    author,
    version,
    about = "AuthenTec sensor register and image tool"
)]
#[command(long_about = "
Bring-up tool for AuthenTec swipe fingerprint sensors.
Writes register tables in batched bulk transfers and decodes raw frames.

EXAMPLES:
    # List connected sensors
    aes-regtool list

    # Show how a register table will be split into transfers
    aes-regtool plan --table init.toml

    # Write a register table to the first matching sensor
    aes-regtool write --table init.toml

    # Decode a raw 128x8 frame into a PGM image
    aes-regtool assemble --input frame.bin --width 128 --height 8 --output frame.pgm

CONFIGURATION:
    The tool looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/aeslib/driver.toml
    3. /etc/aeslib/driver.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List sensors matching the configured filter
    List,

    /// Print the transfers a register table would be sent as
    Plan {
        /// Register table (TOML)
        #[arg(short, long, value_name = "PATH")]
        table: PathBuf,
    },

    /// Write a register table to the sensor
    Write {
        /// Register table (TOML)
        #[arg(short, long, value_name = "PATH")]
        table: PathBuf,
    },

    /// Decode a raw frame into a PGM image
    Assemble {
        /// Raw frame as read from the sensor
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,

        /// Frame width in pixels
        #[arg(long)]
        width: usize,

        /// Frame height in pixels (must be even)
        #[arg(long)]
        height: usize,

        /// Output PGM file
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = DriverConfig::default();
        let path = DriverConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        DriverConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        DriverConfig::load_or_default()
    };

    // Use CLI log level if specified, otherwise use config value
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.driver.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("aes-regtool v{}", env!("CARGO_PKG_VERSION"));

    let Some(command) = args.command else {
        return Err(anyhow!("No command given, see --help"));
    };

    match command {
        Command::List => list_mode(&config),
        Command::Plan { table } => plan_mode(&config, &table),
        Command::Write { table } => write_mode(&config, &table).await,
        Command::Assemble {
            input,
            width,
            height,
            output,
        } => assemble_mode(&input, width, height, &output),
    }
}

/// List sensors and exit
fn list_mode(config: &DriverConfig) -> Result<()> {
    let context = rusb::Context::new().context("Failed to create USB context")?;
    let sensors =
        list_sensors(&context, &config.usb.filter).context("Failed to enumerate USB devices")?;

    if sensors.is_empty() {
        println!("No sensors matching {} found.", config.usb.filter);
        return Ok(());
    }

    println!("Found {} sensor(s):\n", sensors.len());
    for sensor in sensors {
        println!(
            "  [{}] {:04x}:{:04x} - {} {}",
            sensor.address,
            sensor.vendor_id,
            sensor.product_id,
            sensor
                .manufacturer
                .as_deref()
                .unwrap_or("Unknown Manufacturer"),
            sensor.product.as_deref().unwrap_or("Unknown Product")
        );
    }

    Ok(())
}

/// Show the batching of a register table
fn plan_mode(config: &DriverConfig, table: &std::path::Path) -> Result<()> {
    let writes = load_table(table)?;
    let batch = config.usb.batch_config()?;

    let mut transfers = 0;
    for range in plan_batches(&writes, batch.max_batch) {
        let payload = pack_batch(&writes[range.clone()]);
        let hex: Vec<String> = payload.iter().map(|b| format!("{:02x}", b)).collect();
        println!(
            "  #{:<3} writes {:>3}..{:<3} ({:>2} bytes) {}",
            transfers,
            range.start,
            range.end,
            payload.len(),
            hex.join(" ")
        );
        transfers += 1;
    }

    println!(
        "\n{} write(s) in {} transfer(s) to endpoint {:#04x}",
        writes.iter().filter(|w| !w.is_barrier()).count(),
        transfers,
        batch.endpoint
    );
    Ok(())
}

/// Write a register table to the first matching sensor
async fn write_mode(config: &DriverConfig, table: &std::path::Path) -> Result<()> {
    let writes = load_table(table)?;
    let batch = config.usb.batch_config()?;

    let context = rusb::Context::new().context("Failed to create USB context")?;
    let sensor = SensorDevice::open(&context, &config.usb.filter, config.usb.interface)
        .context("Failed to open sensor")?;
    let address = sensor.address();

    let (mut bridge, worker) = create_transfer_bridge(config.usb.queue_depth);
    let worker_handle =
        spawn_usb_worker(sensor, address, worker).context("Failed to spawn USB worker thread")?;

    info!("Writing {} register(s) to {}", writes.len(), address);
    let result = driver::write_registers(&mut bridge, address, writes, batch).await;

    // Cleanup: Shutdown USB worker thread
    if let Err(e) = bridge.shutdown().await {
        error!("Error shutting down USB worker: {:#}", e);
    }
    drop(bridge);

    // Joining hands the sensor back; dropping it releases the interface
    match worker_handle.join() {
        Ok(sensor) => drop(sensor),
        Err(e) => error!("USB worker thread panicked: {:?}", e),
    }

    result.map_err(|e| anyhow!("Register write failed ({}): {}", e.errno(), e))?;
    println!("Wrote register table {} to {}", table.display(), address);
    Ok(())
}

/// Decode a raw frame file into a PGM image
fn assemble_mode(
    input: &std::path::Path,
    width: usize,
    height: usize,
    output: &std::path::Path,
) -> Result<()> {
    let raw = fs::read(input)
        .with_context(|| format!("Failed to read raw frame: {}", input.display()))?;

    let image = Image::assemble(&raw, width, height).context("Failed to assemble image")?;

    let file = fs::File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    image
        .write_pgm(BufWriter::new(file))
        .with_context(|| format!("Failed to write image: {}", output.display()))?;

    println!(
        "Wrote {}x{} image to {}",
        image.width,
        image.height,
        output.display()
    );
    Ok(())
}
