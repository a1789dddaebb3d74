use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use log::{error, info};

use bgt60trxx_linux::regs::REG_CHIP_ID;
use bgt60trxx_linux::{Bgt60trxx, PlatformHandle};

#[derive(Parser)]
#[command(name = "bgt60-info")]
#[command(about = "Detect a XENSIV BGT60TRxx radar sensor and report its state")]
struct Args {
    /// SPI device path
    #[arg(short = 's', long = "spi-device", default_value = "/dev/spidev0.0")]
    spi_device: String,
    /// GPIO chip path
    #[arg(short = 'g', long = "gpio-chip", default_value = "/dev/gpiochip0")]
    gpio_chip: String,
    /// Reset GPIO line offset
    #[arg(short = 'r', long = "reset-offset", default_value_t = 18)]
    reset_offset: u32,
    /// Chip-select GPIO line offset
    #[arg(short = 'c', long = "cs-offset", default_value_t = 24)]
    cs_offset: u32,
}

fn main() -> Result<()> {
    env_logger::init(); // RUST_LOG=debug for ioctl-level tracing
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return Ok(());
        }
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    // SIGINT/SIGTERM trip the token; the poll loop below watches it.
    let running = Arc::new(AtomicBool::new(true));
    let token = Arc::clone(&running);
    ctrlc::set_handler(move || {
        token.store(false, Ordering::SeqCst);
        info!("Shutdown requested");
    })
    .context("failed to install signal handler")?;

    println!("XENSIV BGT60TRxx sensor info");
    println!("  SPI device: {}", args.spi_device);
    println!("  GPIO chip:  {}", args.gpio_chip);
    println!("  Reset GPIO: {}", args.reset_offset);
    println!("  CS GPIO:    {}", args.cs_offset);

    let iface = PlatformHandle::open(
        &args.spi_device,
        &args.gpio_chip,
        args.reset_offset,
        args.cs_offset,
    )
    .context("failed to initialize the platform interface")?;

    // Normal-speed mode; the bus is configured for 10 MHz.
    let mut radar = Bgt60trxx::new(iface, false).context("failed to initialize the sensor")?;

    println!("Device type: {}", radar.device());
    println!("FIFO size:   {} samples", radar.fifo_size());

    match radar.get_reg(REG_CHIP_ID) {
        Ok(chip_id) => println!("Chip ID:     0x{:08X}", chip_id),
        Err(e) => error!("Failed to read chip ID: {}", e),
    }
    match radar.fifo_status() {
        Ok(status) => println!("FIFO status: 0x{:08X}", status.raw),
        Err(e) => error!("Failed to read FIFO status: {}", e),
    }

    println!("Sensor is ready. Press Ctrl+C to exit...");
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_secs(1));
    }

    info!("Cleaning up");
    radar.close();
    Ok(())
}
