use std::time::Duration;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use custom_class_cli::config::{parse_u16, DeviceConfig};
use custom_class_cli::driver::status_text;
use custom_class_cli::{ControlTransport, CustomClassDevice, LoopbackTransport, UsbTransport};
use custom_class_device::protocol::{DATA_BUFFER_SIZE, DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Talk to the custom-class example device", long_about = None)]
struct Args {
    /// Vendor id of the device
    #[clap(long, value_parser = parse_u16, default_value_t = DEFAULT_VENDOR_ID)]
    vid: u16,
    /// Product id of the device
    #[clap(long, value_parser = parse_u16, default_value_t = DEFAULT_PRODUCT_ID)]
    pid: u16,
    /// Only use a device with this manufacturer string
    #[clap(long)]
    vendor: Option<String>,
    /// Only use a device with this product string
    #[clap(long)]
    product: Option<String>,
    #[clap(long, default_value_t = 5000)]
    timeout_ms: u64,
    /// Talk to a simulated device instead of real hardware
    #[clap(long)]
    loopback: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(about = "Set the LEDs")]
    Setled {
        #[clap(value_parser = parse_u16)]
        value: u16,
    },
    #[clap(about = "Read the LEDs")]
    Getled,
    #[clap(about = "Ask the current status")]
    Readstat,
    #[clap(about = "Write the first 4 letters of the status string")]
    Writestat {
        #[clap(default_value = "3210")]
        status: String,
    },
    #[clap(about = "Send a text string", visible_alias = "in")]
    Send {
        #[clap(default_value = "3210")]
        text: String,
    },
    #[clap(about = "Receive data", visible_alias = "out")]
    Recv,
    #[clap(about = "Run driver reliability test")]
    Test {
        #[clap(short, long, default_value_t = 10)]
        iterations: usize,
    },
}

/// Every byte as a character followed by a space
fn format_line(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| format!("{} ", b as char)).collect()
}

fn run<T: ControlTransport>(
    device: &mut CustomClassDevice<T>,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Setled { value } => device.set_led(value)?,
        Command::Getled => println!("LED = 0x{:02x}", device.get_led()?),
        Command::Readstat => {
            let status = device.read_status()?;
            println!("cnt = {}", status.len());
            println!("stat = {}", status_text(&status));
        }
        Command::Writestat { status } => device.write_status(&status)?,
        Command::Send { text } => {
            let sent = device.send(text.as_bytes())?;
            info!("{} bytes sent", sent);
        }
        Command::Recv => {
            let data = device.recv(DATA_BUFFER_SIZE)?;
            info!("{} bytes received", data.len());
            for line in data.chunks(16) {
                println!("{}", format_line(line));
            }
        }
        Command::Test { iterations } => {
            let report = device.reliability_test(iterations, &mut rand::thread_rng());
            println!(
                "{} iterations, {} failed, {} transport errors, {} mismatched bytes",
                report.iterations,
                report.failed_iterations,
                report.transport_errors,
                report.mismatches.len()
            );
            if let Some(mismatch) = report.first_mismatch() {
                return Err(anyhow!(
                    "first mismatch in iteration {}: buffer[{}] {:02x} != {:02x}",
                    mismatch.iteration,
                    mismatch.index,
                    mismatch.sent,
                    mismatch.received
                ));
            }
            if !report.passed() {
                return Err(anyhow!("reliability test failed"));
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.loopback {
        let mut device = CustomClassDevice::new(LoopbackTransport::new());
        return run(&mut device, args.command);
    }

    let config = DeviceConfig {
        vendor_id: args.vid,
        product_id: args.pid,
        manufacturer: args.vendor,
        product: args.product,
        timeout: Duration::from_millis(args.timeout_ms),
    };
    let transport = UsbTransport::open(&config)?;
    let mut device = CustomClassDevice::new(transport);
    run(&mut device, args.command)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn recv_lines_end_with_a_space() {
        assert_eq!(format_line(b"AB"), "A B ");
        assert_eq!(format_line(b""), "");
    }
}
