// Continuous acquisition example
//
// Streams a scan through the background poller and reports throughput
// until the requested duration has passed.

use clap::Parser;
use daqflex_rs::{deinterleave, find_descriptor, DaqDevice, NusbTransport, ScanConfig, VENDOR_ID};
use std::io::Write;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "continuous_read")]
#[command(about = "Stream analog input data from a DAQFlex device")]
struct Args {
    #[arg(long, default_value_t = 0)]
    low_channel: u8,

    #[arg(long, default_value_t = 0)]
    high_channel: u8,

    /// Scan rate in Hz
    #[arg(short, long, default_value_t = 10_000)]
    rate: u32,

    /// How long to stream, in seconds
    #[arg(short, long, default_value_t = 5)]
    seconds: u64,

    /// Buffer capacity in packets
    #[arg(short, long, default_value_t = 1000)]
    buffer: usize,

    #[arg(long, default_value = "0x81", value_parser = parse_endpoint)]
    endpoint: u8,

    #[arg(long, default_value_t = 64)]
    packet_size: usize,
}

fn parse_endpoint(value: &str) -> Result<u8, std::num::ParseIntError> {
    u8::from_str_radix(value.trim_start_matches("0x"), 16)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let info = nusb::list_devices()?
        .find(|d| d.vendor_id() == VENDOR_ID && find_descriptor(d.product_id()).is_some())
        .ok_or("No DAQFlex device found")?;
    let descriptor = *find_descriptor(info.product_id()).ok_or("Unknown product id")?;
    let interface = info.open()?.claim_interface(0)?;
    let transport = NusbTransport::new(interface, args.endpoint)?;
    let mut device = DaqDevice::new(transport, descriptor, args.packet_size);

    let config = ScanConfig::new()
        .channels(args.low_channel, args.high_channel)
        .rate(args.rate)
        .continuous();
    device.start_continuous_scan(&config, args.buffer, None)?;
    println!("Streaming from {} at {} Hz", descriptor.name, args.rate);

    let start = Instant::now();
    let mut total = 0usize;
    while start.elapsed() < Duration::from_secs(args.seconds) {
        let data = device.get_new_bulk_data(true);
        total += data.len();

        let channels = deinterleave(&data, config.channel_count());
        if let Some(last) = channels.first().and_then(|samples| samples.last()) {
            print!("\r{} samples, last AI{} count {}   ", total, config.low_channel, last);
            std::io::stdout().flush()?;
        }
    }

    device.stop_continuous_scan()?;
    let remaining = device.get_new_bulk_data(false).len();
    println!(
        "\nDone: {} samples in {:.2}s ({} left in buffer)",
        total + remaining,
        start.elapsed().as_secs_f64(),
        remaining
    );
    Ok(())
}
