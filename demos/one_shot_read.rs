// One-shot scan example
//
// Arms a scan, reads it back with the bounded retry policy and prints
// per-channel statistics.

use clap::Parser;
use daqflex_rs::{find_descriptor, ChannelMode, DaqDevice, NusbTransport, ScanConfig, VENDOR_ID};

#[derive(Parser)]
#[command(name = "one_shot_read")]
#[command(about = "Read one analog input scan from a DAQFlex device")]
struct Args {
    /// Serial number of the device (first DAQFlex device if omitted)
    #[arg(short, long)]
    serial: Option<String>,

    #[arg(long, default_value_t = 0)]
    low_channel: u8,

    #[arg(long, default_value_t = 1)]
    high_channel: u8,

    /// Scan rate in Hz
    #[arg(short, long, default_value_t = 1000)]
    rate: u32,

    /// Total samples across all channels
    #[arg(short = 'n', long, default_value_t = 1024)]
    samples: usize,

    /// Bipolar range in volts
    #[arg(long, default_value_t = 10)]
    range: u32,

    /// Use differential instead of single-ended inputs
    #[arg(long)]
    differential: bool,

    /// Print raw counts instead of volts
    #[arg(long)]
    raw: bool,

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
        .filter(|d| d.vendor_id() == VENDOR_ID && find_descriptor(d.product_id()).is_some())
        .find(|d| args.serial.is_none() || d.serial_number() == args.serial.as_deref())
        .ok_or("No DAQFlex device found")?;
    let descriptor = *find_descriptor(info.product_id()).ok_or("Unknown product id")?;
    println!("Connected to {}", descriptor.name);

    let interface = info.open()?.claim_interface(0)?;
    let transport = NusbTransport::new(interface, args.endpoint)?;
    let mut device = DaqDevice::new(transport, descriptor, args.packet_size);

    if !device.fpga_configured()? {
        return Err("FPGA is not configured, load the firmware first".into());
    }

    let mode = if args.differential {
        ChannelMode::Differential
    } else {
        ChannelMode::SingleEnded
    };
    let config = ScanConfig::new()
        .channels(args.low_channel, args.high_channel)
        .rate(args.rate)
        .samples(args.samples)
        .range(args.range)
        .mode(mode);

    let reading = device.one_shot_read(&config, !args.raw)?;
    println!(
        "Read {} channel(s) in {} attempt(s){}",
        reading.channel_count(),
        reading.attempts,
        if reading.degraded { " (incomplete)" } else { "" }
    );

    for channel in args.low_channel..=args.high_channel {
        if let Some(values) = reading.channel(channel) {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
            println!(
                "  AI{}: {} samples, min {:.4}, max {:.4}, mean {:.4}",
                channel,
                values.len(),
                min,
                max,
                mean
            );
        }
    }

    if !reading.degraded {
        println!("{}", reading.to_dataframe()?.head(Some(5)));
    }
    Ok(())
}
