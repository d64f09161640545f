// Calibration example
//
// Shows the slope and offset the device reports for a range of channels
// and what they do to a few raw counts.

use daqflex_rs::{find_descriptor, ChannelMode, DaqDevice, NusbTransport, ScanConfig, VENDOR_ID};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("DAQFlex Calibration Example");
    println!("===========================\n");

    let info = nusb::list_devices()?
        .find(|d| d.vendor_id() == VENDOR_ID && find_descriptor(d.product_id()).is_some())
        .ok_or("No DAQFlex device found")?;
    let descriptor = *find_descriptor(info.product_id()).ok_or("Unknown product id")?;
    let interface = info.open()?.claim_interface(0)?;
    let mut device = DaqDevice::new(NusbTransport::new(interface, 0x81)?, descriptor, 64);
    println!("Connected to {} (max counts {})\n", descriptor.name, descriptor.max_counts);

    // calibration constants belong to the selected range, so arm it first
    let config = ScanConfig::new().channels(0, 3).range(10);
    device.configure(&config)?;

    for channel in config.low_channel..=config.high_channel {
        let calibration = device.calibration(channel, ChannelMode::SingleEnded, &config.range_code())?;
        let raw = [0.0, f64::from(descriptor.max_counts) / 2.0, f64::from(descriptor.max_counts)];
        let volts = device.scale_and_calibrate(
            &raw,
            config.min_voltage(),
            config.max_voltage(),
            calibration,
        );
        println!(
            "AI{}: slope {:.6}, offset {:.3} -> {:?} V",
            channel, calibration.slope, calibration.offset, volts
        );
    }

    Ok(())
}
