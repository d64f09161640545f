/// USB vendor id shared by every DAQFlex device.
pub const VENDOR_ID: u16 = 0x09DB;

/// Static facts about one DAQFlex product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: &'static str,
    pub product_id: u16,
    /// Largest raw ADC count the device reports.
    pub max_counts: u32,
    /// FPGA image the device needs before it accepts scans, if any.
    pub fpga_image: Option<&'static str>,
}

const USB_1608G_IMAGE: Option<&str> = Some("firmware/USB_1608G.rbf");

pub const DEVICES: &[DeviceDescriptor] = &[
    DeviceDescriptor { name: "USB-7202", product_id: 0x00F2, max_counts: 0xFFFF, fpga_image: None },
    DeviceDescriptor { name: "USB-7204", product_id: 0x00F0, max_counts: 0x0FFF, fpga_image: None },
    DeviceDescriptor { name: "USB-2001-TC", product_id: 0x00F9, max_counts: 1, fpga_image: None },
    DeviceDescriptor { name: "USB-1608FS-Plus", product_id: 0x00EA, max_counts: 0xFFFF, fpga_image: None },
    DeviceDescriptor { name: "USB-1608G", product_id: 0x0110, max_counts: 0xFFFF, fpga_image: USB_1608G_IMAGE },
    DeviceDescriptor { name: "USB-1608GX", product_id: 0x0111, max_counts: 0xFFFF, fpga_image: USB_1608G_IMAGE },
    DeviceDescriptor { name: "USB-1608GX-2AO", product_id: 0x0112, max_counts: 0xFFFF, fpga_image: USB_1608G_IMAGE },
    DeviceDescriptor { name: "USB-201", product_id: 0x0113, max_counts: 0x0FFF, fpga_image: None },
    DeviceDescriptor { name: "USB-204", product_id: 0x0114, max_counts: 0x0FFF, fpga_image: None },
    DeviceDescriptor { name: "USB-1208FS", product_id: 0x00E8, max_counts: 0x0FFF, fpga_image: None },
];

pub fn find_descriptor(product_id: u16) -> Option<&'static DeviceDescriptor> {
    DEVICES.iter().find(|device| device.product_id == product_id)
}

pub fn find_descriptor_by_name(name: &str) -> Option<&'static DeviceDescriptor> {
    DEVICES
        .iter()
        .find(|device| device.name.eq_ignore_ascii_case(name))
}
