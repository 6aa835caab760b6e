//! List HID interfaces belonging to connected Air glasses.

use airtrack::protocol::{HID_INTERFACE, PID, VID};

fn main() {
    env_logger::init();

    let api = match hidapi::HidApi::new() {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut found = 0;
    for d in api.device_list() {
        if d.vendor_id() != VID || d.product_id() != PID {
            continue;
        }
        found += 1;
        let imu = if d.interface_number() == HID_INTERFACE {
            "  <- IMU stream"
        } else {
            ""
        };
        println!(
            "interface {}  path={:?}  product={:?}{}",
            d.interface_number(),
            d.path(),
            d.product_string().unwrap_or(""),
            imu
        );
    }

    if found == 0 {
        println!("No Air glasses found (VID=3318 PID=0424)");
    }
}
