//! Wait for a device to attach, then open a tunnel to it.
//!
//! Run with a usbmux daemon available:
//!
//! ```sh
//! cargo run --example wait-and-connect
//! ```

use std::io::Read;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mux = rsusbmux::client::connect_to_usbmux()?;

    println!("waiting for a device...");
    let device_id = mux.wait_for_attach(Some(Duration::from_secs(10)))?;
    println!("device {device_id} attached");

    let mut tunnel = mux.connect_to_device(device_id, 5000)?;
    let mut buf = [0u8; 64];
    let n = tunnel.read(&mut buf)?;
    println!("read {n} bytes from the device");

    Ok(())
}
