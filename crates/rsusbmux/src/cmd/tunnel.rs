use std::io;
use std::thread;

use rsusbmux_client::connect_to_usbmux_with_config;

use crate::cmd::{parse_duration, TunnelArgs};
use crate::exit::{io_error, mux_error, CliResult, SUCCESS};

pub fn run(args: TunnelArgs) -> CliResult<i32> {
    let config = args.mux.to_config()?;
    let max_wait = parse_duration(&args.max_wait)?;

    let mut mux = connect_to_usbmux_with_config(config)
        .map_err(|err| mux_error("connect failed", err))?;

    let tunnel = match args.device {
        Some(device_id) => mux.connect_to_device(device_id, args.port),
        None => mux.connect_to_first_device(args.port, max_wait),
    }
    .map_err(|err| mux_error("tunnel failed", err))?;

    let (mut reader, mut writer) = tunnel.into_split();

    // stdin -> device. The pump dies with the process once the device side
    // closes and main returns.
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let _ = io::copy(&mut stdin, &mut writer);
        let _ = writer.shutdown_write();
    });

    let mut stdout = io::stdout();
    io::copy(&mut reader, &mut stdout).map_err(|err| io_error("tunnel read failed", err))?;

    let _ = mux.close();
    Ok(SUCCESS)
}
