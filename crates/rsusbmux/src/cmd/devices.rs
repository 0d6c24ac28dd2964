use rsusbmux_client::connect_to_usbmux_with_config;

use crate::cmd::{parse_duration, DevicesArgs};
use crate::exit::{mux_error, CliResult, SUCCESS};
use crate::output::{print_devices, OutputFormat};

pub fn run(args: DevicesArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.mux.to_config()?;
    let settle = parse_duration(&args.settle)?;

    let mut mux = connect_to_usbmux_with_config(config)
        .map_err(|err| mux_error("connect failed", err))?;

    // The attached table fills asynchronously after the listen handshake;
    // drain events until a quiet period before taking the snapshot.
    let events = mux.events(false);
    while events.next_timeout(settle).is_ok() {}
    drop(events);

    let devices = mux.attached();
    print_devices(&devices, format);

    let _ = mux.close();
    Ok(SUCCESS)
}
