use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rsusbmux_client::{connect_to_usbmux_with_config, MuxError};

use crate::cmd::WatchArgs;
use crate::exit::{mux_error, CliError, CliResult, SUCCESS};
use crate::output::{print_event, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.mux.to_config()?;

    let mut mux = connect_to_usbmux_with_config(config)
        .map_err(|err| mux_error("connect failed", err))?;
    let events = mux.events(args.include_existing);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        match events.next_timeout(POLL_INTERVAL) {
            Ok(event) => {
                print_event(&event, format);
                printed = printed.saturating_add(1);
                if let Some(count) = args.count {
                    if printed >= count {
                        break;
                    }
                }
            }
            Err(MuxError::Timeout { .. }) => continue,
            Err(err) => {
                drop(events);
                let _ = mux.close();
                return Err(mux_error("event stream failed", err));
            }
        }
    }

    drop(events);
    let _ = mux.close();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
