use std::collections::HashMap;
use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rsusbmux_client::DeviceEvent;
use rsusbmux_frame::DeviceProperties;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct DeviceListOutput<'a> {
    devices: Vec<DeviceOutput<'a>>,
}

#[derive(Serialize)]
struct DeviceOutput<'a> {
    device_id: u32,
    properties: &'a DeviceProperties,
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event: &'a str,
    device_id: u32,
    properties: &'a DeviceProperties,
}

pub fn print_devices(devices: &HashMap<u32, DeviceProperties>, format: OutputFormat) {
    let mut ids: Vec<u32> = devices.keys().copied().collect();
    ids.sort_unstable();

    match format {
        OutputFormat::Json => {
            let out = DeviceListOutput {
                devices: ids
                    .iter()
                    .map(|id| DeviceOutput {
                        device_id: *id,
                        properties: &devices[id],
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE ID", "SERIAL", "CONNECTION"]);
            for id in &ids {
                let properties = &devices[id];
                table.add_row(vec![
                    id.to_string(),
                    prop_string(properties, "SerialNumber"),
                    prop_string(properties, "ConnectionType"),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for id in &ids {
                let properties = &devices[id];
                println!(
                    "device_id={} serial={} connection={}",
                    id,
                    prop_string(properties, "SerialNumber"),
                    prop_string(properties, "ConnectionType"),
                );
            }
        }
        OutputFormat::Raw => {
            for id in &ids {
                println!("{id}");
            }
        }
    }
}

pub fn print_event(event: &DeviceEvent, format: OutputFormat) {
    let (action, device_id, properties) = match event {
        DeviceEvent::Attached {
            device_id,
            properties,
        } => ("attached", *device_id, properties),
        DeviceEvent::Detached {
            device_id,
            properties,
        } => ("detached", *device_id, properties),
    };

    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                event: action,
                device_id,
                properties,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "{action} device_id={device_id} serial={}",
                prop_string(properties, "SerialNumber")
            );
        }
        OutputFormat::Raw => {
            println!("{action} {device_id}");
        }
    }
}

fn prop_string(properties: &DeviceProperties, key: &str) -> String {
    properties
        .get(key)
        .and_then(|value| value.as_string())
        .unwrap_or("-")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prop_string_falls_back_for_missing_keys() {
        let mut properties = plist::Dictionary::new();
        properties.insert("SerialNumber".to_string(), plist::Value::from("abc"));

        assert_eq!(prop_string(&properties, "SerialNumber"), "abc");
        assert_eq!(prop_string(&properties, "ConnectionType"), "-");
    }
}
