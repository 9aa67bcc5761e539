use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use eros_client::{sanitize, CommandFrame, ResponseType, TrafficSummary, TransportState};
use eros_frame::{channel_name, ChannelId, Frame};
use eros_transport::SerialDevice;
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
struct FrameOutput<'a> {
    event: &'a str,
    channel: u8,
    channel_name: &'a str,
    kind: &'a str,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

#[derive(Serialize)]
struct UnrecognizedOutput {
    event: &'static str,
    size: usize,
    text: String,
    timestamp: String,
}

#[derive(Serialize)]
struct StateOutput {
    event: &'static str,
    state: TransportState,
    timestamp: String,
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    channel: u8,
    channel_name: &'a str,
    resp_type: ResponseType,
    size: usize,
    data: String,
}

#[derive(Serialize)]
struct PortOutput<'a> {
    path: &'a str,
    vendor: &'a str,
    vid: Option<String>,
    pid: Option<String>,
    manufacturer: Option<&'a str>,
    product: Option<&'a str>,
    serial_number: Option<&'a str>,
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                event: "frame",
                channel: frame.channel,
                channel_name: channel_name(frame.channel),
                kind: frame.kind.as_str(),
                payload_size: frame.payload.len(),
                payload: payload_preview(frame.payload.as_ref()),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "KIND", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    channel_label(frame.channel),
                    frame.kind.to_string(),
                    frame.payload.len().to_string(),
                    payload_preview(frame.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channel={} ({}) kind={} size={} payload={}",
                frame.channel,
                channel_name(frame.channel),
                frame.kind,
                frame.payload.len(),
                payload_preview(frame.payload.as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(frame.payload.as_ref());
        }
    }
}

pub fn print_unrecognized(bytes: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&UnrecognizedOutput {
            event: "unrecognized",
            size: bytes.len(),
            text: sanitize(bytes),
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("unrecognized size={} text={}", bytes.len(), sanitize(bytes));
        }
        // Device text such as boot logs arrives unframed; pass it through.
        OutputFormat::Raw => print_raw(bytes),
    }
}

pub fn print_state(state: TransportState, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&StateOutput {
            event: "state",
            state,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("state={state}"),
        OutputFormat::Raw => {}
    }
}

pub fn print_response(channel: ChannelId, response: &CommandFrame, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ResponseOutput {
            channel,
            channel_name: channel_name(channel),
            resp_type: response.resp_type,
            size: response.data.len(),
            data: sanitize(&response.data),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "RESPONSE", "SIZE", "DATA"])
                .add_row(vec![
                    channel_label(channel),
                    response_label(response.resp_type).to_string(),
                    response.data.len().to_string(),
                    sanitize(&response.data),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "channel={} response={} size={} data={}",
            channel,
            response_label(response.resp_type),
            response.data.len(),
            sanitize(&response.data)
        ),
        OutputFormat::Raw => print_raw(&response.data),
    }
}

pub fn print_ports(devices: &[SerialDevice], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = devices
                .iter()
                .map(|device| PortOutput {
                    path: &device.path,
                    vendor: device.vendor_label(),
                    vid: device.usb.as_ref().map(|usb| format!("{:04x}", usb.vid)),
                    pid: device.usb.as_ref().map(|usb| format!("{:04x}", usb.pid)),
                    manufacturer: device.usb.as_ref().and_then(|usb| usb.manufacturer.as_deref()),
                    product: device.usb.as_ref().and_then(|usb| usb.product.as_deref()),
                    serial_number: device
                        .usb
                        .as_ref()
                        .and_then(|usb| usb.serial_number.as_deref()),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "VENDOR", "VID:PID", "PRODUCT"]);
            for device in devices {
                let ids = device
                    .usb
                    .as_ref()
                    .map(|usb| format!("{:04x}:{:04x}", usb.vid, usb.pid))
                    .unwrap_or_else(|| "-".to_string());
                let product = device
                    .usb
                    .as_ref()
                    .and_then(|usb| usb.product.clone())
                    .unwrap_or_else(|| "-".to_string());
                table.add_row(vec![
                    device.path.clone(),
                    device.vendor_label().to_string(),
                    ids,
                    product,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for device in devices {
                println!("{}", device.display_label());
            }
        }
    }
}

pub fn print_summary(summary: &TrafficSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "outgoing={} incoming={} unrecognized={}",
            summary.outgoing, summary.incoming, summary.unrecognized
        ),
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn channel_label(channel: ChannelId) -> String {
    format!("{channel} ({})", channel_name(channel))
}

fn response_label(resp_type: ResponseType) -> &'static str {
    match resp_type {
        ResponseType::Ack => "ACK",
        ResponseType::Nack => "NACK",
        ResponseType::Data => "DATA",
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
