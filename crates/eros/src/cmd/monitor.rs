use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use eros_client::{ErosConfig, Inbox, TransportState};
use eros_frame::{Frame, MAX_CHANNEL};

use crate::cmd::{install_ctrlc_handler, open_endpoint, MonitorArgs};
use crate::exit::{eros_error, CliResult, SUCCESS};
use crate::output::{print_frame, print_state, print_summary, print_unrecognized, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

enum MonitorEvent {
    Frame(Frame),
    Unrecognized(Bytes),
    State(TransportState),
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ErosConfig::default().with_auto_reconnect(!args.no_reconnect);
    let eros = open_endpoint(&args.endpoint, config)?;

    let inbox: Inbox<MonitorEvent> = Inbox::unbounded();
    let channels = args
        .channels
        .clone()
        .unwrap_or_else(|| (0..=MAX_CHANNEL).collect());
    for channel in channels {
        let tx = inbox.sender();
        eros.attach_channel_callback(channel, move |frame: &Frame| {
            let _ = tx.send(MonitorEvent::Frame(frame.clone()));
        })
        .map_err(|err| eros_error("invalid channel", err))?;
    }
    if !args.no_fail {
        let tx = inbox.sender();
        eros.attach_fail_callback(move |bytes: &[u8]| {
            let _ = tx.send(MonitorEvent::Unrecognized(Bytes::copy_from_slice(bytes)));
        });
    }
    if !args.no_state {
        let tx = inbox.sender();
        eros.attach_state_callback(move |state: TransportState| {
            let _ = tx.send(MonitorEvent::State(state));
        });
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    tracing::info!(target = eros.target(), "monitoring");

    let mut frames = 0usize;
    while running.load(Ordering::SeqCst) {
        let Some(event) = inbox.recv_timeout(POLL_INTERVAL) else {
            if args.no_reconnect && eros.get_state() == TransportState::Dead {
                break;
            }
            continue;
        };
        match event {
            MonitorEvent::Frame(frame) => {
                print_frame(&frame, format);
                frames += 1;
                if args.count.is_some_and(|count| frames >= count) {
                    break;
                }
            }
            MonitorEvent::Unrecognized(bytes) => print_unrecognized(&bytes, format),
            MonitorEvent::State(state) => print_state(state, format),
        }
    }

    eros.close();
    if args.count.is_none() {
        print_summary(&eros.traffic_summary(), format);
    }
    tracing::info!(frames, "monitor stopped");
    Ok(SUCCESS)
}
