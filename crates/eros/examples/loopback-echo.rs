//! Send a few packets through an in-memory echo link and print what comes back.
//!
//! Run with: `cargo run --example loopback-echo`

use std::time::Duration;

use eros::client::{Inbox, TransportState};
use eros::frame::{Frame, LOG, TERMINAL};
use eros::transport::LoopbackTransport;
use eros::{Eros, ErosConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let eros = Eros::new(LoopbackTransport::echo(), ErosConfig::default())?;
    if !eros.wait_for_state(TransportState::Connected, Duration::from_secs(2)) {
        return Err("loopback link did not come up".into());
    }

    let inbox: Inbox<Frame> = Inbox::unbounded();
    eros.attach_channel_callback(LOG, inbox.frame_handler())?;
    eros.attach_channel_callback(TERMINAL, inbox.frame_handler())?;

    eros.transmit_packet(LOG, b"boot complete")?;
    eros.transmit_packet(TERMINAL, b"help")?;

    for _ in 0..2 {
        match inbox.recv_timeout(Duration::from_secs(1)) {
            Some(frame) => println!(
                "channel {} ({}): {}",
                frame.channel,
                eros::frame::channel_name(frame.channel),
                String::from_utf8_lossy(&frame.payload)
            ),
            None => return Err("no echo received".into()),
        }
    }

    let summary = eros.traffic_summary();
    println!(
        "outgoing={} incoming={} unrecognized={}",
        summary.outgoing, summary.incoming, summary.unrecognized
    );
    eros.close();
    Ok(())
}
