//! Drive a command channel against a simulated device on the other end of an
//! in-memory pipe. The device ACKs `status` and NACKs everything else.
//!
//! Run with: `cargo run --example command-channel`

use std::sync::Arc;
use std::time::Duration;

use eros::client::{request, CommandChannel, CommandFrame, TransportState};
use eros::frame::{Frame, FrameKind, TERMINAL};
use eros::transport::{LoopbackEnd, LoopbackTransport};
use eros::{Eros, ErosConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host_end, device_end) = LoopbackEnd::pair();
    let host = Arc::new(Eros::new(
        LoopbackTransport::new(host_end),
        ErosConfig::default(),
    )?);
    let device = Arc::new(Eros::new(
        LoopbackTransport::new(device_end),
        ErosConfig::default(),
    )?);
    for eros in [&host, &device] {
        if !eros.wait_for_state(TransportState::Connected, Duration::from_secs(2)) {
            return Err("loopback link did not come up".into());
        }
    }

    let responder = Arc::clone(&device);
    device.attach_channel_callback(TERMINAL, move |frame: &Frame| {
        let (kind, reply): (FrameKind, &[u8]) = match frame.payload.as_ref() {
            b"status" => (FrameKind::Ack, &b"ok"[..]),
            _ => (FrameKind::Nack, &b"unknown command"[..]),
        };
        let _ = responder.transmit_response(TERMINAL, kind, reply);
    })?;

    let response = request(&host, TERMINAL, b"status", Duration::from_secs(1))?;
    println!(
        "status -> {:?} {}",
        response.resp_type,
        String::from_utf8_lossy(&response.data)
    );

    let channel = CommandChannel::attach(Arc::clone(&host), TERMINAL, |response: CommandFrame| {
        println!(
            "async response -> {:?} {}",
            response.resp_type,
            String::from_utf8_lossy(&response.data)
        );
    })?;
    channel.send(b"reboot")?;
    std::thread::sleep(Duration::from_millis(200));
    channel.detach();

    device.close();
    host.close();
    Ok(())
}
