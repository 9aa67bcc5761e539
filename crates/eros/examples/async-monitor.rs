//! Print frames from a TCP device using the tokio codec.
//!
//! Run with: `cargo run --example async-monitor --features async -- 192.168.4.1:2000`

use eros::frame::{DecodeEvent, ErosCodec};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:2000".to_string());
    let stream = TcpStream::connect(&addr).await?;
    println!("connected to {addr}");

    let mut events = FramedRead::new(stream, ErosCodec::default());
    while let Some(event) = events.next().await {
        match event? {
            DecodeEvent::Frame { frame, wire_len } => println!(
                "channel={} kind={} size={} wire={} payload={}",
                frame.channel,
                frame.kind,
                frame.payload.len(),
                wire_len,
                String::from_utf8_lossy(&frame.payload)
            ),
            DecodeEvent::Unrecognized(bytes) => {
                println!("unrecognized {} bytes", bytes.len())
            }
        }
    }
    Ok(())
}
