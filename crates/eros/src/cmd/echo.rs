use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use eros_frame::{
    channel_name, ChannelId, DecodeEvent, Frame, FrameError, FrameKind, FrameReader, FrameWriter,
};
use eros_transport::is_timeout;

use crate::cmd::{install_ctrlc_handler, EchoArgs};
use crate::exit::{io_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const READ_TIMEOUT: Duration = Duration::from_millis(200);

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let listener = TcpListener::bind(&args.listen)
        .map_err(|err| io_error(&format!("bind {} failed", args.listen), err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| io_error("listener setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    tracing::info!(
        addr = %args.listen,
        command_channels = ?args.command_channels,
        "echo device listening"
    );

    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = serve(stream, peer, &args.command_channels, &running) {
                    tracing::warn!(%peer, error = %err, "connection ended with error");
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => return Err(io_error("accept failed", err)),
        }
    }

    Ok(SUCCESS)
}

/// Answer one client until it disconnects.
fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    command_channels: &[ChannelId],
    running: &AtomicBool,
) -> Result<(), FrameError> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let mut reader = FrameReader::new(stream.try_clone()?);
    let mut writer = FrameWriter::new(stream);
    tracing::debug!(%peer, "client connected");

    while running.load(Ordering::SeqCst) {
        match reader.read_event() {
            Ok(DecodeEvent::Frame { frame, .. }) => {
                let reply = reply_for(&frame, command_channels);
                tracing::info!(
                    channel = frame.channel,
                    channel_name = channel_name(frame.channel),
                    kind = %reply.kind,
                    size = frame.payload.len(),
                    "answering frame"
                );
                writer.write_frame(&reply)?;
            }
            Ok(DecodeEvent::Unrecognized(bytes)) => {
                tracing::warn!(%peer, size = bytes.len(), "ignoring unrecognized bytes");
            }
            Err(FrameError::Io(err)) if is_timeout(&err) => continue,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(err),
        }
    }

    tracing::debug!(%peer, "client disconnected");
    Ok(())
}

/// Command channels get ACK with the command echoed back, or NACK for an
/// empty command; every other channel gets its frame echoed unchanged.
fn reply_for(frame: &Frame, command_channels: &[ChannelId]) -> Frame {
    if !command_channels.contains(&frame.channel) {
        return frame.clone();
    }
    if frame.payload.is_empty() {
        Frame::with_kind(
            frame.channel,
            FrameKind::Nack,
            Bytes::from_static(b"empty command"),
        )
    } else {
        Frame::with_kind(frame.channel, FrameKind::Ack, frame.payload.clone())
    }
}
