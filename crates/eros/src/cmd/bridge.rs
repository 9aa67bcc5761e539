use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eros_client::{BridgeConfig, ErosConfig, PubSubBridge};
use serde::Serialize;

use crate::cmd::{install_ctrlc_handler, open_endpoint, BridgeArgs};
use crate::exit::{eros_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct BridgeOutput {
    target: String,
    publish: String,
    subscribe: String,
}

pub fn run(args: BridgeArgs, format: OutputFormat) -> CliResult<i32> {
    let eros = Arc::new(open_endpoint(&args.endpoint, ErosConfig::default())?);
    let config = BridgeConfig {
        host: args.host,
        port: args.port,
        inbound: args.inbound,
    };
    let mut bridge = PubSubBridge::bind(Arc::clone(&eros), config)
        .map_err(|err| eros_error("bridge bind failed", err))?;

    let out = BridgeOutput {
        target: eros.target().to_string(),
        publish: bridge.publish_addr().to_string(),
        subscribe: bridge.subscribe_addr().to_string(),
    };
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        _ => println!(
            "bridging {} publish={} subscribe={}",
            out.target, out.publish, out.subscribe
        ),
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    tracing::info!(publishers = bridge.publisher_count(), "stopping bridge");
    bridge.close();
    eros.close();
    Ok(SUCCESS)
}
