//! Connect to one or more devices and log every state change they push.
//!
//! Usage: `cargo run --example monitor -- <device-id>@<host> [...]`
//!
//! Set `SHELLY_PASSWORD` for devices with authentication enabled.

use shelly_gen2::{
    ClientOptions, CollectionEvent, ComponentEvent, DeviceIdentifiers, ModelRegistry, Shellies,
    StaticDiscoverer, TransportEvent,
};

fn parse_target(arg: &str) -> DeviceIdentifiers {
    match arg.split_once('@') {
        Some((device_id, host)) => DeviceIdentifiers::new(device_id, host),
        None => DeviceIdentifiers::new(arg, arg),
    }
}

fn watch_device(device: shelly_gen2::Device) {
    for component in device.components() {
        let mut events = component.subscribe();
        let device_id = device.id().to_string();
        let key = component.key().to_string();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                match event {
                    ComponentEvent::Change { key: field, value } => {
                        tracing::info!("{} {}: {} = {}", device_id, key, field, value)
                    }
                    ComponentEvent::Signal(signal) => {
                        tracing::info!("{} {}: {:?}", device_id, key, signal)
                    }
                    other => tracing::debug!("{} {}: {:?}", device_id, key, other),
                }
            }
        });
    }

    let mut transport = device.subscribe();
    let device_id = device.id().to_string();
    tokio::spawn(async move {
        while let Ok(event) = transport.recv().await {
            match event {
                TransportEvent::Connect => tracing::info!("{} connected", device_id),
                TransportEvent::Disconnect {
                    code, reconnect_in, ..
                } => tracing::warn!(
                    "{} disconnected ({}), reconnect in {:?}",
                    device_id,
                    code,
                    reconnect_in
                ),
                _ => {}
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let targets: Vec<_> = std::env::args().skip(1).map(|arg| parse_target(&arg)).collect();
    if targets.is_empty() {
        eprintln!("usage: monitor <device-id>@<host> [...]");
        return Ok(());
    }

    let mut options = ClientOptions::default();
    if let Ok(password) = std::env::var("SHELLY_PASSWORD") {
        options = options.with_password(password);
    }

    let shellies = Shellies::new(ModelRegistry::builtin(), options);
    let mut events = shellies.subscribe();
    shellies.add_discoverer(StaticDiscoverer::new(targets));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event? {
                CollectionEvent::Added(device) => {
                    tracing::info!("Monitoring {} ({})", device.id(), device.model());
                    watch_device(device);
                }
                CollectionEvent::Skipped { device_id, reason } => {
                    tracing::warn!("Skipped {}: {:?}", device_id, reason)
                }
                CollectionEvent::Removed(device_id) => tracing::info!("Removed {}", device_id),
            },
        }
    }

    shellies.shutdown().await;
    Ok(())
}
