use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use ardulink::{
    LinkFactory, LinkParts, LinkRegistry, Links, Pin, PinListener, StreamConnection, protocol,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream},
    time::sleep,
};

#[derive(Debug, Clone, ardulink::LinkConfig)]
struct LoopbackConfig {
    #[config(choices = Self::protocols, description = "Protocol spoken by the simulated board")]
    proto: String,
    #[config(min = 0, max = 1023, description = "Value reported for every analog pin")]
    analog_value: u32,
}

impl LoopbackConfig {
    fn protocols(&self) -> Vec<String> {
        protocol::names()
    }
}

/// Opens an in-memory duplex whose far end plays a board.
struct LoopbackFactory;

impl LinkFactory for LoopbackFactory {
    type Config = LoopbackConfig;

    fn name(&self) -> &str {
        "loopback"
    }

    fn new_config(&self) -> LoopbackConfig {
        LoopbackConfig {
            proto: "ardulink2".to_string(),
            analog_value: 512,
        }
    }

    fn new_link(&self, config: LoopbackConfig) -> anyhow::Result<LinkParts> {
        let protocol = protocol::by_name(&config.proto)
            .ok_or_else(|| anyhow!("unknown protocol {}", config.proto))?;

        let (host, board) = tokio::io::duplex(1024);
        tokio::spawn(simulate_board(board, config.analog_value));

        let (reader, writer) = tokio::io::split(host);
        Ok(LinkParts {
            connection: Box::new(StreamConnection::spawn(reader, writer)?),
            processor: protocol.new_processor(),
        })
    }
}

/// Answers `alp://srla/<pin>` with one analog reading of that pin.
async fn simulate_board(stream: DuplexStream, analog_value: u32) {
    let (reader, mut writer) = tokio::io::split(stream);
    if writer.write_all(b"alp://ready/\n").await.is_err() {
        return;
    }

    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        println!("[Board] Received: {line}");
        if let Some(pin) = line.strip_prefix("alp://srla/") {
            let reading = format!("alp://ared/{pin}/{analog_value}\n");
            if writer.write_all(reading.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let mut registry = LinkRegistry::new();
    registry.register(LoopbackFactory)?;
    let links = Links::new(registry);

    let first = links.get_link("ardulink://loopback?analog_value=700")?;
    let second = links.get_link("ardulink://loopback?proto=ardulink2&analog_value=700")?;
    println!(
        "[Host] Both handles share one connection: {}",
        first.shares_connection_with(&second)
    );

    first.add_listener(Arc::new(PinListener::new(|pin, value| {
        println!("[First] {pin} changed to {value}");
    })))?;
    second.add_listener(Arc::new(PinListener::new(|pin, value| {
        println!("[Second] {pin} changed to {value}");
    })))?;

    // Only one start-listening command reaches the board.
    first.start_listening(Pin::analog(3))?;
    second.start_listening(Pin::analog(3))?;
    first.switch_digital_pin(13, true)?;

    sleep(Duration::from_millis(200)).await;

    first.close()?;
    println!("[Host] Cached links after first close: {}", links.cache().len());
    second.close()?;
    println!("[Host] Cached links after second close: {}", links.cache().len());

    Ok(())
}
