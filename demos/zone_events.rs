//! Example: Subscribe to the bus and print zone changes and panel events.

use paradox_bridge::{BusMessage, Config, ElementType, Paradox};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::builder()
        .serial("/dev/ttyUSB0", 9600)
        .password(Some("0000"))
        .build();

    let paradox = Paradox::new(config)?;
    let mut bus = paradox.subscribe();
    paradox.connect().await?;

    let runner = paradox.clone();
    let run = tokio::spawn(async move { runner.run().await });

    println!("Listening for zone events (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            message = bus.recv() => {
                match message {
                    Ok(BusMessage::Change(change)) if change.element_type == ElementType::Zone && !change.initial => {
                        println!("Zone {}: {} = {}", change.key, change.property, change.new_value);
                    }
                    Ok(BusMessage::Event(event)) => {
                        println!("{}", event);
                    }
                    Ok(BusMessage::RunState(state)) => {
                        println!("Run state: {}", state);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        println!("Missed {} messages", n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nDisconnecting...");
                paradox.disconnect().await;
                break;
            }
        }
    }

    if let Err(e) = run.await? {
        println!("Session ended: {}", e);
    }
    Ok(())
}
