//! Example: Arm and disarm partitions.

use paradox_bridge::{Config, ElementType, Paradox};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::builder()
        .ip("192.168.0.100", 10000)
        .ip_password("paradox")
        .password(Some("0000"))
        .build();

    let paradox = Paradox::new(config)?;
    paradox.connect().await?;

    let runner = paradox.clone();
    tokio::spawn(async move { runner.run().await });

    // Give the first status poll a moment to land.
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    for id in 1..=2 {
        if let Some(part) = paradox.element(ElementType::Partition, &id.to_string()).await {
            println!(
                "Partition {}: {} (state={})",
                part.id,
                part.label,
                part.get("current_state").and_then(|v| v.as_str()).unwrap_or("?"),
            );
        }
    }

    // Arm partition 1 in stay mode
    println!("\nArming partition 1 in stay mode...");
    match paradox.control_partition("1", "arm_stay").await {
        Ok(true) => println!("Partition 1 armed (stay)"),
        Ok(false) => println!("Partition 1 arm command not accepted"),
        Err(e) => println!("Error arming partition 1: {}", e),
    }

    // Wait a bit then disarm
    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

    println!("\nDisarming partition 1...");
    match paradox.control_partition("1", "disarm").await {
        Ok(true) => println!("Partition 1 disarmed"),
        Ok(false) => println!("Partition 1 disarm command not accepted"),
        Err(e) => println!("Error disarming partition 1: {}", e),
    }

    paradox.disconnect().await;
    Ok(())
}
