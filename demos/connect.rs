//! Example: Connect to a Paradox panel over an IP150 module and print what it knows.

use paradox_bridge::{Config, ElementType, Paradox};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::builder()
        .ip("192.168.0.100", 10000)
        .ip_password("paradox")
        .password(Some("0000"))
        .build();

    println!("Connecting to panel...");
    let paradox = Paradox::new(config)?;
    paradox.connect().await?;

    if let Some(info) = paradox.panel_info().await {
        println!("\n--- Panel ---");
        println!("  Model: {}", info.model);
        println!("  Firmware: {}", info.firmware);
        println!("  Serial: {}", info.serial_number);
    }

    // Labels are loaded during connect; a status poll fills in the attributes.
    let runner = paradox.clone();
    tokio::spawn(async move { runner.run().await });
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    let snapshot = paradox.snapshot().await;
    for ty in [ElementType::Partition, ElementType::Zone, ElementType::Pgm] {
        let Some(elements) = snapshot.get(ty.as_str()).and_then(|v| v.as_object()) else {
            continue;
        };
        println!("\n--- {} ({}) ---", ty.title(), elements.len());
        for (id, element) in elements {
            let label = element.get("label").and_then(|v| v.as_str()).unwrap_or_default();
            match ty {
                ElementType::Partition => println!(
                    "  {:>3}: {:20} state={}",
                    id,
                    label,
                    element.get("current_state").and_then(|v| v.as_str()).unwrap_or("?"),
                ),
                ElementType::Zone => println!(
                    "  {:>3}: {:20} open={} bypassed={}",
                    id,
                    label,
                    element.get("open").unwrap_or(&serde_json::Value::Null),
                    element.get("bypassed").unwrap_or(&serde_json::Value::Null),
                ),
                _ => println!("  {:>3}: {}", id, label),
            }
        }
    }

    println!("\nPress Ctrl+C to disconnect...");
    tokio::signal::ctrl_c().await?;
    paradox.disconnect().await;
    println!("Disconnected.");

    Ok(())
}
