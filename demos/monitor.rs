use daikin_dsiot::{DaikinClient, UPDATE_INTERVAL};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> daikin_dsiot::Result<()> {
    tracing_subscriber::fmt::init();

    let username = env::var("DAIKIN_USERNAME").expect("DAIKIN_USERNAME must be set");
    let password = env::var("DAIKIN_PASSWORD").expect("DAIKIN_PASSWORD must be set");

    let mut builder = DaikinClient::builder(username, password)
        .on_event(|event| {
            println!("{event:?}");
        })
        .on_snapshot(|unit| {
            let temp = |t: Option<f64>| t.map_or("--".to_string(), |t| format!("{t:.1}\u{00b0}C"));
            println!(
                "[{}] {} | mode: {:?} | target: {} | room: {} | humidity: {} | fan: {:?} | swing: {:?}",
                unit.name,
                if unit.is_on() { "on" } else { "off" },
                unit.hvac_mode(),
                temp(unit.target_temp_c),
                temp(unit.room_temp_c),
                unit.room_humidity_percent
                    .map_or("--".to_string(), |h| format!("{h}%")),
                unit.fan_speed(),
                unit.swing_mode(),
            );
        });

    if let (Ok(id), Ok(secret)) = (env::var("DAIKIN_CLIENT_ID"), env::var("DAIKIN_CLIENT_SECRET")) {
        builder = builder.client_credentials(id, secret);
    }

    let mut client = builder.build()?;

    println!("Logging in...");
    client.login().await?;
    if let (Some(id), Some(secret)) = (client.client_id(), client.client_secret()) {
        println!("Client credentials: DAIKIN_CLIENT_ID={id} DAIKIN_CLIENT_SECRET={secret}");
    }
    println!("Logged in. Polling every {}s...", UPDATE_INTERVAL.as_secs());

    loop {
        match client.refresh().await {
            Ok(units) if units.is_empty() => println!("No units on this account"),
            Ok(_) => {}
            Err(e) => {
                eprintln!("Refresh error: {e}");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        }
        tokio::time::sleep(UPDATE_INTERVAL).await;
    }
}
