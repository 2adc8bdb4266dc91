use daikin_dsiot::{DaikinClient, FanSpeed, HvacMode, MessageLogMode, SwingMode};
use std::env;

const USAGE: &str = "usage: control <edge_id> <on|off|cool|dry|fan|temp <c>|speed <label>|swing <both|horizontal|vertical|off>> [--no-log]";

#[tokio::main]
async fn main() -> daikin_dsiot::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let edge_id = args.get(1).expect(USAGE).clone();
    let command = args.get(2).expect(USAGE).as_str();
    let value = args.get(3).map(String::as_str);
    let no_log = args.iter().any(|a| a == "--no-log");

    let username = env::var("DAIKIN_USERNAME").expect("DAIKIN_USERNAME must be set");
    let password = env::var("DAIKIN_PASSWORD").expect("DAIKIN_PASSWORD must be set");

    let mut builder = DaikinClient::builder(username, password);
    if let (Ok(id), Ok(secret)) = (env::var("DAIKIN_CLIENT_ID"), env::var("DAIKIN_CLIENT_SECRET")) {
        builder = builder.client_credentials(id, secret);
    }
    if !no_log {
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = format!("logs/control_{ts}.ndjson");
        std::fs::create_dir_all("logs").ok();
        println!("Logging requests/responses to {path}");
        builder = builder.message_log(MessageLogMode::Full, path);
    }
    let mut client = builder.build()?;

    client.refresh().await?;
    let Some(unit) = client.unit(&edge_id) else {
        eprintln!("edge {edge_id} not found; known edges:");
        for unit in client.units().values() {
            eprintln!("  {} ({})", unit.edge_id, unit.name);
        }
        std::process::exit(1);
    };
    println!(
        "Before: [{}] on={} mode={:?} target={:?} fan={:?}",
        unit.name,
        unit.is_on(),
        unit.hvac_mode(),
        unit.target_temp_c,
        unit.fan_speed()
    );

    match command {
        "on" => client.turn_on(&edge_id).await?,
        "off" => client.turn_off(&edge_id).await?,
        "cool" => client.set_hvac_mode(&edge_id, Some(HvacMode::Cool)).await?,
        "dry" => client.set_hvac_mode(&edge_id, Some(HvacMode::Dry)).await?,
        "fan" => client.set_hvac_mode(&edge_id, Some(HvacMode::FanOnly)).await?,
        "temp" => {
            let temp: f64 = value.and_then(|v| v.parse().ok()).expect(USAGE);
            client.set_target_temperature(&edge_id, temp).await?
        }
        "speed" => {
            let speed = value.and_then(FanSpeed::from_label).unwrap_or_else(|| {
                let labels: Vec<&str> = FanSpeed::ALL.iter().map(FanSpeed::label).collect();
                panic!("unknown speed; one of: {}", labels.join(", "))
            });
            client.set_fan_speed(&edge_id, speed).await?
        }
        "swing" => {
            let swing = match value {
                Some("both") => SwingMode::Both,
                Some("horizontal") => SwingMode::Horizontal,
                Some("vertical") => SwingMode::Vertical,
                Some("off") => SwingMode::Off,
                _ => panic!("{USAGE}"),
            };
            client.set_swing_mode(&edge_id, swing).await?
        }
        _ => panic!("{USAGE}"),
    }
    println!("Command accepted");

    client.refresh().await?;
    if let Some(unit) = client.unit(&edge_id) {
        println!(
            "After:  [{}] on={} mode={:?} target={:?} fan={:?}",
            unit.name,
            unit.is_on(),
            unit.hvac_mode(),
            unit.target_temp_c,
            unit.fan_speed()
        );
    }
    Ok(())
}
