use std::env;
use std::time::Duration;

use neostat::{discover, DeviceSession, HubTarget, TemperatureUnit};

fn fmt_temp(value: Option<f64>, unit: TemperatureUnit) -> String {
    match value {
        Some(v) => format!("{v:.1}{unit}"),
        None => "-".to_string(),
    }
}

#[tokio::main]
async fn main() -> neostat::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let host = args.get(1).expect("usage: monitor <host> [port]");
    let port = args
        .get(2)
        .map(|p| p.parse().expect("port must be a number"))
        .unwrap_or(4242);

    let target = HubTarget::new(host.as_str(), port);
    println!("Discovering thermostats on {target}...");
    let devices = discover(&target).await?;
    if devices.is_empty() {
        println!("No thermostats found.");
        return Ok(());
    }

    let mut sessions = Vec::new();
    for descriptor in &devices {
        println!(
            "  {} ({}){}",
            descriptor.name,
            descriptor.unit,
            if descriptor.timeclock { " [timeclock]" } else { "" },
        );
        sessions.push(
            DeviceSession::builder(target.clone(), descriptor.name.as_str())
                .build()
                .await?,
        );
    }

    loop {
        for session in &mut sessions {
            if let Err(e) = session.refresh().await {
                eprintln!("[{}] refresh error: {e}", session.name());
                continue;
            }
            let state = session.state();
            println!(
                "[{}] {} -> {} | mode {:?} action {:?}{}{}",
                session.name(),
                fmt_temp(state.current_temperature, state.unit),
                fmt_temp(state.target_temperature, state.unit),
                state.hvac_mode,
                state.hvac_action,
                if state.on_hold { " | HOLD" } else { "" },
                if state.on_standby { " | FROST" } else { "" },
            );
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
}
