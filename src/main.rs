use junction_control::{ControlEngine, EngineConfig, TrafficControlSystem};
use tokio::time::{interval, Duration};

// Runs the control engine without a message bus and logs a summary of the
// selected junction every few seconds. Stop with Ctrl-C.
#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match EngineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return;
        }
    };

    let system = TrafficControlSystem::from_config(&config);
    let (handle, engine) = ControlEngine::spawn(system, &config);

    let mut report = interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = report.tick() => {
                let snapshot = handle.snapshot();
                for view in &snapshot.junctions {
                    log::info!(
                        "{}: {} {}s left, density {:.1} ({:?}), wait {:.1}s",
                        view.state.name,
                        view.state.phase,
                        view.state.time_left,
                        view.state.density,
                        view.density_level,
                        view.state.wait_time
                    );
                }
                log::info!(
                    "Active incidents: {} | emergency mode {} | manual override {}",
                    snapshot.active_incident_count,
                    snapshot.mode.emergency_mode,
                    snapshot.mode.manual_override
                );
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down...");
                handle.shutdown().await;
                break;
            }
        }
    }

    if let Err(e) = engine.await {
        eprintln!("Control engine task failed: {}", e);
    }
}
