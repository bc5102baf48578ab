use junction_control::communication::bus::{publish_state, serve_commands};
use junction_control::{ControlEngine, EngineConfig, TrafficControlSystem};
use tokio::join;

#[tokio::main]
async fn main() {
    env_logger::init();
    println!("Starting junction control engine...");

    let config = match EngineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return;
        }
    };

    let system = TrafficControlSystem::from_config(&config);
    let (handle, engine) = ControlEngine::spawn(system, &config);

    let command_handle = handle.clone();
    let command_url = config.amqp_url.clone();
    let commands = tokio::spawn(async move {
        if let Err(e) = serve_commands(command_handle, command_url).await {
            eprintln!("Error in command bridge: {}", e);
        }
    });

    let publish_handle = handle.clone();
    let publish_url = config.amqp_url.clone();
    let publisher = tokio::spawn(async move {
        if let Err(e) = publish_state(publish_handle, publish_url).await {
            eprintln!("Error in state publisher: {}", e);
        }
    });

    // Runs until the command consumer ends, then stops the engine.
    let _ = commands.await;
    handle.shutdown().await;
    let _ = join!(engine, publisher);
}
