use junction_control::global_variables::CONTROL_EVENTS_CSV;
use junction_control::monitoring::event_log::listen_control_events;
use junction_control::EngineConfig;

#[tokio::main]
async fn main() {
    env_logger::init();
    println!("Starting junction monitor...");

    let amqp_url = match EngineConfig::load() {
        Ok(config) => config.amqp_url,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return;
        }
    };

    if let Err(e) = listen_control_events(amqp_url, CONTROL_EVENTS_CSV.to_string()).await {
        eprintln!("Monitor error: {}", e);
    }
}
