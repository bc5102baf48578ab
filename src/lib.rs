pub mod communication;
pub mod config;
pub mod control_system;
pub mod engine;
pub mod error;
pub mod global_variables;
pub mod models;
pub mod monitoring;
pub mod shared_data;

pub use config::EngineConfig;
pub use control_system::traffic_control_system::TrafficControlSystem;
pub use engine::controller::{ControlEngine, EngineHandle};
pub use error::ControlError;
