pub mod incident_workflow;
pub mod metrics;
pub mod override_arbiter;
pub mod phase_scheduler;
pub mod recommendation_engine;
pub mod registry;
pub mod traffic_control_system;
