use amiquip::{
    Connection, ConsumerMessage, ConsumerOptions, Exchange, QueueDeclareOptions,
    Result as AmiquipResult,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::communication::messages::ControlEvent;
use crate::global_variables::QUEUE_CONTROL_EVENTS;
use crate::shared_data::current_timestamp;

/// One row of the control audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: u64,
    pub kind: String,
    pub junction: String,
    pub incident: String,
    pub detail: String,
}

impl EventRecord {
    pub fn from_event(timestamp: u64, event: &ControlEvent) -> Self {
        let (junction, incident, detail) = match event {
            ControlEvent::PhaseChanged(t) => (
                t.junction.to_string(),
                String::new(),
                format!("{} -> {} ({}s)", t.from, t.to, t.time_left),
            ),
            ControlEvent::PhaseCommanded { junction, phase } => {
                (junction.to_string(), String::new(), phase.to_string())
            }
            ControlEvent::Preempted { junction } => {
                (junction.to_string(), String::new(), "NS-Green".to_string())
            }
            ControlEvent::ModeChanged(mode) => (
                mode.selected_junction.to_string(),
                String::new(),
                format!(
                    "emergency={} manual={}",
                    mode.emergency_mode, mode.manual_override
                ),
            ),
            ControlEvent::DetectionUpdated { junction } => {
                (junction.to_string(), String::new(), String::new())
            }
            ControlEvent::IncidentReported { incident } => {
                (String::new(), incident.0.to_string(), String::new())
            }
            ControlEvent::IncidentResolved(outcome) => (
                String::new(),
                outcome.incident.0.to_string(),
                outcome.action.clone(),
            ),
            ControlEvent::Notification { notice } => {
                (String::new(), String::new(), format!("{:?}", notice))
            }
            ControlEvent::RecommendationDecided { verdict } => {
                (String::new(), String::new(), verdict.as_str().to_string())
            }
            ControlEvent::RecommendationReplaced(recommendation) => (
                String::new(),
                String::new(),
                format!("{} ({}%)", recommendation.suggestion, recommendation.confidence),
            ),
        };
        Self {
            timestamp,
            kind: event.kind().to_string(),
            junction,
            incident,
            detail,
        }
    }
}

// Generic helper to log a record to a CSV file. The header is written only
// when the file is first created.
pub fn log_to_csv<T: Serialize>(filename: impl AsRef<Path>, record: &T) -> Result<(), Box<dyn Error>> {
    let file_exists = filename.as_ref().exists();
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(filename)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush()?;
    Ok(())
}

pub fn read_event_log(filename: impl AsRef<Path>) -> Result<Vec<EventRecord>, Box<dyn Error>> {
    let file = File::open(filename)?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Listens to `control_events` and appends each event to `csv_path`.
pub async fn listen_control_events(amqp_url: String, csv_path: String) -> Result<(), Box<dyn Error>> {
    tokio::task::spawn_blocking(move || -> AmiquipResult<()> {
        let mut connection = Connection::insecure_open(&amqp_url)?;
        let channel = connection.open_channel(None)?;
        let _exchange = Exchange::direct(&channel);
        let queue = channel.queue_declare(QUEUE_CONTROL_EVENTS, QueueDeclareOptions::default())?;
        let consumer = queue.consume(ConsumerOptions::default())?;
        log::info!("[Monitor] Listening for control events...");

        for message in consumer.receiver() {
            match message {
                ConsumerMessage::Delivery(delivery) => {
                    match serde_json::from_slice::<ControlEvent>(&delivery.body) {
                        Ok(event) => {
                            let record = EventRecord::from_event(current_timestamp(), &event);
                            if let Err(e) = log_to_csv(&csv_path, &record) {
                                eprintln!("Error logging control event: {}", e);
                            }
                        }
                        Err(e) => log::warn!("[Monitor] Unreadable control event: {}", e),
                    }
                    consumer.ack(delivery)?;
                }
                other => {
                    println!("Control events consumer ended: {:?}", other);
                    break;
                }
            }
        }
        connection.close()
    })
    .await??;
    Ok(())
}
