// RabbitMQ bridge between the control engine and the dashboard.
//
// amiquip is blocking, so each bridge owns its connection on a blocking
// thread and talks to the engine through the handle.

use amiquip::{
    Connection, ConsumerMessage, ConsumerOptions, Exchange, Publish, QueueDeclareOptions,
    Result as AmiquipResult,
};
use std::error::Error;
use tokio::sync::{broadcast, mpsc};

use crate::communication::messages::{CommandReply, CommandRequest};
use crate::engine::controller::EngineHandle;
use crate::global_variables::{
    QUEUE_COMMAND_RESULTS, QUEUE_CONTROL_EVENTS, QUEUE_JUNCTION_COMMANDS,
    QUEUE_JUNCTION_SNAPSHOTS,
};

/// Consumes `junction_commands`, runs each command on the engine and
/// publishes the reply to `command_results`.
pub async fn serve_commands(handle: EngineHandle, amqp_url: String) -> Result<(), Box<dyn Error>> {
    tokio::task::spawn_blocking(move || -> AmiquipResult<()> {
        let mut connection = Connection::insecure_open(&amqp_url)?;
        let channel = connection.open_channel(None)?;
        let exchange = Exchange::direct(&channel);
        let queue = channel.queue_declare(QUEUE_JUNCTION_COMMANDS, QueueDeclareOptions::default())?;
        channel.queue_declare(QUEUE_COMMAND_RESULTS, QueueDeclareOptions::default())?;
        let consumer = queue.consume(ConsumerOptions::default())?;
        log::info!("[Bus] Waiting for commands on '{}'...", QUEUE_JUNCTION_COMMANDS);

        for message in consumer.receiver() {
            match message {
                ConsumerMessage::Delivery(delivery) => {
                    match serde_json::from_slice::<CommandRequest>(&delivery.body) {
                        Ok(request) => {
                            log::debug!("[Bus] Command {}: {:?}", request.request_id, request.command);
                            let result = handle
                                .execute_blocking(request.command)
                                .map_err(|e| e.to_string());
                            let reply = CommandReply {
                                request_id: request.request_id,
                                result,
                            };
                            match serde_json::to_string(&reply) {
                                Ok(json) => exchange
                                    .publish(Publish::new(json.as_bytes(), QUEUE_COMMAND_RESULTS))?,
                                Err(e) => log::warn!("[Bus] Could not encode reply: {}", e),
                            }
                        }
                        Err(e) => log::warn!("[Bus] Dropping malformed command: {}", e),
                    }
                    consumer.ack(delivery)?;
                }
                other => {
                    log::info!("[Bus] Command consumer ended: {:?}", other);
                    break;
                }
            }
        }
        connection.close()
    })
    .await??;
    Ok(())
}

struct Outbound {
    queue: &'static str,
    body: String,
}

/// Publishes every control event to `control_events` and every new snapshot
/// to `junction_snapshots` until the engine stops.
pub async fn publish_state(handle: EngineHandle, amqp_url: String) -> Result<(), Box<dyn Error>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let mut events = handle.subscribe_events();
    let mut snapshots = handle.watch_snapshots();
    let forwarder = tokio::spawn(async move {
        loop {
            let outbound = tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => serde_json::to_string(&event).map(|body| Outbound {
                        queue: QUEUE_CONTROL_EVENTS,
                        body,
                    }),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("[Bus] Event publisher lagged, {} events dropped", missed);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    serde_json::to_string(&snapshot).map(|body| Outbound {
                        queue: QUEUE_JUNCTION_SNAPSHOTS,
                        body,
                    })
                }
            };
            match outbound {
                Ok(outbound) => {
                    if tx.send(outbound).is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("[Bus] Could not encode outbound message: {}", e),
            }
        }
    });

    tokio::task::spawn_blocking(move || -> AmiquipResult<()> {
        let mut connection = Connection::insecure_open(&amqp_url)?;
        let channel = connection.open_channel(None)?;
        let exchange = Exchange::direct(&channel);
        channel.queue_declare(QUEUE_CONTROL_EVENTS, QueueDeclareOptions::default())?;
        channel.queue_declare(QUEUE_JUNCTION_SNAPSHOTS, QueueDeclareOptions::default())?;
        log::info!("[Bus] Publishing control events and snapshots");

        while let Some(outbound) = rx.blocking_recv() {
            exchange.publish(Publish::new(outbound.body.as_bytes(), outbound.queue))?;
        }
        connection.close()
    })
    .await??;

    forwarder.abort();
    Ok(())
}
