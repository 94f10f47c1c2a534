//! Event dispatcher (spec §4.5): routes a mutated event to the
//! pipe/tcp/udp/amqp/extension transports. The in-flight counter of §9's
//! design note is realized as an async wait-group ([`WaitGroup`]) rather
//! than the source's polled counter.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Notify;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::broker::Broker;
use crate::config::{HandlerConfig, Registry, ResolvedHandler};
use crate::error::HandlerError;
use crate::model::DispatchEvent;
use crate::process::execute_command;

use super::mutator::mutate;
use super::resolver::{event_handlers, ExpandedHandler};

const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 10;

/// An async wait-group, replacing the source's polled in-flight counter
/// (spec §9): completes once every dispatch that incremented it has
/// decremented back to zero.
#[derive(Clone, Default)]
pub struct WaitGroup {
    inner: Arc<WaitGroupInner>,
}

#[derive(Default)]
struct WaitGroupInner {
    count: Mutex<usize>,
    idle: Notify,
}

impl WaitGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn inc(&self) {
        *self.inner.count.lock().await += 1;
    }

    pub async fn dec(&self) {
        let mut count = self.inner.count.lock().await;
        *count -= 1;
        if *count == 0 {
            self.inner.idle.notify_waiters();
        }
    }

    /// Wait until the counter reaches zero (spec §4.9 stop sequence).
    pub async fn wait_idle(&self) {
        loop {
            if *self.inner.count.lock().await == 0 {
                return;
            }
            self.inner.idle.notified().await;
        }
    }
}

/// `handle_event` (spec §4.5). Handlers are dispatched independently and
/// concurrently; one handler's failure never blocks or double-decrements
/// another's slot in `wait_group`.
pub async fn handle_event(
    registry: Arc<Registry>,
    broker: Arc<dyn Broker>,
    wait_group: WaitGroup,
    event: DispatchEvent,
) {
    let handlers = event_handlers(&registry, &event);
    let event = Arc::new(event);

    for handler in handlers {
        let registry = registry.clone();
        let broker = broker.clone();
        let wait_group = wait_group.clone();
        let event = event.clone();

        wait_group.inc().await;
        tokio::spawn(async move {
            dispatch_one(&registry, &broker, &handler, &event).await;
            wait_group.dec().await;
        });
    }
}

async fn dispatch_one(registry: &Registry, broker: &Arc<dyn Broker>, handler: &ExpandedHandler, event: &DispatchEvent) {
    let mutator_name = match &handler.resolved {
        ResolvedHandler::Config(cfg) => cfg.common().mutator.clone(),
        ResolvedHandler::Extension(_) => None,
    };

    let payload = match mutate(registry, mutator_name.as_deref(), event).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(handler = handler.name.as_str(), error = %e, "mutator failed, skipping handler");
            return;
        }
    };

    let result = match &handler.resolved {
        ResolvedHandler::Config(HandlerConfig::Pipe { command, .. }) => dispatch_pipe(&handler.name, command, &payload).await,
        ResolvedHandler::Config(HandlerConfig::Tcp { socket, .. }) => {
            dispatch_tcp(&handler.name, &socket.host, socket.port, socket.timeout, &payload).await
        }
        ResolvedHandler::Config(HandlerConfig::Udp { socket, .. }) => {
            dispatch_udp(&handler.name, &socket.host, socket.port, &payload).await
        }
        ResolvedHandler::Config(HandlerConfig::Amqp { exchange, .. }) => {
            dispatch_amqp(broker, &handler.name, exchange, &payload).await
        }
        ResolvedHandler::Config(HandlerConfig::Set { .. }) => {
            unreachable!("handler sets are expanded before dispatch, invariant vi")
        }
        ResolvedHandler::Extension(ext) => {
            let settings = registry.to_hash();
            ext.call(&payload, &settings)
                .await
                .map(|lines| {
                    for line in lines {
                        info!(handler = handler.name.as_str(), "{line}");
                    }
                })
                .map_err(|e| HandlerError::Extension { handler: handler.name.clone(), reason: e.to_string() })
        }
    };

    if let Err(e) = result {
        warn!(handler = handler.name.as_str(), error = %e, "handler dispatch failed");
    }
}

async fn dispatch_pipe(name: &str, command: &str, payload: &[u8]) -> Result<(), HandlerError> {
    let output = execute_command(command, Some(payload.to_vec()))
        .await
        .map_err(|e| HandlerError::Spawn { handler: name.to_string(), reason: e.to_string() })?;
    for line in output.stdout.lines() {
        info!(handler = name, "{line}");
    }
    Ok(())
}

async fn dispatch_tcp(name: &str, host: &str, port: u16, timeout_secs: Option<u64>, payload: &[u8]) -> Result<(), HandlerError> {
    let timeout = Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_SOCKET_TIMEOUT_SECS));
    let addr = format!("{host}:{port}");

    let connect = TcpStream::connect(&addr);
    let mut stream = tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| HandlerError::Tcp { handler: name.to_string(), reason: "connect timed out".to_string() })?
        .map_err(|e| HandlerError::Tcp { handler: name.to_string(), reason: e.to_string() })?;

    tokio::time::timeout(timeout, stream.write_all(payload))
        .await
        .map_err(|_| HandlerError::Tcp { handler: name.to_string(), reason: "write timed out".to_string() })?
        .map_err(|e| HandlerError::Tcp { handler: name.to_string(), reason: e.to_string() })?;

    let _ = stream.shutdown().await;
    Ok(())
}

async fn dispatch_udp(name: &str, host: &str, port: u16, payload: &[u8]) -> Result<(), HandlerError> {
    let addr = format!("{host}:{port}");
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| HandlerError::Udp { handler: name.to_string(), reason: e.to_string() })?;
    socket
        .send_to(payload, &addr)
        .await
        .map_err(|e| HandlerError::Udp { handler: name.to_string(), reason: e.to_string() })?;
    Ok(())
}

async fn dispatch_amqp(broker: &Arc<dyn Broker>, name: &str, exchange: &crate::config::ExchangeTarget, payload: &[u8]) -> Result<(), HandlerError> {
    if payload.is_empty() {
        return Ok(());
    }
    broker
        .publish_exchange(&exchange.name, &exchange.exchange_type, &exchange.options, payload)
        .await
        .map_err(|e| HandlerError::Amqp { handler: name.to_string(), reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_group_reaches_idle_after_matched_dec() {
        let wg = WaitGroup::new();
        wg.inc().await;
        wg.inc().await;
        wg.dec().await;
        wg.dec().await;
        // Should return immediately, not hang.
        tokio::time::timeout(Duration::from_millis(200), wg.wait_idle()).await.unwrap();
    }
}
