//! A running engine thread and its channels.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use highlighter_engine::{create_engine, EngineConfig};
use highlighter_ipc::{HighlighterCommand, HighlighterEvent};
use highlighter_render::MediaBackend;

/// How long to wait for the engine to answer a command.
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the engine thread; shuts it down on drop.
pub struct EngineSession {
    command_tx: Sender<HighlighterCommand>,
    event_rx: Receiver<HighlighterEvent>,
    handle: Option<JoinHandle<()>>,
}

impl EngineSession {
    /// Spawn the engine and wait until it reports ready.
    pub fn start(backend: Arc<dyn MediaBackend>, config: EngineConfig) -> anyhow::Result<Self> {
        let (command_tx, command_rx) = highlighter_ipc::command_channel();
        let (event_tx, event_rx) = highlighter_ipc::event_channel();

        let handle = thread::Builder::new()
            .name("engine".to_string())
            .spawn(move || {
                info!("Engine thread starting");
                let mut engine = create_engine(command_rx, event_tx, backend, config);
                engine.run();
                info!("Engine thread stopped");
            })
            .context("Failed to spawn engine thread")?;

        let session = Self {
            command_tx,
            event_rx,
            handle: Some(handle),
        };
        session.wait_for(|event| matches!(event, HighlighterEvent::Ready).then_some(()))?;
        Ok(session)
    }

    /// Engine events.
    pub fn events(&self) -> &Receiver<HighlighterEvent> {
        &self.event_rx
    }

    pub fn send(&self, command: HighlighterCommand) -> anyhow::Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| anyhow!("Failed to send command: {}", e))
    }

    /// Send a command and wait for the event `pick` accepts.
    pub fn request<T>(
        &self,
        command: HighlighterCommand,
        pick: impl FnMut(&HighlighterEvent) -> Option<T>,
    ) -> anyhow::Result<T> {
        self.send(command)?;
        self.wait_for(pick)
    }

    /// Wait for an event `pick` accepts; engine errors fail the wait.
    pub fn wait_for<T>(
        &self,
        mut pick: impl FnMut(&HighlighterEvent) -> Option<T>,
    ) -> anyhow::Result<T> {
        loop {
            let event = self
                .event_rx
                .recv_timeout(REPLY_TIMEOUT)
                .context("Timed out waiting for the engine")?;

            if let Some(value) = pick(&event) {
                return Ok(value);
            }
            match event {
                HighlighterEvent::Error { message, .. } => bail!(message),
                HighlighterEvent::Shutdown => bail!("Engine shut down"),
                other => debug!(event = ?other, "Skipping event"),
            }
        }
    }

    /// Stop the engine, saving the library, and join its thread.
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        self.send(HighlighterCommand::Shutdown)?;
        self.wait_for(|event| matches!(event, HighlighterEvent::Shutdown).then_some(()))?;
        self.join();
        Ok(())
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Engine thread panicked");
            }
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.command_tx.send(HighlighterCommand::Shutdown);
            self.join();
        }
    }
}
