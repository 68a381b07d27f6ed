//! Simulated speech recognizer for running the host without a platform engine.
//!
//! Each started handle runs a scripted tokio task: `ReadyForSpeech`,
//! `BeginningOfSpeech`, `EndOfSpeech`, then `Results` with the configured
//! transcript (or `Error` with the configured code) once `latency_ms` has
//! elapsed. `stop` and `destroy` abort the script.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use voicesearch_core::config::SimulatorConfig;
use voicesearch_core::error::{Result, VoiceSearchError};
use voicesearch_core::types::RecognitionOptions;
use voicesearch_session::{
    HostSurface, PlatformCapability, RecognitionEvent, RecognitionListener, RecognizerHandle,
};

/// The host surface used by the binary.
#[derive(Debug)]
pub struct ConsoleSurface {
    label: String,
}

impl ConsoleSurface {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl HostSurface for ConsoleSurface {
    fn label(&self) -> &str {
        &self.label
    }
}

pub struct SimulatedRecognizer {
    config: SimulatorConfig,
    runtime: Handle,
    next_id: AtomicU64,
    scripts: Mutex<HashMap<u64, AbortHandle>>,
}

impl SimulatedRecognizer {
    pub fn new(config: SimulatorConfig, runtime: Handle) -> Self {
        Self {
            config,
            runtime,
            next_id: AtomicU64::new(1),
            scripts: Mutex::new(HashMap::new()),
        }
    }

    fn cancel(&self, id: u64) -> bool {
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match script {
            Some(script) => {
                script.abort();
                true
            }
            None => false,
        }
    }

    /// Number of scripts still registered.
    pub fn running(&self) -> usize {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn run_script(
    listener: RecognitionListener,
    latency: Duration,
    partial_results: bool,
    transcript: String,
    error_code: Option<i32>,
) {
    let step = latency / 3;

    listener.on_event(RecognitionEvent::ReadyForSpeech);
    tokio::time::sleep(step).await;

    listener.on_event(RecognitionEvent::BeginningOfSpeech);
    if partial_results {
        if let Some(word) = transcript.split_whitespace().next() {
            listener.on_event(RecognitionEvent::PartialResults(vec![word.to_string()]));
        }
    }
    tokio::time::sleep(step).await;

    listener.on_event(RecognitionEvent::EndOfSpeech);
    tokio::time::sleep(latency.saturating_sub(step * 2)).await;

    match error_code {
        Some(code) => listener.on_event(RecognitionEvent::Error(code)),
        None => listener.on_event(RecognitionEvent::Results(vec![transcript])),
    }
}

impl PlatformCapability for SimulatedRecognizer {
    fn is_available(&self, _surface: &dyn HostSurface) -> bool {
        self.config.available
    }

    fn create(&self, surface: &dyn HostSurface) -> Result<RecognizerHandle> {
        if !self.config.available {
            return Err(VoiceSearchError::Capability(
                "simulated recognizer is disabled".to_string(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(handle = id, surface = surface.label(), "Simulated recognizer created");
        Ok(RecognizerHandle::new(id))
    }

    fn start(
        &self,
        handle: &RecognizerHandle,
        options: &RecognitionOptions,
        listener: RecognitionListener,
    ) -> Result<()> {
        let script = run_script(
            listener,
            Duration::from_millis(self.config.latency_ms),
            options.partial_results,
            self.config.transcript.clone(),
            self.config.error_code,
        );

        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        let task = self.runtime.spawn(script);
        scripts.insert(handle.id(), task.abort_handle());
        tracing::debug!(
            handle = handle.id(),
            latency_ms = self.config.latency_ms,
            model = ?options.language_model,
            "Simulated recognizer listening"
        );
        Ok(())
    }

    fn stop(&self, handle: &RecognizerHandle) -> Result<()> {
        if self.cancel(handle.id()) {
            tracing::debug!(handle = handle.id(), "Simulated recognizer stopped");
        }
        Ok(())
    }

    fn destroy(&self, handle: RecognizerHandle) -> Result<()> {
        self.cancel(handle.id());
        tracing::debug!(handle = handle.id(), "Simulated recognizer destroyed");
        Ok(())
    }
}
