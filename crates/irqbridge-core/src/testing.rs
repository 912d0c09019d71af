//! Test utilities for the interrupt bridge.
//!
//! Provides [`MockScriptedHandler`] and [`RecordingNative`] for use in tests.

use crate::{HandlerFault, NativeHandler, ResourceId, ScriptedHandler};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// A scripted handler that records every resource it is invoked with.
pub struct MockScriptedHandler {
    calls: Mutex<Vec<ResourceId>>,
    failure: Option<String>,
    callback: Option<Box<dyn Fn(ResourceId) + Send + Sync>>,
}

impl MockScriptedHandler {
    /// Records invocations and always succeeds.
    #[must_use]
    pub fn recorder() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failure: None,
            callback: None,
        })
    }

    /// Records invocations and always fails with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
            callback: None,
        })
    }

    /// Records invocations and runs `f` after recording.
    #[must_use]
    pub fn with_callback(f: impl Fn(ResourceId) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failure: None,
            callback: Some(Box::new(f)),
        })
    }

    /// Resources this handler was invoked with, in order.
    pub fn calls(&self) -> Vec<ResourceId> {
        self.calls.lock().clone()
    }
}

impl ScriptedHandler for MockScriptedHandler {
    fn invoke(&self, resource: ResourceId) -> Result<(), HandlerFault> {
        self.calls.lock().push(resource);
        if let Some(f) = &self.callback {
            f(resource);
        }
        match &self.failure {
            // The drain hook stamps the delivered event onto the fault.
            Some(message) => Err(HandlerFault::new(
                crate::EventType::TimerMatch,
                resource,
                message.clone(),
            )),
            None => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Records native handler invocations.
#[derive(Clone, Default)]
pub struct RecordingNative {
    calls: Arc<Mutex<Vec<ResourceId>>>,
}

impl RecordingNative {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`NativeHandler`] that appends to this recorder.
    #[must_use]
    pub fn handler(&self) -> NativeHandler {
        let calls = Arc::clone(&self.calls);
        Arc::new(move |resource| calls.lock().push(resource))
    }

    /// Resources recorded so far, in order.
    pub fn calls(&self) -> Vec<ResourceId> {
        self.calls.lock().clone()
    }
}
