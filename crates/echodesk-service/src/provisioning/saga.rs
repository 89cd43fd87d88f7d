//! Compensation stack for multi-step provisioning.
//!
//! Each remote step that succeeds pushes an undo. If a later step fails the
//! caller runs [`Saga::compensate`], which unwinds in reverse order. Undo
//! failures are logged and swallowed; the caller returns its original error.

use futures::future::BoxFuture;

type Undo = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

/// Ordered list of undo actions.
#[derive(Default)]
pub struct Saga {
    steps: Vec<(&'static str, Undo)>,
}

impl Saga {
    /// Empty saga.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the undo of a step that just succeeded.
    pub fn push<F>(&mut self, name: &'static str, undo: F)
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), String>> + Send + 'static,
    {
        self.steps.push((name, Box::new(undo)));
    }

    /// Number of registered undos.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing needs undoing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every undo, most recent first.
    pub async fn compensate(self) {
        for (name, undo) in self.steps.into_iter().rev() {
            match undo().await {
                Ok(()) => tracing::info!(step = name, "Compensated provisioning step"),
                Err(e) => tracing::warn!(step = name, error = %e, "Compensation failed"),
            }
        }
    }

    /// Keep everything; drop the undos.
    pub fn complete(self) {
        tracing::debug!(steps = self.steps.len(), "Provisioning saga completed");
    }
}
