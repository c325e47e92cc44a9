use tracing::{debug, warn};

use crate::bindings::DispatchError;
use crate::marshal::InteractionEvent;
use crate::registry::BindingRegistry;

/// What became of an inbound interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A binding accepted the event and ran its script handler
    Handled { binding: &'static str },
    /// No binding claimed the event
    Unhandled,
}

/// Hands inbound interactions to the first binding that claims them
#[derive(Clone)]
pub struct Dispatcher {
    registry: BindingRegistry,
}

impl Dispatcher {
    pub fn new(registry: BindingRegistry) -> Self {
        Self { registry }
    }

    /// Bindings are asked in group order; only the first claimant handles
    /// the event, even when it then fails.
    pub fn dispatch(&self, event: &InteractionEvent) -> Result<DispatchOutcome, DispatchError> {
        let Some(binding) = self.registry.bindings().find(|b| b.can_handle(event)) else {
            warn!(
                target: "scripting",
                "No binding handles {} interaction {}",
                event.kind.as_str(),
                event.id
            );
            return Ok(DispatchOutcome::Unhandled);
        };

        debug!(
            target: "scripting",
            "Dispatching interaction {} to {}",
            event.id,
            binding.name()
        );
        binding.handle(event)?;
        Ok(DispatchOutcome::Handled {
            binding: binding.name(),
        })
    }
}
