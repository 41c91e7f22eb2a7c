//! PluginBus (§2, 2%): synchronous hooks fired around quote creation and
//! state transitions. Out of scope beyond the contract it exposes; §10
//! supplements that contract with a concrete [`SwapEvent`] payload,
//! grounded on the teacher's `atomic_swap::monitor::SwapEvent`.

use crate::quote::QuoteRequest;
use crate::types::{Direction, PaymentHash, RefundReason};

/// Emitted by the engine on every state transition and at quote creation,
/// so plugins (fee overrides, compliance checks, metrics sinks) observe
/// the swap lifecycle without being wired into the state machines
/// themselves.
#[derive(Clone, Debug)]
pub enum SwapEvent {
    QuoteRequested {
        request: QuoteRequest,
    },
    QuoteIssued {
        payment_hash: PaymentHash,
        direction: Direction,
    },
    StateTransitioned {
        payment_hash: PaymentHash,
        direction: Direction,
        from: String,
        to: String,
    },
    Refunded {
        payment_hash: PaymentHash,
        direction: Direction,
        reason: RefundReason,
    },
    DoubleSpent {
        payment_hash: PaymentHash,
    },
}

/// A synchronous hook invoked inline with the engine's critical section.
/// Implementations must not block: they run under the swap's per-hash
/// lock (§5) and a slow hook stalls that swap's watchdog tick.
pub trait PluginHook: Send + Sync {
    /// Called before a quote is returned to the client. Returning `Err`
    /// aborts the quote with the given message (e.g. a compliance
    /// denylist check).
    fn before_quote(&self, request: &QuoteRequest) -> Result<(), String> {
        let _ = request;
        Ok(())
    }

    /// Called after any [`SwapEvent`] is produced. Never returns an error:
    /// observers cannot veto a transition that already happened.
    fn on_event(&self, event: &SwapEvent) {
        let _ = event;
    }
}

/// Dispatches to zero or more registered hooks in registration order.
#[derive(Default)]
pub struct PluginBus {
    hooks: Vec<Box<dyn PluginHook>>,
}

impl PluginBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Box<dyn PluginHook>) {
        self.hooks.push(hook);
    }

    pub fn before_quote(&self, request: &QuoteRequest) -> Result<(), String> {
        for hook in &self.hooks {
            hook.before_quote(request)?;
        }
        Ok(())
    }

    pub fn emit(&self, event: SwapEvent) {
        for hook in &self.hooks {
            hook.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::AmountSpec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHook(Arc<AtomicUsize>);

    impl PluginHook for CountingHook {
        fn on_event(&self, _event: &SwapEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emits_to_all_registered_hooks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut bus = PluginBus::new();
        bus.register(Box::new(CountingHook(counter.clone())));
        bus.register(Box::new(CountingHook(counter.clone())));
        bus.emit(SwapEvent::DoubleSpent {
            payment_hash: PaymentHash([0u8; 32]),
        });
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    struct DenyingHook;
    impl PluginHook for DenyingHook {
        fn before_quote(&self, _request: &QuoteRequest) -> Result<(), String> {
            Err("denied".to_string())
        }
    }

    #[test]
    fn before_quote_hook_can_veto() {
        let mut bus = PluginBus::new();
        bus.register(Box::new(DenyingHook));
        let req = QuoteRequest {
            direction: Direction::FromBtc,
            token: "TOK".into(),
            spec: AmountSpec::ExactOut,
            amount: 1,
        };
        assert!(bus.before_quote(&req).is_err());
    }
}
