//! Order submission primitive and the interceptor chain wrapped around it.
//!
//! The [`OrderSubmitter`] trait is the raw exchange-submission call the
//! trading engine owns. A [`SubmitInterceptor`] sits in front of it and
//! decides whether a request is forwarded; an [`InterceptorChain`] composes
//! any number of interceptors around one submitter, outermost first.
//!
//! Submission is synchronous. Interceptors must not block on I/O.

use std::sync::Arc;

use anyhow::Result;

use rg_core::types::{OrderId, OrderRequest};

/// Raw order-submission primitive provided by the trading engine.
pub trait OrderSubmitter: Send + Sync {
    /// Send an order to `gateway`, returning the gateway-assigned identifier.
    fn send_order(&self, req: &OrderRequest, gateway: &str) -> Result<OrderId>;

    /// Request cancellation of a live order.
    fn cancel_order(&self, order_id: &OrderId, gateway: &str) -> Result<()>;
}

/// Result of a submission through an interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The request reached the exchange connector.
    Accepted(OrderId),
    /// The request was stopped before (or at) the connector.
    Rejected { reason: String },
}

impl SubmitOutcome {
    /// The order id, if accepted.
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            SubmitOutcome::Accepted(id) => Some(id),
            SubmitOutcome::Rejected { .. } => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }
}

/// Errors surfaced when the chain is driven through [`OrderSubmitter`].
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// An interceptor stopped the request.
    #[error("order rejected: {reason}")]
    Rejected { reason: String },
}

/// Middleware around the submission primitive.
///
/// An implementation either returns a rejection without touching `next`, or
/// forwards the request verbatim through `next` and reports its result.
pub trait SubmitInterceptor: Send + Sync {
    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &str;

    /// Handle one submission.
    fn intercept(&self, req: &OrderRequest, gateway: &str, next: &dyn OrderSubmitter)
        -> SubmitOutcome;
}

/// An ordered stack of interceptors in front of one submitter.
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn SubmitInterceptor>>,
    inner: Arc<dyn OrderSubmitter>,
}

impl InterceptorChain {
    /// Create a chain with no interceptors around `inner`.
    pub fn new(inner: Arc<dyn OrderSubmitter>) -> Self {
        Self {
            interceptors: Vec::new(),
            inner,
        }
    }

    /// Append an interceptor. Interceptors run in insertion order, so the
    /// first one added sees every request first.
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn SubmitInterceptor>) {
        tracing::info!(interceptor = interceptor.name(), "submission interceptor installed");
        self.interceptors.push(interceptor);
    }

    /// Submit through every interceptor, then the inner submitter.
    pub fn submit(&self, req: &OrderRequest, gateway: &str) -> SubmitOutcome {
        let next = Next {
            remaining: &self.interceptors,
            inner: self.inner.as_ref(),
        };
        next.run(req, gateway)
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }
}

impl OrderSubmitter for InterceptorChain {
    fn send_order(&self, req: &OrderRequest, gateway: &str) -> Result<OrderId> {
        match self.submit(req, gateway) {
            SubmitOutcome::Accepted(id) => Ok(id),
            SubmitOutcome::Rejected { reason } => Err(ChainError::Rejected { reason }.into()),
        }
    }

    fn cancel_order(&self, order_id: &OrderId, gateway: &str) -> Result<()> {
        self.inner.cancel_order(order_id, gateway)
    }
}

/// The rest of the chain, as seen from one interceptor.
struct Next<'a> {
    remaining: &'a [Arc<dyn SubmitInterceptor>],
    inner: &'a dyn OrderSubmitter,
}

impl Next<'_> {
    fn run(&self, req: &OrderRequest, gateway: &str) -> SubmitOutcome {
        match self.remaining.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    remaining: rest,
                    inner: self.inner,
                };
                head.intercept(req, gateway, &next)
            }
            None => match self.inner.send_order(req, gateway) {
                Ok(id) => SubmitOutcome::Accepted(id),
                Err(e) => SubmitOutcome::Rejected {
                    reason: format!("{e:#}"),
                },
            },
        }
    }
}

impl OrderSubmitter for Next<'_> {
    fn send_order(&self, req: &OrderRequest, gateway: &str) -> Result<OrderId> {
        match self.run(req, gateway) {
            SubmitOutcome::Accepted(id) => Ok(id),
            SubmitOutcome::Rejected { reason } => Err(ChainError::Rejected { reason }.into()),
        }
    }

    fn cancel_order(&self, order_id: &OrderId, gateway: &str) -> Result<()> {
        self.inner.cancel_order(order_id, gateway)
    }
}
