//! Gate contract for privileged operations
//!
//! Anything that spends a credit (an assistant invocation, a document
//! extraction) asks the gate first and proceeds only when admitted. An
//! exhausted allowance is reported separately from a store failure so the
//! caller can offer an upgrade instead of a retry message, and a store
//! failure always denies: entitlement that cannot be verified is treated as
//! absent, never granted.

use praline_shared::PrincipalId;
use thiserror::Error;

use crate::catalog::Allowance;
use crate::engine::{ConsumeOutcome, CreditEngine};
use crate::error::CreditsError;

/// Why a privileged operation was not admitted
#[derive(Debug, Error)]
pub enum GateError {
    /// The current period's allowance is spent; surface an upgrade path
    #[error("assistant credit allowance exhausted for this period")]
    Exhausted,

    /// Entitlement could not be verified; the operation is refused
    #[error(transparent)]
    Credits(#[from] CreditsError),
}

impl GateError {
    /// Whether the denial should surface an upgrade prompt rather than a
    /// transient-failure message
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

/// Check-then-consume front door for privileged operations
///
/// Callers may cache a status read for display, but must come back here
/// before every privileged action; a cached remaining count never gates
/// consumption.
#[derive(Clone)]
pub struct CreditGate {
    engine: CreditEngine,
}

impl CreditGate {
    pub fn new(engine: CreditEngine) -> Self {
        Self { engine }
    }

    /// Consume one credit, or explain why the operation may not run
    pub async fn admit(&self, principal: PrincipalId) -> Result<Allowance, GateError> {
        match self.engine.try_consume(principal).await? {
            ConsumeOutcome::Consumed { remaining } => Ok(remaining),
            ConsumeOutcome::Exhausted => Err(GateError::Exhausted),
        }
    }
}
