//! Praline Credit Engine
//!
//! Usage-credit and subscription-entitlement bookkeeping for the assistant:
//! the plan catalog, per-principal credit records, the consume / rollover /
//! tier-change engine, and the contracts its collaborators build on.

pub mod catalog;
pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod memory;
pub mod pg;
pub mod record;
pub mod store;
pub mod webhook;

pub use catalog::{Allowance, PlanCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{ConsumeOutcome, CreditEngine};
pub use error::{CreditsError, CreditsResult};
pub use events::{ActorType, CreditEvent, CreditEventLogger, CreditEventType};
pub use gate::{CreditGate, GateError};
pub use memory::InMemoryCreditStore;
pub use pg::PgCreditStore;
pub use record::{CreditRecord, CreditStatus};
pub use store::{CreditStore, IncrementOutcome};
