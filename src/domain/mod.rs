//! Domain layer - billing model, reconciliation and collaborator contracts

pub mod billing;
pub mod clock;
pub mod directory;
pub mod error;
pub mod object_store;
pub mod report;
pub mod source;

pub use billing::{AggregatedElement, BillingLineItem, CounterState, GroupingKey};
pub use clock::{Clock, SystemClock};
pub use directory::{Account, AccountKind, AccountResolver, DirectoryService};
pub use error::{DomainError, QueryStage};
pub use object_store::{ObjectInfo, ObjectStore};
pub use report::FetchOutcome;
pub use source::{BillingSource, ReportSource};
