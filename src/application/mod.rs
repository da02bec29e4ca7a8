// Application layer: the ledger service, backups, the daily scheduler and
// the collaborators they are wired to.

mod backup;
mod clock;
pub mod error;
mod notifier;
mod records;
mod scheduler;
mod service;

pub use backup::*;
pub use clock::*;
pub use error::*;
pub use notifier::*;
pub use records::{load_last_cycle, load_running_balance, load_working_state};
pub use scheduler::*;
pub use service::*;
