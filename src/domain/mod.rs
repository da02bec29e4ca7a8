mod backup;
mod balance;
mod ledger;
mod money;
mod report;
mod schedule;
mod snapshot;
mod transaction;

pub use backup::*;
pub use balance::*;
pub use ledger::*;
pub use money::*;
pub use report::*;
pub use schedule::*;
pub use snapshot::*;
pub use transaction::*;
