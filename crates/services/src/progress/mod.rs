mod replica;
mod store;

pub use store::{DEFAULT_SLOT_KEY, ProgressStore, ReconcileOutcome};
