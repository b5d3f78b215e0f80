pub mod dedup;
pub mod orchestrator;
pub mod state;

pub use dedup::{filter_new, DedupResult};
pub use orchestrator::Orchestrator;
pub use state::RunStateMachine;

pub mod prelude {
    pub use super::orchestrator::Orchestrator;
    pub use sn_core::{RunState, RunStatus, RunSummary, Trigger, TriggerAction};
}
