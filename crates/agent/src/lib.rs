//! The orchestration loop, the heart of turnwise.
//!
//! A turn follows a **Submit → Aggregate → Execute → Continue** cycle:
//!
//! 1. **Submit** the utterance, chained to the conversation's last good turn
//! 2. **Aggregate** the reply's event stream into one result
//! 3. **If the turn paused on local tool calls**: execute them in-process
//! 4. **Continue** the paused turn with the outputs, back to step 2
//!
//! The cycle ends when a round finishes with no local work left, when the
//! stream fails, or when the tool round limit is reached.

pub mod aggregator;
pub mod loop_runner;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use aggregator::{Flow, StreamAggregator};
pub use loop_runner::{LoopSettings, OrchestrationLoop};
pub use session::Session;
