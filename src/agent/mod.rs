pub mod loop_;

pub use loop_::{AgentLoop, LoopOutcome, TaskInput, DEFAULT_MAX_ITERATIONS};
