//! # anvil-agent
//!
//! Per-turn orchestration for Anvil.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    Orchestrator                       │
//! │  ┌────────────┐  ┌─────────────┐  ┌───────────────┐  │
//! │  │ GapDetector│  │ Synthesizer │  │ Integration   │  │
//! │  └────────────┘  └─────────────┘  └───────────────┘  │
//! │  ┌────────────┐  ┌─────────────┐  ┌───────────────┐  │
//! │  │ Validator  │  │  Executor   │  │ OutcomeAnalyzer│ │
//! │  └────────────┘  └─────────────┘  └───────────────┘  │
//! ├──────────────────────────────────────────────────────┤
//! │  ConversationHistory · AgentMemory · SessionStore     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut agent = Orchestrator::from_config(&config, llm)?
//!     .with_confirmer(Arc::new(StdinConfirmer));
//! agent.load()?;
//!
//! let report = agent.handle_turn("list files in data", &CancellationToken::new()).await;
//! ```

pub mod confirm;
pub mod event;
pub mod feedback;
pub mod history;
pub mod memory;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod state;

pub use confirm::{AutoApprove, AutoDecline, ConfirmPurpose, ConfirmRequest, Confirmer};
pub use event::AgentEvent;
pub use feedback::{Feedback, FeedbackTally};
pub use history::ConversationHistory;
pub use memory::{AgentMemory, CommandEntry, OutcomeStats};
pub use orchestrator::{Orchestrator, OrchestratorConfig, Suggestion, TurnReport};
pub use session::{SessionState, SessionStore, SESSION_STATE_VERSION};
pub use state::{AgentState, ExtensionPhase};
