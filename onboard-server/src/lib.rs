//! Onboard Server - tenant onboarding approval service
//!
//! # Architecture
//!
//! - **Document store** (`store`): SurrealDB or in-memory collections with
//!   conditional single-document updates
//! - **Identity client** (`identity`): account registration on the remote
//!   identity service
//! - **Onboarding** (`onboarding`): request lifecycle and status transitions
//! - **Approval** (`approval`): the operator-triggered approval saga
//! - **Recovery** (`recovery`): periodic repair of stuck requests
//! - **HTTP API** (`api`)
//!
//! ```text
//! onboard-server/src/
//! ├── core/          # config, state, server, background tasks
//! ├── store/         # document store trait and adapters
//! ├── identity/      # identity service client
//! ├── onboarding/    # state machine
//! ├── approval/      # approval orchestrator
//! ├── recovery/      # recovery scanner
//! ├── api/           # HTTP routes and handlers
//! └── utils/         # logging
//! ```

pub mod api;
pub mod approval;
pub mod core;
pub mod identity;
pub mod onboarding;
pub mod recovery;
pub mod store;
pub mod utils;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use approval::{ApprovalError, ApprovalOrchestrator};
pub use core::{AppState, Config, Server};
pub use identity::{IdentityClient, IdentityError};
pub use onboarding::{OnboardingError, OnboardingService};
pub use recovery::{RecoveryConfig, RecoveryReport, RecoveryScanner};
pub use store::{DocumentStore, MemoryStore, SurrealStore};
pub use utils::logger::{init_logger, init_logger_with_file};
