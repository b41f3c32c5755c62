//! PaperHound Knowledge Engine
//!
//! Per-topic literature state:
//! - topics with maturity buckets (foundation, core, recent) and read markers
//! - deterministic maturity classification
//! - a monotonic knowledge state driven by reading progress
//! - citation network expansion of a seed paper into a deduplicated working set

pub mod classifier;
pub mod network;
pub mod state;
pub mod store;
pub mod topic;

pub use classifier::ClassificationRules;
pub use network::{pick_seed, CitationNetwork, CitationNetworkBuilder, NetworkRequest};
pub use state::StateThresholds;
pub use store::KnowledgeStore;
pub use topic::{normalize_topic_name, KnowledgeState, Maturity, StoredPaper, Topic};
