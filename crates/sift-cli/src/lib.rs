//! Batch runner pieces for the `sift` binary: environment settings, the
//! OpenAI-compatible Tier-2 client and run summaries.

pub mod classifier_client;
pub mod report;
pub mod settings;

pub use classifier_client::{CompletionError, OpenAiClassifier};
pub use report::BatchSummary;
pub use settings::{check_endpoint, load_engine_config, ClassifierEndpoint};
