pub mod answer;
pub mod assistant;
pub mod column_resolver;
pub mod config;
pub mod dataset;
pub mod error;
pub mod filters;
pub mod intent;
pub mod normalize;
pub mod operators;
pub mod session;

pub use assistant::{AssistantResponse, QueryAssistant};
pub use dataset::Dataset;
pub use error::{QaError, Result};
