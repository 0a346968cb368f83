// src/config/mod.rs
pub mod research;

pub use research::{
    AggregationConfig, DiscoveryConfig, LlmConfig, ProxyConfig, ResearchConfig, StoreConfig,
    TranscriptConfig,
};
