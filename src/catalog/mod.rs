//! Catalog store (C3): relational persistence, search, filtering, and similarity over
//! parsed AEP projects.

pub mod schema;
pub mod store;

pub use store::{
    CatalogRecord, CatalogStore, CompositionSummary, EffectSummary, FilterCriteria,
    MediaAssetSummary, ProjectMetadata, SimilarResult, TextLayerSummary,
};
