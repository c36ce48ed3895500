pub mod collect;
pub mod compose;
pub mod dimension;
pub mod orchestrator;
pub mod query;
pub mod synthesize;

pub use collect::{CollectionResult, Collector, validate};
pub use compose::{Composer, Report};
pub use dimension::{AnalysisDimension, DimensionResult};
pub use orchestrator::{ResearchOutcome, ResearchPipeline};
pub use query::Query;
pub use synthesize::{InsightRecord, SynthesisSettings, Synthesizer};
