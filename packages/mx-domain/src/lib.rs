pub mod entity;
pub mod ranker;
pub mod scorer;
pub mod similarity;
pub mod status;
pub mod weights;

mod error;

pub use entity::{Embedding, Entity, EntityKind, Location, Proficiency};
pub use error::Error;
pub use ranker::{
	QualityTier, RankedMatch, SEMANTIC_BLEND_WEIGHT, STRUCTURED_BLEND_WEIGHT, ScoredCandidate,
};
pub use scorer::{HardFilters, ScoringPolicy, StructuredScores};
pub use status::MatchStatus;
pub use weights::{Dimension, Weights};

pub type Result<T, E = Error> = std::result::Result<T, E>;
