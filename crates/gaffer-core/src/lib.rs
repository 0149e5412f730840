// Library root: the decision engines (optimization, captaincy scoring,
// transfer and chip recommendations) plus the snapshot types they consume.

pub mod error;
pub mod model;
pub mod optimize;
pub mod recommend;
pub mod scoring;
pub mod snapshot;
pub mod squad;
pub mod stats;

pub use error::{Degradation, EngineError};
pub use model::{
    Appearance, Athlete, AthleteId, AthleteIdx, Availability, Chip, ChipState, Club, ClubId,
    Fixture, Position, Squad,
};
pub use optimize::{
    optimize, optimize_wildcard, Optimizer, SquadSelection, TransferPlan, TransferTerms,
};
pub use recommend::chips::{analyze_chips, ChipRecommendation, ChipTiming};
pub use recommend::transfers::{classify_transfers, TierEntry, TransferTiers};
pub use recommend::Urgency;
pub use scoring::{rank_captains, score_captain, CaptainRanking, CaptainScore, CaptainWeights};
pub use snapshot::{FixtureIndex, Snapshot};
pub use squad::{validate_squad, SquadRules};
