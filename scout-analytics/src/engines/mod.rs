pub mod fusion;
pub mod precision;
pub mod simulation;

pub use fusion::{fuse, fuse_all};
pub use precision::{ObserverPrecision, PrecisionParams, compute_precision};
pub use simulation::{CancelToken, RankForecast, SimulationParams, simulate};
