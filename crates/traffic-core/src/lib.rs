mod config;
mod generators;
mod stats;

pub use config::{
    ModeParsePolicy, SimulationConfig, SimulationConfigError, TrafficMode, MAX_DURATION_SECONDS,
};
pub use generators::{
    DispatchPlan, RandomSource, RequestGenerator, SeededRandom, SequenceRandom,
    SimulatedErrorKind, SyntheticOrder, ERROR_BRANCH_THRESHOLD, PRODUCT_CATALOG,
};
pub use stats::{SessionStats, LATENCY_WINDOW_CAPACITY};
