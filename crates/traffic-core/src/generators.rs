use std::fmt;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::config::SimulationConfig;

pub const PRODUCT_CATALOG: [&str; 10] = [
    "Laptop",
    "Smartphone",
    "Headphones",
    "Monitor",
    "Keyboard",
    "Mouse",
    "Webcam",
    "Tablet",
    "Smartwatch",
    "Speaker",
];

/// Rolls at or above this value take the error branch.
pub const ERROR_BRANCH_THRESHOLD: f64 = 0.8;

pub const MIN_ORDER_PRICE: f64 = 10.0;
pub const MAX_ORDER_PRICE: f64 = 1_000.0;
pub const MAX_ORDER_QUANTITY: u32 = 5;

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

/// `rand`-backed source; reproducible when built from a seed.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed list of draws, wrapping around at the end. Meant for tests
/// that need to script the generator's branch and order draws.
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<f64>,
    cursor: usize,
}

impl SequenceRandom {
    /// # Panics
    ///
    /// Panics when `values` is empty or holds a value outside `[0, 1)`.
    pub fn new(values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "sequence must not be empty");
        assert!(
            values
                .iter()
                .all(|value| value.is_finite() && (0.0..1.0).contains(value)),
            "sequence values must lie in [0, 1)"
        );

        Self { values, cursor: 0 }
    }
}

impl RandomSource for SequenceRandom {
    fn next_unit(&mut self) -> f64 {
        let value = self.values[self.cursor];
        self.cursor = (self.cursor + 1) % self.values.len();
        value
    }
}

fn pick_index(rng: &mut dyn RandomSource, len: usize) -> usize {
    let index = (rng.next_unit() * len as f64) as usize;
    index.min(len.saturating_sub(1))
}

fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticOrder {
    pub product: &'static str,
    pub quantity: u32,
    pub price: f64,
}

impl SyntheticOrder {
    /// Draws product, quantity and price, in that order.
    pub fn random(rng: &mut dyn RandomSource) -> Self {
        let product = PRODUCT_CATALOG[pick_index(rng, PRODUCT_CATALOG.len())];
        let quantity = ((rng.next_unit() * f64::from(MAX_ORDER_QUANTITY)) as u32)
            .min(MAX_ORDER_QUANTITY - 1)
            + 1;
        let price = round_to_cents(
            rng.next_unit() * (MAX_ORDER_PRICE - MIN_ORDER_PRICE) + MIN_ORDER_PRICE,
        );

        Self {
            product,
            quantity,
            price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedErrorKind {
    ServerError,
    NotFound,
    Timeout,
}

impl SimulatedErrorKind {
    /// Value of the `error_type` query parameter understood by the storefront.
    pub fn query_value(self) -> &'static str {
        match self {
            Self::ServerError => "500",
            Self::NotFound => "404",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for SimulatedErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchPlan {
    CreateOrder(SyntheticOrder),
    SimulateError(SimulatedErrorKind),
}

/// Decides what each tick sends. Roughly 80% of ticks create an order; the
/// rest trigger one of the enabled error kinds, or an order when none are
/// enabled.
pub struct RequestGenerator {
    rng: Box<dyn RandomSource>,
}

impl RequestGenerator {
    pub fn new(rng: Box<dyn RandomSource>) -> Self {
        Self { rng }
    }

    pub fn next_plan(&mut self, config: &SimulationConfig) -> DispatchPlan {
        let roll = self.rng.next_unit();
        if roll < ERROR_BRANCH_THRESHOLD {
            return DispatchPlan::CreateOrder(self.next_order());
        }

        let error_kinds = config.enabled_error_kinds();
        if error_kinds.is_empty() {
            return DispatchPlan::CreateOrder(self.next_order());
        }

        let index = pick_index(self.rng.as_mut(), error_kinds.len());
        DispatchPlan::SimulateError(error_kinds[index])
    }

    pub fn next_order(&mut self) -> SyntheticOrder {
        SyntheticOrder::random(self.rng.as_mut())
    }
}

impl fmt::Debug for RequestGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestGenerator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DispatchPlan, RandomSource, RequestGenerator, SeededRandom, SequenceRandom,
        SimulatedErrorKind, SyntheticOrder, PRODUCT_CATALOG,
    };
    use crate::config::{SimulationConfig, TrafficMode};

    fn all_errors_config() -> SimulationConfig {
        SimulationConfig::new(TrafficMode::Moderate, 60)
            .unwrap()
            .with_server_error(true)
            .with_not_found_error(true)
            .with_timeout_error(true)
    }

    #[test]
    fn low_roll_creates_order_from_following_draws() {
        let rng = SequenceRandom::new(vec![0.1, 0.35, 0.99, 0.5]);
        let mut generator = RequestGenerator::new(Box::new(rng));

        let plan = generator.next_plan(&all_errors_config());

        assert_eq!(
            plan,
            DispatchPlan::CreateOrder(SyntheticOrder {
                product: "Monitor",
                quantity: 5,
                price: 505.0,
            })
        );
    }

    #[test]
    fn high_roll_picks_enabled_error_kind_uniformly() {
        let rng = SequenceRandom::new(vec![0.8, 0.0, 0.85, 0.5, 0.95, 0.99]);
        let mut generator = RequestGenerator::new(Box::new(rng));
        let config = all_errors_config();

        assert_eq!(
            generator.next_plan(&config),
            DispatchPlan::SimulateError(SimulatedErrorKind::ServerError)
        );
        assert_eq!(
            generator.next_plan(&config),
            DispatchPlan::SimulateError(SimulatedErrorKind::NotFound)
        );
        assert_eq!(
            generator.next_plan(&config),
            DispatchPlan::SimulateError(SimulatedErrorKind::Timeout)
        );
    }

    #[test]
    fn error_roll_without_enabled_kinds_falls_back_to_order() {
        let rng = SequenceRandom::new(vec![0.9, 0.0, 0.0, 0.0]);
        let mut generator = RequestGenerator::new(Box::new(rng));
        let config = SimulationConfig::new(TrafficMode::Moderate, 2).unwrap();

        let plan = generator.next_plan(&config);

        assert_eq!(
            plan,
            DispatchPlan::CreateOrder(SyntheticOrder {
                product: "Laptop",
                quantity: 1,
                price: 10.0,
            })
        );
    }

    #[test]
    fn only_enabled_kind_is_ever_chosen() {
        let mut generator = RequestGenerator::new(Box::new(SeededRandom::new(3)));
        let config = SimulationConfig::new(TrafficMode::Spike, 10)
            .unwrap()
            .with_not_found_error(true);

        for _ in 0..500 {
            if let DispatchPlan::SimulateError(kind) = generator.next_plan(&config) {
                assert_eq!(kind, SimulatedErrorKind::NotFound);
            }
        }
    }

    #[test]
    fn random_orders_stay_within_catalog_and_bounds() {
        let mut rng = SeededRandom::new(42);

        for _ in 0..1_000 {
            let order = SyntheticOrder::random(&mut rng);
            assert!(PRODUCT_CATALOG.contains(&order.product));
            assert!((1..=5).contains(&order.quantity));
            assert!((10.0..=1_000.0).contains(&order.price));
            assert_eq!((order.price * 100.0).round() / 100.0, order.price);
        }
    }

    #[test]
    fn seeded_sources_are_deterministic() {
        let mut a = SeededRandom::new(42);
        let mut b = SeededRandom::new(42);

        let draws_a: Vec<f64> = (0..10).map(|_| a.next_unit()).collect();
        let draws_b: Vec<f64> = (0..10).map(|_| b.next_unit()).collect();

        assert_eq!(draws_a, draws_b);
        assert!(draws_a.iter().all(|value| (0.0..1.0).contains(value)));
    }

    #[test]
    fn sequence_random_wraps_around() {
        let mut rng = SequenceRandom::new(vec![0.25, 0.75]);

        assert_eq!(rng.next_unit(), 0.25);
        assert_eq!(rng.next_unit(), 0.75);
        assert_eq!(rng.next_unit(), 0.25);
    }

    #[test]
    #[should_panic(expected = "sequence values must lie in [0, 1)")]
    fn sequence_random_rejects_out_of_range_values() {
        let _ = SequenceRandom::new(vec![1.0]);
    }

    #[test]
    #[should_panic(expected = "sequence must not be empty")]
    fn sequence_random_rejects_empty_sequence() {
        let _ = SequenceRandom::new(Vec::new());
    }

    #[test]
    fn error_kind_query_values_match_storefront() {
        assert_eq!(SimulatedErrorKind::ServerError.query_value(), "500");
        assert_eq!(SimulatedErrorKind::NotFound.query_value(), "404");
        assert_eq!(SimulatedErrorKind::Timeout.query_value(), "timeout");
    }
}
