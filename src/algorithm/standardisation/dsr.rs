//! Directly standardised rates
//!
//! Rates are weighted by a reference population's age structure. Confidence
//! limits follow Dobson's method, using Byar's approximation to the exact
//! Poisson limits of the total count.

use statrs::distribution::{ContinuousCDF, Normal};

/// 2013 European Standard Population in the 18 five-year bands, 85+ collapsed
pub const EUROPEAN_STANDARD_POPULATION_2013: [f64; 18] = [
    5000.0, 5500.0, 5500.0, 5500.0, 6000.0, 6000.0, 6500.0, 7000.0, 7000.0, 7000.0, 7000.0,
    6500.0, 6000.0, 5500.0, 5000.0, 4000.0, 2500.0, 2500.0,
];

/// Counts for one age band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandObservation {
    pub numerator: f64,
    pub denominator: f64,
    pub weight: f64,
}

/// Standardised rate with confidence limits, all scaled by the multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DsrEstimate {
    pub numerator: f64,
    pub denominator: f64,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Byar's lower limit for a Poisson count
#[must_use]
pub fn byars_lower(observed: f64, z: f64) -> f64 {
    if observed <= 0.0 {
        return 0.0;
    }
    let o = observed;
    (o * (1.0 - 1.0 / (9.0 * o) - z / (3.0 * o.sqrt())).powi(3)).max(0.0)
}

/// Byar's upper limit for a Poisson count
#[must_use]
pub fn byars_upper(observed: f64, z: f64) -> f64 {
    let o = observed.max(0.0) + 1.0;
    o * (1.0 - 1.0 / (9.0 * o) + z / (3.0 * o.sqrt())).powi(3)
}

/// Two-sided standard normal quantile for a confidence level, e.g. 0.95 → 1.96
#[must_use]
pub fn z_for_confidence(confidence: f64) -> f64 {
    let p = 1.0 - (1.0 - confidence.clamp(1e-9, 1.0 - 1e-9)) / 2.0;
    Normal::standard().inverse_cdf(p)
}

/// Directly standardised rate over a set of age bands
///
/// Bands with no population contribute nothing to the rate but keep their
/// weight. Returns `None` when the total population is zero.
#[must_use]
pub fn directly_standardised_rate(
    bands: &[BandObservation],
    multiplier: f64,
    z: f64,
) -> Option<DsrEstimate> {
    let total_weight: f64 = bands.iter().map(|b| b.weight).sum();
    let numerator: f64 = bands
        .iter()
        .filter(|b| b.denominator > 0.0)
        .map(|b| b.numerator)
        .sum();
    let denominator: f64 = bands.iter().map(|b| b.denominator).sum();
    if denominator <= 0.0 || total_weight <= 0.0 {
        return None;
    }

    let (weighted, variance) = bands
        .iter()
        .filter(|b| b.denominator > 0.0)
        .fold((0.0, 0.0), |(rate, var), b| {
            let crude = b.numerator / b.denominator;
            (
                rate + b.weight * crude,
                var + b.weight * b.weight * b.numerator / (b.denominator * b.denominator),
            )
        });
    let dsr = weighted / total_weight;
    let variance = variance / (total_weight * total_weight);

    let (lower, upper) = if numerator > 0.0 {
        let scale = (variance / numerator).sqrt();
        (
            (dsr + scale * (byars_lower(numerator, z) - numerator)).max(0.0),
            dsr + scale * (byars_upper(numerator, z) - numerator),
        )
    } else {
        // No events: fall back to the crude Poisson upper bound on the total population
        (0.0, byars_upper(0.0, z) / denominator)
    };

    Some(DsrEstimate {
        numerator,
        denominator,
        value: dsr * multiplier,
        lower: lower * multiplier,
        upper: upper * multiplier,
    })
}
