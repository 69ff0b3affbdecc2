//! Comparison metrics over a batch's results.
//!
//! Pure functions of the result list. Only successful results count; a batch
//! where every call failed has no metrics at all. Callers recompute after each
//! rating change.

use serde::{Deserialize, Serialize};

use crate::config::MetricsConfig;

use super::types::ModelResult;

/// Winner fallbacks when ratings are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsPolicy {
    /// No rated result: the first successful result wins quality.
    pub quality_fallback: bool,
    /// No rated result with a non-zero cost: the cost winner wins efficiency.
    pub efficiency_fallback: bool,
}

impl Default for MetricsPolicy {
    fn default() -> Self {
        Self { quality_fallback: true, efficiency_fallback: true }
    }
}

impl From<&MetricsConfig> for MetricsPolicy {
    fn from(cfg: &MetricsConfig) -> Self {
        Self { quality_fallback: cfg.quality_fallback, efficiency_fallback: cfg.efficiency_fallback }
    }
}

/// Model names of the per-category winners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winners {
    pub speed: String,
    pub cost: String,
    pub quality: Option<String>,
    pub efficiency: Option<String>,
}

/// Response length in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseLengthStats {
    pub min: usize,
    pub max: usize,
    pub avg: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMetrics {
    pub winners: Winners,
    /// Mean latency of successful results, rounded to whole ms.
    pub average_response_time: u64,
    /// Sum of successful costs, 2 decimals.
    pub total_cost: String,
    /// Mean of the ratings present, 1 decimal; absent when nothing is rated.
    pub average_rating: Option<f64>,
    pub response_length: ResponseLengthStats,
}

/// [`compute_metrics_with`] under the default policy.
pub fn compute_metrics(results: &[ModelResult]) -> Option<ComparisonMetrics> {
    compute_metrics_with(results, MetricsPolicy::default())
}

pub fn compute_metrics_with(results: &[ModelResult], policy: MetricsPolicy) -> Option<ComparisonMetrics> {
    let ok: Vec<&ModelResult> = results.iter().filter(|r| r.is_success()).collect();
    let first = *ok.first()?;

    let speed = first_best(&ok, |r| r.response_time_ms as f64, Pick::Lowest).unwrap_or(first);
    let cost = first_best(&ok, ModelResult::cost_value, Pick::Lowest).unwrap_or(first);

    let rated: Vec<&ModelResult> = ok.iter().copied().filter(|r| r.rating.is_some()).collect();
    let quality = first_best(&rated, rating_of, Pick::Highest)
        .or(policy.quality_fallback.then_some(first));

    let rated_costed: Vec<&ModelResult> =
        rated.iter().copied().filter(|r| r.cost_value() > 0.0).collect();
    let efficiency = first_best(&rated_costed, |r| rating_of(r) / r.cost_value(), Pick::Highest)
        .or(policy.efficiency_fallback.then_some(cost));

    let n = ok.len() as f64;
    let average_response_time =
        (ok.iter().map(|r| r.response_time_ms as f64).sum::<f64>() / n).round() as u64;
    let total_cost: f64 = ok.iter().map(|r| r.cost_value()).sum();

    let average_rating = (!rated.is_empty()).then(|| {
        let mean = rated.iter().map(|r| rating_of(r)).sum::<f64>() / rated.len() as f64;
        (mean * 10.0).round() / 10.0
    });

    let lengths: Vec<usize> = ok.iter().map(|r| r.response().chars().count()).collect();
    let response_length = ResponseLengthStats {
        min: lengths.iter().copied().min().unwrap_or(0),
        max: lengths.iter().copied().max().unwrap_or(0),
        avg: (lengths.iter().sum::<usize>() as f64 / n).round() as usize,
    };

    Some(ComparisonMetrics {
        winners: Winners {
            speed: speed.model.clone(),
            cost: cost.model.clone(),
            quality: quality.map(|r| r.model.clone()),
            efficiency: efficiency.map(|r| r.model.clone()),
        },
        average_response_time,
        total_cost: format!("{total_cost:.2}"),
        average_rating,
        response_length,
    })
}

#[derive(Clone, Copy)]
enum Pick {
    Lowest,
    Highest,
}

/// Best candidate by `score`; ties go to the earliest.
fn first_best<'a>(
    candidates: &[&'a ModelResult],
    score: impl Fn(&ModelResult) -> f64,
    pick: Pick,
) -> Option<&'a ModelResult> {
    let mut best: Option<(&ModelResult, f64)> = None;
    for &r in candidates {
        let s = score(r);
        let better = match best {
            None => true,
            Some((_, b)) => match pick {
                Pick::Lowest => s < b,
                Pick::Highest => s > b,
            },
        };
        if better {
            best = Some((r, s));
        }
    }
    best.map(|(r, _)| r)
}

fn rating_of(r: &ModelResult) -> f64 {
    r.rating.map(|v| f64::from(v.value())).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playground::types::Rating;
    use chrono::Utc;
    use std::time::Duration;

    fn ok(model: &str, response: &str, cost: &str, ms: u64) -> ModelResult {
        ModelResult::success(model, response.into(), 10, cost.into(), Duration::from_millis(ms))
    }

    fn rate(r: &mut ModelResult, v: u8) {
        r.attach_rating(Rating::try_from(v).unwrap(), Utc::now());
    }

    #[test]
    fn all_failed_has_no_metrics() {
        let results = vec![
            ModelResult::failure("a", "boom", Duration::from_millis(5)),
            ModelResult::failure("b", "request timed out after 30000 ms", Duration::from_millis(30_000)),
        ];
        assert!(compute_metrics(&results).is_none());
        assert!(compute_metrics(&[]).is_none());
    }

    #[test]
    fn speed_and_cost_winners_ignore_failures() {
        let results = vec![
            ModelResult::failure("fast-but-failed", "boom", Duration::from_millis(1)),
            ok("gpt-4o", "Hello there", "0.002000", 800),
            ok("gpt-4o-mini", "Hi", "0.000100", 300),
            ok("claude-3-haiku", "Hey!", "0.000400", 200),
        ];
        let m = compute_metrics(&results).unwrap();
        assert_eq!(m.winners.speed, "claude-3-haiku");
        assert_eq!(m.winners.cost, "gpt-4o-mini");
        assert_eq!(m.average_response_time, 433);
        assert_eq!(m.total_cost, "0.00");
        assert_eq!(m.response_length, ResponseLengthStats { min: 2, max: 11, avg: 6 });
    }

    #[test]
    fn unrated_batch_falls_back() {
        let results = vec![
            ok("gpt-4o", "a", "0.003000", 100),
            ok("gpt-4o-mini", "b", "0.000200", 150),
        ];
        let m = compute_metrics(&results).unwrap();
        assert_eq!(m.winners.quality.as_deref(), Some("gpt-4o"));
        assert_eq!(m.winners.efficiency.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(m.average_rating, None);
    }

    #[test]
    fn fallbacks_can_be_disabled() {
        let results = vec![ok("gpt-4o", "a", "0.003000", 100)];
        let policy = MetricsPolicy { quality_fallback: false, efficiency_fallback: false };
        let m = compute_metrics_with(&results, policy).unwrap();
        assert_eq!(m.winners.quality, None);
        assert_eq!(m.winners.efficiency, None);
    }

    #[test]
    fn rating_moves_quality_and_average() {
        let mut results = vec![
            ok("gpt-4o", "a", "0.004000", 100),
            ok("gpt-4o-mini", "b", "0.001000", 150),
            ok("claude-3-haiku", "c", "0.002000", 120),
        ];
        assert_eq!(compute_metrics(&results).unwrap().winners.quality.as_deref(), Some("gpt-4o"));

        rate(&mut results[1], 5);
        rate(&mut results[2], 2);
        let m = compute_metrics(&results).unwrap();
        assert_eq!(m.winners.quality.as_deref(), Some("gpt-4o-mini"));
        // Unrated gpt-4o does not drag the mean down.
        assert_eq!(m.average_rating, Some(3.5));
    }

    #[test]
    fn efficiency_is_rating_per_cost() {
        let mut results = vec![
            ok("pricey", "a", "0.010000", 100),
            ok("cheap", "b", "0.001000", 100),
            ok("free", "c", "0.00", 100),
        ];
        rate(&mut results[0], 5); // 500 per $
        rate(&mut results[1], 3); // 3000 per $
        rate(&mut results[2], 5); // zero cost, excluded
        let m = compute_metrics(&results).unwrap();
        assert_eq!(m.winners.efficiency.as_deref(), Some("cheap"));
        assert_eq!(m.winners.quality.as_deref(), Some("pricey"));
        assert_eq!(m.winners.cost, "free");
    }

    #[test]
    fn rated_but_free_falls_back_to_cost_winner() {
        let mut results = vec![
            ok("local-a", "a", "0.00", 300),
            ok("local-b", "b", "0.000000", 100),
        ];
        rate(&mut results[0], 2);
        rate(&mut results[1], 5);
        let m = compute_metrics(&results).unwrap();
        assert_eq!(m.winners.cost, "local-a");
        assert_eq!(m.winners.efficiency.as_deref(), Some(m.winners.cost.as_str()));
        assert_eq!(m.winners.quality.as_deref(), Some("local-b"));

        let strict = MetricsPolicy { efficiency_fallback: false, ..MetricsPolicy::default() };
        assert_eq!(compute_metrics_with(&results, strict).unwrap().winners.efficiency, None);
    }

    #[test]
    fn ties_go_to_earliest() {
        let mut results = vec![
            ok("first", "xx", "0.001000", 100),
            ok("second", "yy", "0.001000", 100),
        ];
        rate(&mut results[0], 4);
        rate(&mut results[1], 4);
        let w = compute_metrics(&results).unwrap().winners;
        assert_eq!(w.speed, "first");
        assert_eq!(w.cost, "first");
        assert_eq!(w.quality.as_deref(), Some("first"));
        assert_eq!(w.efficiency.as_deref(), Some("first"));
    }

    #[test]
    fn average_rating_rounds_to_one_decimal() {
        let mut results = vec![ok("a", "", "0.00", 1), ok("b", "", "0.00", 1), ok("c", "", "0.00", 1)];
        rate(&mut results[0], 5);
        rate(&mut results[1], 4);
        rate(&mut results[2], 4);
        assert_eq!(compute_metrics(&results).unwrap().average_rating, Some(4.3));
    }

    #[test]
    fn serializes_camel_case() {
        let m = compute_metrics(&[ok("a", "hello", "1.234000", 10)]).unwrap();
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["winners"]["speed"], "a");
        assert_eq!(v["averageResponseTime"], 10);
        assert_eq!(v["totalCost"], "1.23");
        assert_eq!(v["responseLength"]["avg"], 5);
        assert!(v["averageRating"].is_null());
    }
}
