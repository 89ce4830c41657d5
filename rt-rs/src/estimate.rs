use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which producer an estimate row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    SlidingWindow,
    BackwardCohort,
    CaseReproduction,
    TrueRt,
}

impl Method {
    pub fn tag(&self) -> &'static str {
        match self {
            Method::SlidingWindow => "sliding_window",
            Method::BackwardCohort => "backward_cohort",
            Method::CaseReproduction => "case_reproduction",
            Method::TrueRt => "true_rt",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Point estimate with interval bounds. Invariant: lower <= mean <= upper.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Credible {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Credible {
    /// A degenerate interval for deterministic quantities (true Rt, integrator output).
    pub fn point(mean: f64) -> Self {
        Credible {
            mean,
            lower: mean,
            upper: mean,
        }
    }
}

/// One estimate at one reporting step. `value` is `None` where the method
/// has nothing defensible to report (not enough history, unstable tail);
/// missing is never encoded as a sentinel number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RtEstimate {
    pub step: usize,
    pub method: Method,
    pub value: Option<Credible>,
}

/// Full outer join of several estimate series by step.
///
/// Every step present in any input yields one row per input series, with
/// `value: None` where that series lacks the step. Rows come back sorted
/// by (step, method); nothing is dropped.
pub fn comparison_table(series: &[&[RtEstimate]]) -> Vec<RtEstimate> {
    let steps: BTreeSet<usize> = series
        .iter()
        .flat_map(|s| s.iter().map(|e| e.step))
        .collect();

    let mut rows = Vec::with_capacity(steps.len() * series.len());
    for &step in &steps {
        for s in series {
            let method = match s.first() {
                Some(e) => e.method,
                None => continue,
            };
            let value = s
                .iter()
                .find(|e| e.step == step)
                .and_then(|e| e.value);
            rows.push(RtEstimate {
                step,
                method,
                value,
            });
        }
    }
    rows.sort_by_key(|r| (r.step, r.method));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn est(step: usize, method: Method, mean: f64) -> RtEstimate {
        RtEstimate {
            step,
            method,
            value: Some(Credible::point(mean)),
        }
    }

    #[test]
    fn test_join_fills_nulls() {
        let a = vec![est(1, Method::SlidingWindow, 1.0), est(2, Method::SlidingWindow, 1.1)];
        let b = vec![est(2, Method::BackwardCohort, 0.9), est(3, Method::BackwardCohort, 0.8)];
        let rows = comparison_table(&[&a, &b]);
        // 3 steps x 2 methods
        assert_eq!(rows.len(), 6);
        let missing: Vec<_> = rows.iter().filter(|r| r.value.is_none()).collect();
        assert_eq!(missing.len(), 2);
        assert!(missing.iter().any(|r| r.step == 1 && r.method == Method::BackwardCohort));
        assert!(missing.iter().any(|r| r.step == 3 && r.method == Method::SlidingWindow));
    }

    #[test]
    fn test_join_empty_series_skipped() {
        let a = vec![est(0, Method::TrueRt, 2.0)];
        let rows = comparison_table(&[&a, &[]]);
        assert_eq!(rows.len(), 1);
    }
}
