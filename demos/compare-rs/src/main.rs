pub mod context;
pub mod scenario;

use epi_rt::{
    BackwardCohortEstimator, CaseReproductionIntegrator, Credible, EstimateCache, Method,
    RtEstimate, SlidingWindowEstimator, cache_key, comparison_table,
};

use context::RunContext;
use scenario::Scenario;

fn main() {
    let ctx: RunContext<Scenario> = RunContext::load();
    let scenario = &ctx.scenario;
    scenario.estimator.validate().expect("invalid estimator configuration");

    // Ground truth
    let generator = scenario.generator().expect("invalid scenario");
    let state = if scenario.stochastic {
        generator.run_stochastic(ctx.seed)
    } else {
        generator.run_deterministic()
    }
    .expect("simulation failed");
    let incidence = state.incidence();
    let truth: Vec<RtEstimate> = state
        .true_rt()
        .iter()
        .enumerate()
        .map(|(step, &rt)| RtEstimate {
            step,
            method: Method::TrueRt,
            value: Some(Credible::point(rt)),
        })
        .collect();

    let si = scenario
        .estimator
        .serial_interval()
        .expect("invalid serial interval");
    let cache = match ctx.output_dir() {
        Some(dir) => EstimateCache::with_dir(dir.join("cache")),
        None => EstimateCache::in_memory(),
    };

    // Sliding window
    let window = scenario.estimator.window().expect("invalid window");
    let cori = SlidingWindowEstimator::new(
        window,
        epi_rt::GammaPrior::default(),
        scenario.estimator.confidence_level,
    )
    .expect("invalid estimator settings");
    let key = cache_key(Method::SlidingWindow, &scenario.estimator, &incidence);
    let cori_out = cache
        .get_or_compute(&key, || cori.estimate(&incidence, &si))
        .expect("sliding-window estimation failed");

    // Backward cohort
    let cohort = BackwardCohortEstimator::new(
        scenario.estimator.resample_count,
        scenario.estimator.confidence_level,
        scenario.estimator.random_seed,
    )
    .expect("invalid estimator settings");
    let key = cache_key(Method::BackwardCohort, &scenario.estimator, &incidence);
    let cohort_out = cache
        .get_or_compute(&key, || cohort.estimate(&incidence, &si))
        .expect("backward-cohort estimation failed");

    // Deterministic reference from the same schedule
    let schedule = scenario.schedule().expect("invalid scenario");
    let integrator = CaseReproductionIntegrator::new(
        &schedule,
        scenario.seir_params(),
        scenario.horizon,
        scenario.integration_dt,
    )
    .expect("invalid integrator settings");
    let reference = integrator.run().expect("integration failed");

    let rows: Vec<Vec<String>> = comparison_table(&[&truth, &cori_out, &cohort_out, &reference])
        .iter()
        .map(|row| {
            let (mean, lower, upper) = match row.value {
                Some(v) => (
                    format!("{:.6}", v.mean),
                    format!("{:.6}", v.lower),
                    format!("{:.6}", v.upper),
                ),
                // Missing estimates stay empty, never a sentinel number.
                None => (String::new(), String::new(), String::new()),
            };
            vec![row.step.to_string(), row.method.to_string(), mean, lower, upper]
        })
        .collect();

    ctx.write_csv(
        "rt_comparison.csv",
        &["step", "method", "mean", "lower", "upper"],
        &rows,
    );
}
