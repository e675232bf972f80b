//! Deterministic CPU load generation for scaling studies.

use std::time::{Duration, Instant};

use core_events::EventStore;
use core_plugin::{
    api, declare_processor, Component, ComponentBase, InitContext, ProcessingError, Processor,
};
use tracing::debug;

/// Busy-crunches the CPU for `CrunchTime` milliseconds per event, smeared by
/// `CrunchSigma` using the event's random seed so the load pattern is
/// reproducible run to run.
pub struct CpuCrunch {
    base: ComponentBase,
    crunch_time_ms: f64,
    crunch_sigma_ms: f64,
}

impl CpuCrunch {
    pub fn new() -> Self {
        let mut base = ComponentBase::new("CpuCrunch");
        base.set_description("Crunches CPU time for a configurable number of milliseconds");
        let params = base.parameters_mut();
        params
            .register::<i64>("CrunchTime", "The crunching time (unit ms)", Some(200))
            .expect("fresh parameter set");
        params
            .register::<f64>(
                "CrunchSigma",
                "Smearing factor on the crunching time (unit ms)",
                Some(0.0),
            )
            .expect("fresh parameter set");
        params
            .set_validator::<i64, _>("CrunchTime", |t| *t >= 0)
            .expect("parameter registered above");
        params
            .set_validator::<f64, _>("CrunchSigma", |s| *s >= 0.0)
            .expect("parameter registered above");
        Self {
            base,
            crunch_time_ms: 200.0,
            crunch_sigma_ms: 0.0,
        }
    }
}

impl Default for CpuCrunch {
    fn default() -> Self {
        Self::new()
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Approximately normal deviate in units of sigma (Irwin-Hall, 12 draws).
fn gaussian_deviate(seed: u32) -> f64 {
    let mut state = u64::from(seed);
    let sum: f64 = (0..12)
        .map(|_| splitmix64(&mut state) as f64 / u64::MAX as f64)
        .sum();
    sum - 6.0
}

fn crunch_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}

impl Component for CpuCrunch {
    fn base(&self) -> &ComponentBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }
}

impl Processor for CpuCrunch {
    fn init(&mut self, ctx: &mut InitContext<'_>) -> Result<(), ProcessingError> {
        self.crunch_time_ms = self
            .base
            .parameters()
            .get::<i64>("CrunchTime")
            .unwrap_or(200) as f64;
        self.crunch_sigma_ms = self
            .base
            .parameters()
            .get::<f64>("CrunchSigma")
            .unwrap_or(0.0);
        api::register_for_random_seeds(self, ctx);
        Ok(())
    }

    fn process_event(&self, event: &mut EventStore) -> Result<(), ProcessingError> {
        let seed = api::random_seed(self, event)?;
        let total_ms =
            (self.crunch_time_ms + gaussian_deviate(seed) * self.crunch_sigma_ms).max(0.0);
        debug!(
            target: "runtime.processor",
            name = self.name(),
            uid = event.uid(),
            total_ms,
            "crunching"
        );
        crunch_for(Duration::from_secs_f64(total_ms / 1_000.0));
        Ok(())
    }
}

declare_processor!("CpuCrunch", CpuCrunch);
