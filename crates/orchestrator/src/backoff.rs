//! Exponential backoff with jitter for `RETRY(n)` (spec §4.3: base 250ms,
//! factor 2, cap 5s, ±20% jitter).

use std::time::Duration;

use rand::Rng;

use crate::config::OrchestratorConfig;

/// Compute the delay before retry attempt `attempt` (1-based: the delay
/// before the *first* retry is `attempt == 1`).
pub fn compute_delay(config: &OrchestratorConfig, attempt: u32, rng: &mut impl Rng) -> Duration {
    let unjittered = (config.retry_base_delay_ms as f64) * config.retry_factor.powi(attempt.saturating_sub(1) as i32);
    let capped = unjittered.min(config.retry_cap_ms as f64);
    let jitter_span = capped * config.retry_jitter_pct;
    let jittered = capped + rng.gen_range(-jitter_span..=jitter_span);
    Duration::from_millis(jittered.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn first_retry_is_roughly_base_delay() {
        let config = OrchestratorConfig::default();
        let mut rng = StepRng::new(u64::MAX / 2, 0);
        let delay = compute_delay(&config, 1, &mut rng);
        assert!(delay.as_millis() >= 200 && delay.as_millis() <= 300, "got {delay:?}");
    }

    #[test]
    fn delay_is_capped() {
        let config = OrchestratorConfig::default();
        let mut rng = StepRng::new(u64::MAX / 2, 0);
        let delay = compute_delay(&config, 10, &mut rng);
        assert!(delay.as_millis() <= 6_000, "got {delay:?}");
    }

    #[test]
    fn delay_grows_exponentially_before_cap() {
        let config = OrchestratorConfig::default();
        let mut rng = StepRng::new(u64::MAX / 2, 0);
        let first = compute_delay(&config, 1, &mut rng).as_millis();
        let second = compute_delay(&config, 2, &mut rng).as_millis();
        assert!(second > first);
    }
}
