//! Synthetic cohort generation with controlled label noise.
//!
//! Measurements follow linear age-driven growth curves plus Gaussian noise.
//! Labels come from the clinical rules in [`super::domain`], then each label
//! is independently corrupted with probability `noise_rate` so trained models
//! see overlapping classes near the thresholds.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::config::GeneratorCfg;
use crate::common::error::{ScreenError, ScreenResult};
use crate::common::time;

use super::domain::{
    acute_rule, check_anemia, expected_height, expected_weight, stunting_rule, AcuteClass,
    ChildRecord, LabeledRecord, Labels, Sex, MAX_AGE_MONTHS, MIN_AGE_MONTHS,
};

const HEIGHT_SD: f64 = 5.0;
const WEIGHT_SD: f64 = 2.0;
const MUAC_MEAN: f64 = 135.0;
const MUAC_SD: f64 = 15.0;
const HB_MEAN: f64 = 11.5;
const HB_SD: f64 = 1.5;

/// Labeled cohort generator. The random source is always supplied by the caller.
#[derive(Clone, Debug)]
pub struct CohortGenerator {
    noise_rate: f64,
}

impl Default for CohortGenerator {
    fn default() -> Self {
        Self { noise_rate: 0.05 }
    }
}

impl CohortGenerator {
    pub fn new(noise_rate: f64) -> ScreenResult<Self> {
        if !(0.0..=1.0).contains(&noise_rate) {
            return Err(ScreenError::config(format!(
                "noise_rate {noise_rate} outside [0, 1]"
            )));
        }
        Ok(Self { noise_rate })
    }

    pub fn from_cfg(cfg: &GeneratorCfg) -> ScreenResult<Self> {
        Self::new(cfg.noise_rate)
    }

    pub fn noise_rate(&self) -> f64 {
        self.noise_rate
    }

    /// Produce `n` labeled records. Draw order per record is fixed, so a seeded
    /// `rng` reproduces the same cohort exactly.
    pub fn generate<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<LabeledRecord> {
        (0..n).map(|_| self.draw_one(rng)).collect()
    }

    fn draw_one<R: Rng + ?Sized>(&self, rng: &mut R) -> LabeledRecord {
        let age = rng.gen_range(MIN_AGE_MONTHS..=MAX_AGE_MONTHS);
        let sex = if rng.gen_bool(0.5) { Sex::Male } else { Sex::Female };
        let height = positive_normal(rng, expected_height(age), HEIGHT_SD);
        let weight = positive_normal(rng, expected_weight(age), WEIGHT_SD);
        let muac = normal(rng, MUAC_MEAN, MUAC_SD);
        let hb = normal(rng, HB_MEAN, HB_SD);

        let record = ChildRecord {
            age,
            sex,
            weight,
            height,
            muac,
            hb,
        };

        let labels = Labels {
            acute: self.noisy_acute(acute_rule(muac), rng),
            stunting: self.noisy_flag(stunting_rule(age, height), rng),
            anemia: check_anemia(hb),
        };

        LabeledRecord { record, labels }
    }

    fn noisy_acute<R: Rng + ?Sized>(&self, base: AcuteClass, rng: &mut R) -> AcuteClass {
        if rng.gen::<f64>() < self.noise_rate {
            AcuteClass::ALL[rng.gen_range(0..AcuteClass::ALL.len())]
        } else {
            base
        }
    }

    fn noisy_flag<R: Rng + ?Sized>(&self, base: bool, rng: &mut R) -> bool {
        if rng.gen::<f64>() < self.noise_rate {
            !base
        } else {
            base
        }
    }
}

/// Box-Muller sample from N(mean, sd).
fn normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, sd: f64) -> f64 {
    // u1 in (0, 1] keeps ln() finite
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + sd * z
}

/// Redraws until the sample is strictly positive (weight/height cannot be <= 0).
fn positive_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, sd: f64) -> f64 {
    loop {
        let v = normal(rng, mean, sd);
        if v > 0.0 {
            return v;
        }
    }
}

/// Generate a cohort per configuration. `seed = None` draws from OS entropy.
pub fn generate_cohort(cfg: &GeneratorCfg, seed: Option<u64>) -> ScreenResult<Vec<LabeledRecord>> {
    let start = Instant::now();
    let generator = CohortGenerator::from_cfg(cfg)?;
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let cohort = generator.generate(cfg.cohort_size, &mut rng);

    tracing::info!(
        ev = "cohort_generated",
        rows = cohort.len(),
        noise_rate = generator.noise_rate(),
        seeded = seed.is_some(),
        dur_ms = time::elapsed_ms(start),
    );
    Ok(cohort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::{bmi, STUNTING_HEIGHT_RATIO};
    use proptest::prelude::*;

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn rejects_bad_noise_rate() {
        assert!(CohortGenerator::new(-0.1).is_err());
        assert!(CohortGenerator::new(1.01).is_err());
        assert!(CohortGenerator::new(0.0).is_ok());
    }

    #[test]
    fn same_seed_same_cohort() {
        let gen = CohortGenerator::default();
        let a = gen.generate(300, &mut seeded(11));
        let b = gen.generate(300, &mut seeded(11));
        assert_eq!(a, b);

        let c = gen.generate(300, &mut seeded(12));
        assert_ne!(a, c);
    }

    #[test]
    fn marginals_are_roughly_right() {
        let gen = CohortGenerator::default();
        let cohort = gen.generate(4000, &mut seeded(3));
        let n = cohort.len() as f64;
        let mean = |f: fn(&ChildRecord) -> f64| cohort.iter().map(|r| f(&r.record)).sum::<f64>() / n;

        assert!((mean(|r| r.muac) - 135.0).abs() < 1.5);
        assert!((mean(|r| r.hb) - 11.5).abs() < 0.15);
        assert!((mean(|r| f64::from(r.age)) - 32.5).abs() < 1.5);
        let males = cohort.iter().filter(|r| r.record.sex == Sex::Male).count() as f64;
        assert!((males / n - 0.5).abs() < 0.05);
    }

    #[test]
    fn noise_rate_is_observable() {
        let gen = CohortGenerator::new(0.05).unwrap();
        let cohort = gen.generate(5000, &mut seeded(5));
        let flipped = cohort
            .iter()
            .filter(|r| r.labels.stunting != stunting_rule(r.record.age, r.record.height))
            .count() as f64;
        let rate = flipped / cohort.len() as f64;
        assert!(rate > 0.03 && rate < 0.07, "observed stunting flip rate {rate}");
    }

    #[test]
    fn full_noise_still_yields_valid_labels() {
        let gen = CohortGenerator::new(1.0).unwrap();
        let cohort = gen.generate(500, &mut seeded(8));
        assert!(cohort
            .iter()
            .all(|r| r.labels.stunting != stunting_rule(r.record.age, r.record.height)));
    }

    #[test]
    fn generate_cohort_honours_seed() {
        let cfg = GeneratorCfg {
            cohort_size: 50,
            noise_rate: 0.05,
        };
        let a = generate_cohort(&cfg, Some(9)).unwrap();
        let b = generate_cohort(&cfg, Some(9)).unwrap();
        assert_eq!(a.len(), 50);
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn records_stay_in_domain(seed in any::<u64>()) {
            let cohort = CohortGenerator::default().generate(64, &mut seeded(seed));
            for r in &cohort {
                let c = &r.record;
                prop_assert!((MIN_AGE_MONTHS..=MAX_AGE_MONTHS).contains(&c.age));
                prop_assert!(c.weight > 0.0);
                prop_assert!(c.height > 0.0);
                prop_assert!(r.labels.acute.label() <= 2);
                prop_assert_eq!(c.bmi(), bmi(c.weight, c.height));
                prop_assert_eq!(c.bmi(), c.weight / ((c.height / 100.0) * (c.height / 100.0)));
                prop_assert_eq!(r.labels.anemia, c.hb < 11.0);
            }
        }

        #[test]
        fn zero_noise_labels_are_step_functions(seed in any::<u64>()) {
            let gen = CohortGenerator::new(0.0).unwrap();
            for r in gen.generate(64, &mut seeded(seed)) {
                let c = &r.record;
                let acute = if c.muac < 110.0 {
                    AcuteClass::Sam
                } else if c.muac < 125.0 {
                    AcuteClass::Mam
                } else {
                    AcuteClass::Normal
                };
                prop_assert_eq!(r.labels.acute, acute);
                prop_assert_eq!(r.labels.stunting, c.height_for_age() < STUNTING_HEIGHT_RATIO);
            }
        }
    }
}
