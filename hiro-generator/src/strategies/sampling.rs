use crate::uncertainty::UncertaintySet;
use ndarray::Array2;
use rand::Rng;
use statrs::function::erf::{erf, erf_inv};

const DEGENERATE_WIDTH: f64 = 1e-12;

pub(crate) fn generate_uniform<R: Rng>(
    rng: &mut R,
    uncertainty: &UncertaintySet,
    num_scenarios: usize,
) -> Array2<f64> {
    sample_rows(uncertainty, num_scenarios, |l, u| {
        if u - l <= DEGENERATE_WIDTH {
            l
        } else {
            rng.gen_range(l..=u)
        }
    })
}

pub(crate) fn generate_normal<R: Rng>(
    rng: &mut R,
    uncertainty: &UncertaintySet,
    num_scenarios: usize,
) -> Array2<f64> {
    sample_rows(uncertainty, num_scenarios, |l, u| {
        if u - l <= DEGENERATE_WIDTH {
            l
        } else {
            truncated_normal_sample(rng, 0.5 * (l + u), (u - l) / 6.0, l, u).clamp(l, u)
        }
    })
}

fn sample_rows<F: FnMut(f64, f64) -> f64>(
    uncertainty: &UncertaintySet,
    num_scenarios: usize,
    mut sample: F,
) -> Array2<f64> {
    let n = uncertainty.num_elements();
    let mut costs = Array2::zeros((num_scenarios, n));
    for mut row in costs.rows_mut() {
        let sampled: Vec<f64> = uncertainty
            .lower()
            .iter()
            .zip(uncertainty.upper())
            .map(|(&l, &u)| sample(l, u))
            .collect();
        for (dst, value) in row.iter_mut().zip(uncertainty.fit_budget(sampled)) {
            *dst = value;
        }
    }
    costs
}

fn truncated_normal_sample<T: Rng>(
    rng: &mut T,
    mean: f64,
    std_dev: f64,
    min_val: f64,
    max_val: f64,
) -> f64 {
    let cdf_min = 0.5 * (1.0 + erf((min_val - mean) / (std_dev * (2.0_f64).sqrt())));
    let cdf_max = 0.5 * (1.0 + erf((max_val - mean) / (std_dev * (2.0_f64).sqrt())));
    let sample = rng.gen::<f64>() * (cdf_max - cdf_min) + cdf_min;
    mean + std_dev * (2.0_f64).sqrt() * erf_inv(2.0 * sample - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_degenerate_box_returns_bound() {
        let uncertainty = UncertaintySet::new(vec![0.0, 0.0], vec![0.0, 0.0], None).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        assert!(generate_uniform(&mut rng, &uncertainty, 1).iter().all(|&c| c == 0.0));
        assert!(generate_normal(&mut rng, &uncertainty, 1).iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_normal_samples_stay_in_box() {
        let uncertainty = UncertaintySet::new(vec![1.0, 5.0, 2.0], vec![3.0, 9.0, 2.5], None).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let costs = generate_normal(&mut rng, &uncertainty, 50);
        for row in costs.rows() {
            assert!(uncertainty.contains(row.as_slice().unwrap(), 0.0));
        }
    }

    #[test]
    fn test_rows_are_fitted_to_budget() {
        let uncertainty = UncertaintySet::new(vec![1.0, 1.0], vec![10.0, 10.0], Some(4.0)).unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        let costs = generate_uniform(&mut rng, &uncertainty, 20);
        for row in costs.rows() {
            assert!(row.sum() <= 4.0 + 1e-9);
            assert!(row.iter().all(|&c| c >= 1.0));
        }
    }
}
