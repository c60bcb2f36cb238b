// tests/scaled_read_tests.rs
//
// Statistical checks of the scaled reads, driven by a seeded PRNG instead of
// hardware.
use quantis::{RandomSource, Result};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

struct Seeded(StdRng);

impl Seeded {
    fn new(seed: u64) -> Self {
        Seeded(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for Seeded {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.0.fill_bytes(buf);
        Ok(buf.len())
    }
}

/// Chi-square statistic of `counts` against a uniform expectation.
fn chi_square(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    let expected = total as f64 / counts.len() as f64;
    counts
        .iter()
        .map(|&c| {
            let d = c as f64 - expected;
            d * d / expected
        })
        .sum()
}

#[test]
fn test_scaled_int_is_uniform_over_small_range() -> Result<()> {
    let mut src = Seeded::new(0x5eed);
    let mut counts = [0u64; 3];
    for _ in 0..30_000 {
        let value = src.read_scaled_int(0, 2)?;
        counts[value as usize] += 1;
    }
    // 2 degrees of freedom, p = 0.0001
    let stat = chi_square(&counts);
    assert!(stat < 18.42, "chi-square {} for counts {:?}", stat, counts);
    Ok(())
}

#[test]
fn test_scaled_short_is_uniform_over_dice() -> Result<()> {
    let mut src = Seeded::new(42);
    let mut counts = [0u64; 6];
    for _ in 0..30_000 {
        let value = src.read_scaled_short(1, 6)?;
        counts[(value - 1) as usize] += 1;
    }
    // 5 degrees of freedom, p = 0.0001
    let stat = chi_square(&counts);
    assert!(stat < 25.75, "chi-square {} for counts {:?}", stat, counts);
    Ok(())
}

#[test]
fn test_scaled_values_stay_in_bounds() -> Result<()> {
    let mut src = Seeded::new(7);
    for _ in 0..5_000 {
        let i = src.read_scaled_int(-1_000, 1_000)?;
        assert!((-1_000..=1_000).contains(&i));

        let s = src.read_scaled_short(i16::MIN, i16::MAX)?;
        assert!((i16::MIN..=i16::MAX).contains(&s));

        let d = src.read_scaled_double(0.01, 100.0)?;
        assert!((0.01..100.0).contains(&d));

        let f = src.read_scaled_float(1.0, 25.99)?;
        assert!((1.0..25.99).contains(&f));

        let u = src.read_double_01()?;
        assert!((0.0..1.0).contains(&u));
    }
    Ok(())
}

#[test]
fn test_scaled_int_vec_bounds_and_length() -> Result<()> {
    let mut src = Seeded::new(99);
    let values = src.read_scaled_int_vec(1_000, 1, 100)?;
    assert_eq!(values.len(), 1_000);
    assert!(values.iter().all(|v| (1..=100).contains(v)));
    Ok(())
}
