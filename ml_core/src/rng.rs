use rand::{rngs::StdRng, SeedableRng};

/// Creates the generator used for initialization, minibatch sampling and
/// dropout masks.
///
/// # Arguments
/// * `seed` - When given, the generator is deterministic.
pub fn generate_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn seeded_generators_agree() {
        let a: u64 = generate_rng(Some(42)).random();
        let b: u64 = generate_rng(Some(42)).random();
        assert_eq!(a, b);
    }
}
