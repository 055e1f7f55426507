//! RNG abstraction for gait randomization and hover twitches
//!
//! Runs are reproducible: the sequencer seeds a Xoshiro256** generator from
//! the configured seed, and any `rand::Rng` can be injected instead.

/// Random number source used by the simulation
pub trait SimRng {
    /// Generate random f32 in [0.0, 1.0)
    fn gen_f32(&mut self) -> f32;

    /// Random value in [-1.0, 1.0)
    fn gen_signed(&mut self) -> f32 {
        self.gen_f32() * 2.0 - 1.0
    }

    /// Scale `value` by a random factor in [1 - fraction, 1 + fraction)
    fn jitter(&mut self, value: f32, fraction: f32) -> f32 {
        value * (1.0 + self.gen_signed() * fraction)
    }
}

// Blanket implementation for any type implementing rand::Rng
impl<T: ?Sized + rand::Rng> SimRng for T {
    fn gen_f32(&mut self) -> f32 {
        rand::Rng::r#gen(self)
    }
}
