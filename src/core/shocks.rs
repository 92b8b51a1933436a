use std::collections::hash_map::DefaultHasher;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

/// A stream of standard-normal draws consumed by one trial.
pub trait ShockStream {
    fn next_normal(&mut self) -> f64;
}

/// Uniform draws on `[0, 1)`.
pub trait UniformSource {
    fn next_uniform(&mut self) -> f64;
}

/// Hands each trial its own independent stream. Streams are keyed by trial
/// index so results do not depend on which worker runs a trial.
pub trait ShockSource: Sync {
    type Stream: ShockStream;

    fn stream(&self, trial: u32) -> Self::Stream;
}

/// Box–Muller over a uniform source. Only the cosine variate is returned, so
/// the stream holds no state besides the uniform generator.
#[derive(Debug, Clone)]
pub struct BoxMuller<U> {
    uniform: U,
}

impl<U: UniformSource> BoxMuller<U> {
    pub fn new(uniform: U) -> Self {
        Self { uniform }
    }
}

impl<U: UniformSource> ShockStream for BoxMuller<U> {
    fn next_normal(&mut self) -> f64 {
        loop {
            let u1 = self.uniform.next_uniform();
            let u2 = self.uniform.next_uniform();
            if u1 == 0.0 || u2 == 0.0 {
                continue;
            }
            let r = (-2.0 * u1.ln()).sqrt();
            return r * (2.0 * PI * u2).cos();
        }
    }
}

/// xorshift64* generator.
#[derive(Debug, Clone)]
pub struct Xorshift {
    state: u64,
}

impl Xorshift {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

impl UniformSource for Xorshift {
    fn next_uniform(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        (self.next_u64() >> 11) as f64 / DENOM
    }
}

pub fn derive_seed(base_seed: u64, trial: u32) -> u64 {
    splitmix64(base_seed ^ ((trial as u64) << 32) ^ trial as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Seed taken from the wall clock, for hosts that were not given one.
pub fn clock_seed() -> u64 {
    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    hasher.finish()
}

/// Production source: one seeded Box–Muller stream per trial.
#[derive(Debug, Clone, Copy)]
pub struct SeededShocks {
    seed: u64,
}

impl SeededShocks {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl ShockSource for SeededShocks {
    type Stream = BoxMuller<Xorshift>;

    fn stream(&self, trial: u32) -> Self::Stream {
        BoxMuller::new(Xorshift::new(derive_seed(self.seed, trial)))
    }
}

/// Every draw is zero, which collapses the ensemble onto the deterministic path.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroShocks;

impl ShockStream for ZeroShocks {
    fn next_normal(&mut self) -> f64 {
        0.0
    }
}

impl ShockSource for ZeroShocks {
    type Stream = ZeroShocks;

    fn stream(&self, _trial: u32) -> Self::Stream {
        ZeroShocks
    }
}

/// Replays a fixed sequence of draws, wrapping around when exhausted. Every
/// trial starts from the head of the sequence.
#[derive(Debug, Clone)]
pub struct ScriptedShocks {
    draws: Vec<f64>,
    cursor: usize,
}

impl ScriptedShocks {
    pub fn new(draws: Vec<f64>) -> Self {
        Self { draws, cursor: 0 }
    }
}

impl ShockStream for ScriptedShocks {
    fn next_normal(&mut self) -> f64 {
        if self.draws.is_empty() {
            return 0.0;
        }
        let draw = self.draws[self.cursor % self.draws.len()];
        self.cursor += 1;
        draw
    }
}

impl ShockSource for ScriptedShocks {
    type Stream = ScriptedShocks;

    fn stream(&self, _trial: u32) -> Self::Stream {
        ScriptedShocks::new(self.draws.clone())
    }
}
