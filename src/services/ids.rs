use rand::{Rng, RngCore};
use uuid::Uuid;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const CODE_SCHEME: &str = "DC";

#[derive(thiserror::Error, Debug)]
pub enum IdError {
    #[error("Random source unavailable")]
    RandomUnavailable,
}

/// Source of randomness for codes, PINs and identifiers.
///
/// `OsRng` in production, `StdRng::seed_from_u64` for reproducible sessions.
/// Draws go through `try_fill_bytes`, so a failing source surfaces as
/// `IdError` instead of a panic.
pub trait RandomSource: RngCore + Send {}

impl<R: RngCore + Send> RandomSource for R {}

/// Samples through a fallible source, remembering the first failure.
///
/// After a failure every draw yields zero bytes, which uniform sampling
/// accepts on the first try, so the caller's closure always finishes.
struct Checked<'a> {
    source: &'a mut dyn RandomSource,
    failure: Option<rand::Error>,
}

impl RngCore for Checked<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if self.failure.is_none() {
            match self.source.try_fill_bytes(dest) {
                Ok(()) => return,
                Err(e) => self.failure = Some(e),
            }
        }
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn sample<T>(
    source: &mut dyn RandomSource,
    draw: impl FnOnce(&mut Checked<'_>) -> T,
) -> Result<T, IdError> {
    let mut rng = Checked {
        source,
        failure: None,
    };
    let value = draw(&mut rng);
    match rng.failure {
        Some(e) => {
            tracing::warn!(error = %e, "Random source failed");
            Err(IdError::RandomUnavailable)
        }
        None => Ok(value),
    }
}

/// `len` uppercase base-36 characters, each drawn uniformly
pub fn base36(rng: &mut dyn RandomSource, len: usize) -> Result<String, IdError> {
    sample(rng, |r| {
        (0..len)
            .map(|_| BASE36[r.gen_range(0u32..36) as usize] as char)
            .collect()
    })
}

/// Coupon code in the form `DC-XXXXXX-YYYY`
pub fn coupon_code(rng: &mut dyn RandomSource) -> Result<String, IdError> {
    let first = base36(rng, 6)?;
    let second = base36(rng, 4)?;
    Ok(format!("{}-{}-{}", CODE_SCHEME, first, second))
}

/// Four decimal digits in 1000..=9999
pub fn pin(rng: &mut dyn RandomSource) -> Result<String, IdError> {
    sample(rng, |r| r.gen_range(1000u32..=9999).to_string())
}

/// Opaque application number, e.g. `AP-K3Z9Q1`
pub fn application_number(rng: &mut dyn RandomSource) -> Result<String, IdError> {
    Ok(format!("AP-{}", base36(rng, 6)?))
}

/// Random (v4) UUID drawn from the given source
pub fn uuid(rng: &mut dyn RandomSource) -> Result<Uuid, IdError> {
    let bytes = sample(rng, |r| {
        let mut bytes = [0u8; 16];
        r.fill_bytes(&mut bytes);
        bytes
    })?;
    Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
}

/// Replays a fixed list of `u32` values, cycling when exhausted. An empty
/// list fails every draw.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    values: Vec<u32>,
    cursor: usize,
}

#[cfg(test)]
impl SequenceRandom {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, cursor: 0 }
    }
}

#[cfg(test)]
impl RngCore for SequenceRandom {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if self.try_fill_bytes(dest).is_err() {
            dest.fill(0);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        if self.values.is_empty() {
            return Err(rand::Error::new(IdError::RandomUnavailable));
        }
        for chunk in dest.chunks_mut(4) {
            let value = self.values[self.cursor % self.values.len()];
            self.cursor += 1;
            chunk.copy_from_slice(&value.to_le_bytes()[..chunk.len()]);
        }
        Ok(())
    }
}
