//! Time and randomness leaves, injected into the engine so tests can pin
//! the clock and script the generated codes.

use mongodb::bson::DateTime;
use rand::Rng;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        DateTime::now()
    }
}

pub trait CodeSource: Send + Sync {
    /// Six ASCII digits, leading zeros preserved. Collisions across time
    /// are acceptable.
    fn six_digits(&self) -> String;
}

pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn six_digits(&self) -> String {
        let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("{code:06}")
    }
}
