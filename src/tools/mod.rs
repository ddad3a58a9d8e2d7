// src/tools/mod.rs

use std::path::Path;
use std::sync::{Condvar, Mutex, PoisonError};

pub mod llm;
pub mod val;

pub use llm::OllamaPlanner;
pub use val::{ValValidator, ValidationOutcome, ValidatorVerdict, classify_output};

/// An authoritative plan checker that runs outside the engine.
pub trait PlanValidator: Send + Sync {
    fn name(&self) -> &str;

    /// Judges `actions` (one parenthesized action per line) against the
    /// domain and problem artifacts. Never panics on tool trouble; every
    /// failure is a classified outcome.
    fn validate(&self, domain: &Path, problem: &Path, actions: &[String]) -> ValidationOutcome;
}

impl<V: PlanValidator + ?Sized> PlanValidator for Box<V> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn validate(&self, domain: &Path, problem: &Path, actions: &[String]) -> ValidationOutcome {
        (**self).validate(domain, problem, actions)
    }
}

/// Counting semaphore for blocking callers.
#[derive(Debug)]
pub struct ConcurrencyLimit {
    available: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

impl ConcurrencyLimit {
    /// A limit of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            available: Mutex::new(capacity),
            released: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        *self.available.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a slot is free. The slot is returned when the permit drops.
    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self.available.lock().unwrap_or_else(PoisonError::into_inner);
        while *available == 0 {
            available = self
                .released
                .wait(available)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *available -= 1;
        Permit { limit: self }
    }
}

pub struct Permit<'a> {
    limit: &'a ConcurrencyLimit,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut available = self
            .limit
            .available
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *available += 1;
        self.limit.released.notify_one();
    }
}

/// Caps how many validator processes run at once across threads sharing it.
pub struct BoundedValidator<V> {
    inner: V,
    limit: ConcurrencyLimit,
}

impl<V: PlanValidator> BoundedValidator<V> {
    pub fn new(inner: V, max_concurrent: usize) -> Self {
        Self {
            inner,
            limit: ConcurrencyLimit::new(max_concurrent),
        }
    }

    pub fn limit(&self) -> &ConcurrencyLimit {
        &self.limit
    }
}

impl<V: PlanValidator> PlanValidator for BoundedValidator<V> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn validate(&self, domain: &Path, problem: &Path, actions: &[String]) -> ValidationOutcome {
        let _permit = self.limit.acquire();
        self.inner.validate(domain, problem, actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct SlowValidator {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PlanValidator for SlowValidator {
        fn name(&self) -> &str {
            "slow"
        }

        fn validate(&self, _: &Path, _: &Path, _: &[String]) -> ValidationOutcome {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.running.fetch_sub(1, Ordering::SeqCst);
            ValidationOutcome::valid(String::new())
        }
    }

    #[test]
    fn permits_return_on_drop() {
        let limit = ConcurrencyLimit::new(2);
        {
            let _a = limit.acquire();
            let _b = limit.acquire();
            assert_eq!(limit.available(), 0);
        }
        assert_eq!(limit.available(), 2);
        assert_eq!(ConcurrencyLimit::new(0).capacity(), 1);
    }

    #[test]
    fn bounded_validator_never_exceeds_its_limit() {
        let validator = Arc::new(BoundedValidator::new(
            SlowValidator {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            },
            2,
        ));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let validator = Arc::clone(&validator);
                thread::spawn(move || {
                    validator.validate(Path::new("d"), Path::new("p"), &["(pick-up a)".into()])
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_valid());
        }

        assert!(validator.inner.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(validator.limit().available(), 2);
    }
}
