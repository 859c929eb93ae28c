//! Arity-specialized bucket implementations
//!
//! Call sites that pass their boundaries as separate scalar arguments know the
//! argument count at bind time. [`VariadicSpecializer`] builds one
//! [`BucketImplementation`] per distinct arity and hands the same shared handle
//! back to every later request for that arity.
//!
//! ```rust
//! use bucketfn::variadic::specializer;
//! use std::sync::Arc;
//!
//! let bucket3 = specializer().get_implementation(3).unwrap();
//! assert_eq!(bucket3.invoke(&[7.0, 5.0, 10.0]).unwrap(), 1);
//! assert!(Arc::ptr_eq(&bucket3, &specializer().get_implementation(3).unwrap()));
//! ```

mod kernel;

pub use kernel::{BucketImplementation, MAX_UNROLLED_ARITY};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::BucketError;

/// Hard ceiling on the number of arguments a bucket call may take
pub const MAX_ARITY: usize = 254;

/// Configuration for a [`VariadicSpecializer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecializerOptions {
    /// Largest accepted arity (default and maximum: 254)
    pub max_arity: usize,

    /// Arities up to this value get a const-generic kernel (default: 16)
    pub unroll_limit: usize,

    /// Initial capacity of the implementation cache
    pub initial_capacity: usize,
}

impl Default for SpecializerOptions {
    fn default() -> Self {
        Self {
            max_arity: MAX_ARITY,
            unroll_limit: MAX_UNROLLED_ARITY,
            initial_capacity: 16,
        }
    }
}

impl SpecializerOptions {
    /// Set the largest accepted arity
    pub fn with_max_arity(mut self, max_arity: usize) -> Self {
        self.max_arity = max_arity;
        self
    }

    /// Set the largest arity that gets an unrolled kernel
    ///
    /// Use 0 to always generate scanning kernels.
    pub fn with_unroll_limit(mut self, unroll_limit: usize) -> Self {
        self.unroll_limit = unroll_limit;
        self
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, BucketError> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| BucketError::InvalidOptions {
                reason: e.to_string(),
            })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), BucketError> {
        if self.max_arity < 2 || self.max_arity > MAX_ARITY {
            return Err(BucketError::InvalidOptions {
                reason: format!("max_arity must be within 2..={}, got {}", MAX_ARITY, self.max_arity),
            });
        }
        if self.unroll_limit > MAX_UNROLLED_ARITY {
            return Err(BucketError::InvalidOptions {
                reason: format!(
                    "unroll_limit must be at most {}, got {}",
                    MAX_UNROLLED_ARITY, self.unroll_limit
                ),
            });
        }
        Ok(())
    }

    /// Check that a call site with `arity` arguments can be specialized
    pub fn check_arity(&self, arity: usize) -> Result<(), BucketError> {
        if arity < 2 {
            return Err(BucketError::InvalidArgumentCount { arity });
        }
        if arity > self.max_arity {
            return Err(BucketError::NotSupported {
                arity,
                max: self.max_arity,
            });
        }
        Ok(())
    }
}

/// Facility that turns an arity into a callable implementation
///
/// Implementations must be pure in `arity`: building twice for the same arity
/// has to yield behaviorally identical routines.
///
/// `synthesize` runs while the specializer holds the cache lock for `arity`'s
/// shard. It must not call back into the specializer that invoked it: a nested
/// `get_implementation` on the same instance deadlocks.
pub trait Synthesize: Send + Sync {
    fn synthesize(
        &self,
        arity: usize,
        options: &SpecializerOptions,
    ) -> Result<BucketImplementation, BucketError>;
}

/// Default synthesizer producing the first-match kernels
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelSynthesizer;

impl Synthesize for KernelSynthesizer {
    fn synthesize(
        &self,
        arity: usize,
        options: &SpecializerOptions,
    ) -> Result<BucketImplementation, BucketError> {
        BucketImplementation::synthesize(arity, options.unroll_limit)
    }
}

/// Memoizing factory of bucket implementations keyed by arity
///
/// Entries are built once and kept for the lifetime of the specializer.
/// A build holds the cache entry for its arity, so concurrent first requests
/// for the same arity wait for that single build and share its result.
/// A failed build leaves no entry behind and is retried on the next request.
pub struct VariadicSpecializer<S: Synthesize = KernelSynthesizer> {
    options: SpecializerOptions,
    synthesizer: S,
    cache: DashMap<usize, Arc<BucketImplementation>>,
}

impl VariadicSpecializer<KernelSynthesizer> {
    pub fn new(options: SpecializerOptions) -> Result<Self, BucketError> {
        Self::with_synthesizer(options, KernelSynthesizer)
    }
}

impl Default for VariadicSpecializer<KernelSynthesizer> {
    fn default() -> Self {
        let options = SpecializerOptions::default();
        Self {
            cache: DashMap::with_capacity(options.initial_capacity),
            options,
            synthesizer: KernelSynthesizer,
        }
    }
}

impl<S: Synthesize> VariadicSpecializer<S> {
    pub fn with_synthesizer(options: SpecializerOptions, synthesizer: S) -> Result<Self, BucketError> {
        options.validate()?;
        Ok(Self {
            cache: DashMap::with_capacity(options.initial_capacity),
            options,
            synthesizer,
        })
    }

    pub fn options(&self) -> &SpecializerOptions {
        &self.options
    }

    /// Get the implementation for `arity`, building it on first request
    pub fn get_implementation(&self, arity: usize) -> Result<Arc<BucketImplementation>, BucketError> {
        if let Err(e) = self.options.check_arity(arity) {
            tracing::warn!(arity, error = %e, "rejected bucket arity");
            return Err(e);
        }

        if let Some(existing) = self.cache.get(&arity) {
            tracing::trace!(arity, "bucket implementation cache hit");
            return Ok(Arc::clone(existing.value()));
        }

        match self.cache.entry(arity) {
            // Another caller finished the build between the lookup and the entry lock
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let implementation = match self.synthesizer.synthesize(arity, &self.options) {
                    Ok(implementation) => Arc::new(implementation),
                    Err(e) => {
                        tracing::error!(arity, error = %e, "bucket implementation synthesis failed");
                        return Err(e);
                    }
                };
                if implementation.arity() != arity {
                    let e = BucketError::Generation {
                        arity,
                        reason: format!("synthesizer produced arity {}", implementation.arity()),
                    };
                    tracing::error!(
                        arity,
                        produced = implementation.arity(),
                        error = %e,
                        "bucket implementation has wrong arity"
                    );
                    return Err(e);
                }
                tracing::debug!(
                    arity,
                    name = implementation.name(),
                    unrolled = implementation.is_unrolled(),
                    "generated bucket implementation"
                );
                Ok(Arc::clone(entry.insert(implementation).value()))
            }
        }
    }

    /// Arities with a cached implementation, ascending
    pub fn cached_arities(&self) -> Vec<usize> {
        let mut arities: Vec<usize> = self.cache.iter().map(|entry| *entry.key()).collect();
        arities.sort_unstable();
        arities
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

lazy_static! {
    static ref SPECIALIZER: VariadicSpecializer = VariadicSpecializer::default();
}

/// Process-wide specializer with default options
pub fn specializer() -> &'static VariadicSpecializer {
    &SPECIALIZER
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` builds, counts every build
    struct CountingSynthesizer {
        builds: AtomicUsize,
        failures: usize,
    }

    impl CountingSynthesizer {
        fn new(failures: usize) -> Self {
            Self {
                builds: AtomicUsize::new(0),
                failures,
            }
        }
    }

    impl Synthesize for CountingSynthesizer {
        fn synthesize(
            &self,
            arity: usize,
            options: &SpecializerOptions,
        ) -> Result<BucketImplementation, BucketError> {
            let n = self.builds.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(BucketError::Generation {
                    arity,
                    reason: "out of code space".to_string(),
                });
            }
            BucketImplementation::synthesize(arity, options.unroll_limit)
        }
    }

    /// Always builds for a different arity than requested
    struct OffByOneSynthesizer;

    impl Synthesize for OffByOneSynthesizer {
        fn synthesize(
            &self,
            arity: usize,
            options: &SpecializerOptions,
        ) -> Result<BucketImplementation, BucketError> {
            BucketImplementation::synthesize(arity + 1, options.unroll_limit)
        }
    }

    #[test]
    fn test_wrong_arity_build_is_rejected() {
        let specializer =
            VariadicSpecializer::with_synthesizer(SpecializerOptions::default(), OffByOneSynthesizer)
                .unwrap();
        assert!(matches!(
            specializer.get_implementation(5),
            Err(BucketError::Generation { arity: 5, .. })
        ));
        assert!(specializer.is_empty());
    }

    #[test]
    fn test_rejects_small_and_large_arities() {
        let specializer: VariadicSpecializer = VariadicSpecializer::default();
        assert_eq!(
            specializer.get_implementation(1).unwrap_err(),
            BucketError::InvalidArgumentCount { arity: 1 }
        );
        assert_eq!(
            specializer.get_implementation(0).unwrap_err(),
            BucketError::InvalidArgumentCount { arity: 0 }
        );
        assert_eq!(
            specializer.get_implementation(255).unwrap_err(),
            BucketError::NotSupported {
                arity: 255,
                max: 254
            }
        );
        assert!(specializer.is_empty());
    }

    #[test]
    fn test_ceiling_is_inclusive() {
        let specializer: VariadicSpecializer = VariadicSpecializer::default();
        let implementation = specializer.get_implementation(MAX_ARITY).unwrap();
        assert_eq!(implementation.arity(), MAX_ARITY);
        assert!(!implementation.is_unrolled());
    }

    #[test]
    fn test_same_arity_same_handle() {
        let specializer: VariadicSpecializer = VariadicSpecializer::default();
        let first = specializer.get_implementation(3).unwrap();
        let second = specializer.get_implementation(3).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(specializer.cached_arities(), vec![3]);
    }

    #[test]
    fn test_distinct_arities_distinct_handles() {
        let specializer: VariadicSpecializer = VariadicSpecializer::default();
        let a = specializer.get_implementation(3).unwrap();
        let b = specializer.get_implementation(20).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(a.is_unrolled());
        assert!(!b.is_unrolled());
        assert_eq!(specializer.cached_arities(), vec![3, 20]);
        assert_eq!(specializer.len(), 2);
    }

    #[test]
    fn test_builds_once_per_arity() {
        let specializer =
            VariadicSpecializer::with_synthesizer(SpecializerOptions::default(), CountingSynthesizer::new(0))
                .unwrap();
        for _ in 0..5 {
            specializer.get_implementation(4).unwrap();
        }
        specializer.get_implementation(5).unwrap();
        assert_eq!(specializer.synthesizer.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_build_is_retryable() {
        let specializer =
            VariadicSpecializer::with_synthesizer(SpecializerOptions::default(), CountingSynthesizer::new(1))
                .unwrap();
        assert!(matches!(
            specializer.get_implementation(4),
            Err(BucketError::Generation { arity: 4, .. })
        ));
        assert!(specializer.is_empty());

        let implementation = specializer.get_implementation(4).unwrap();
        assert_eq!(implementation.invoke(&[2.0, 1.0, 2.0, 3.0]).unwrap(), 1);
        assert_eq!(specializer.cached_arities(), vec![4]);
    }

    #[test]
    fn test_failure_does_not_affect_other_arities() {
        let specializer =
            VariadicSpecializer::with_synthesizer(SpecializerOptions::default(), CountingSynthesizer::new(1))
                .unwrap();
        assert!(specializer.get_implementation(6).is_err());
        assert!(specializer.get_implementation(7).is_ok());
        assert_eq!(specializer.cached_arities(), vec![7]);
    }

    #[test]
    fn test_concurrent_first_requests() {
        let specializer =
            VariadicSpecializer::with_synthesizer(SpecializerOptions::default(), CountingSynthesizer::new(0))
                .unwrap();
        let handles: Vec<Arc<BucketImplementation>> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..16)
                .map(|_| s.spawn(|| specializer.get_implementation(9).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(specializer.synthesizer.builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lowered_max_arity() {
        let specializer =
            VariadicSpecializer::new(SpecializerOptions::default().with_max_arity(8)).unwrap();
        assert!(specializer.get_implementation(8).is_ok());
        assert_eq!(
            specializer.get_implementation(9).unwrap_err(),
            BucketError::NotSupported { arity: 9, max: 8 }
        );
    }

    #[test]
    fn test_unroll_limit_zero_scans() {
        let specializer =
            VariadicSpecializer::new(SpecializerOptions::default().with_unroll_limit(0)).unwrap();
        assert!(!specializer.get_implementation(3).unwrap().is_unrolled());
    }

    #[test]
    fn test_invalid_options() {
        assert!(matches!(
            VariadicSpecializer::new(SpecializerOptions::default().with_max_arity(255)),
            Err(BucketError::InvalidOptions { .. })
        ));
        assert!(matches!(
            VariadicSpecializer::new(SpecializerOptions::default().with_max_arity(1)),
            Err(BucketError::InvalidOptions { .. })
        ));
        assert!(matches!(
            VariadicSpecializer::new(SpecializerOptions::default().with_unroll_limit(17)),
            Err(BucketError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn test_options_from_json() {
        let options = SpecializerOptions::from_json(r#"{ "max_arity": 32 }"#).unwrap();
        assert_eq!(options.max_arity, 32);
        assert_eq!(options.unroll_limit, MAX_UNROLLED_ARITY);
        assert!(SpecializerOptions::from_json(r#"{ "max_arity": 1000 }"#).is_err());
        assert!(SpecializerOptions::from_json("not json").is_err());
    }

    #[test]
    fn test_global_specializer_is_shared() {
        let a = specializer().get_implementation(12).unwrap();
        let b = specializer().get_implementation(12).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
