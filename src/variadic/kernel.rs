//! Specialized bucket kernels for a fixed argument count
//!
//! A kernel receives the probe and the boundaries of one call and returns the
//! bucket index. Small arities get a monomorphized kernel whose boundary count
//! is a compile-time constant, larger arities get a closure that captures the
//! count. Both compute the same first-match scan.

use std::fmt;

use crate::error::BucketError;

/// Largest arity served by a precompiled const-generic kernel
pub const MAX_UNROLLED_ARITY: usize = 16;

type UnrolledKernel = fn(f64, &[f64]) -> usize;
type ScanKernel = Box<dyn Fn(f64, &[f64]) -> usize + Send + Sync>;

#[inline]
fn first_match(probe: f64, boundaries: &[f64]) -> usize {
    boundaries
        .iter()
        .position(|&limit| probe <= limit)
        .unwrap_or(boundaries.len())
}

#[inline]
fn unrolled<const B: usize>(probe: f64, boundaries: &[f64]) -> usize {
    match <&[f64; B]>::try_from(boundaries) {
        Ok(fixed) => {
            for (i, &limit) in fixed.iter().enumerate() {
                if probe <= limit {
                    return i;
                }
            }
            B
        }
        Err(_) => first_match(probe, boundaries),
    }
}

macro_rules! unrolled_kernels {
    ($($b:literal),* $(,)?) => {
        [$(unrolled::<$b> as UnrolledKernel),*]
    };
}

/// Indexed by boundary count minus one
const UNROLLED: [UnrolledKernel; MAX_UNROLLED_ARITY - 1] =
    unrolled_kernels!(1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15);

enum Kernel {
    Unrolled(UnrolledKernel),
    Scan(ScanKernel),
}

impl Kernel {
    #[inline]
    fn call(&self, probe: f64, boundaries: &[f64]) -> usize {
        match self {
            Kernel::Unrolled(f) => f(probe, boundaries),
            Kernel::Scan(f) => f(probe, boundaries),
        }
    }
}

/// Callable bucket routine specialized to one arity
///
/// Argument 0 is the probe, arguments `1..arity` are the boundaries in call
/// order. The overflow bucket is `arity - 1`.
pub struct BucketImplementation {
    arity: usize,
    name: String,
    kernel: Kernel,
}

impl BucketImplementation {
    /// Build the kernel for `arity`, unrolling when `arity <= unroll_limit`
    pub fn synthesize(arity: usize, unroll_limit: usize) -> Result<Self, BucketError> {
        if arity < 2 {
            return Err(BucketError::InvalidArgumentCount { arity });
        }
        let boundaries = arity - 1;
        let kernel = if arity <= unroll_limit {
            let f = UNROLLED
                .get(boundaries - 1)
                .copied()
                .ok_or_else(|| BucketError::Generation {
                    arity,
                    reason: format!(
                        "no unrolled kernel above arity {}",
                        MAX_UNROLLED_ARITY
                    ),
                })?;
            Kernel::Unrolled(f)
        } else {
            Kernel::Scan(Box::new(move |probe, args| {
                first_match(probe, &args[..boundaries.min(args.len())])
            }))
        };

        Ok(Self {
            arity,
            name: format!("bucket{}", arity),
            kernel,
        })
    }

    /// Wrap an externally produced routine
    ///
    /// `f` receives the probe and exactly `arity - 1` boundaries. An index
    /// above `arity - 1` is rejected by [`invoke`](Self::invoke).
    pub fn from_fn<F>(arity: usize, name: impl Into<String>, f: F) -> Result<Self, BucketError>
    where
        F: Fn(f64, &[f64]) -> usize + Send + Sync + 'static,
    {
        if arity < 2 {
            return Err(BucketError::InvalidArgumentCount { arity });
        }
        Ok(Self {
            arity,
            name: name.into(),
            kernel: Kernel::Scan(Box::new(f)),
        })
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Generated routine name, e.g. `bucket3`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the boundary count is a compile-time constant of the kernel
    pub fn is_unrolled(&self) -> bool {
        matches!(self.kernel, Kernel::Unrolled(_))
    }

    /// Run the routine over exactly `arity` arguments
    #[inline]
    pub fn invoke(&self, args: &[f64]) -> Result<usize, BucketError> {
        if args.len() != self.arity {
            return Err(self.mismatch(args.len()));
        }
        let Some((&probe, boundaries)) = args.split_first() else {
            return Err(self.mismatch(0));
        };
        let bucket = self.kernel.call(probe, boundaries);
        if bucket > boundaries.len() {
            return Err(BucketError::BucketOutOfRange {
                name: self.name.clone(),
                bucket,
                max: boundaries.len(),
            });
        }
        Ok(bucket)
    }

    /// Run the routine with null-on-null semantics: any absent argument
    /// makes the result absent
    pub fn invoke_nullable(&self, args: &[Option<f64>]) -> Result<Option<usize>, BucketError> {
        if args.len() != self.arity {
            return Err(self.mismatch(args.len()));
        }
        let Some(values) = args.iter().copied().collect::<Option<Vec<f64>>>() else {
            return Ok(None);
        };
        self.invoke(&values).map(Some)
    }

    fn mismatch(&self, actual: usize) -> BucketError {
        BucketError::ArityMismatch {
            expected: self.arity,
            actual,
        }
    }
}

impl fmt::Debug for BucketImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketImplementation")
            .field("arity", &self.arity)
            .field("name", &self.name)
            .field("unrolled", &self.is_unrolled())
            .finish()
    }
}
