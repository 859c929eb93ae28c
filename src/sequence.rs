//! Bucket assignment against a caller-supplied boundary sequence
//!
//! Boundaries are scanned in the order given. The first boundary the probe is
//! less than or equal to decides the bucket; absent boundaries are skipped. When
//! nothing matches the probe lands in the overflow bucket, whose index is the
//! declared length of the sequence.
//!
//! ```rust
//! use bucketfn::sequence::assign_values;
//!
//! let boundaries = [Some(5.0), Some(10.0), Some(15.0)];
//! assert_eq!(assign_values(&boundaries, Some(7.0)), Some(1));
//! assert_eq!(assign_values(&boundaries, Some(20.0)), Some(3));
//! assert_eq!(assign_values(&boundaries, None), None);
//! ```

use rayon::prelude::*;

use crate::data::{ExtractDouble, NativeDouble};

/// Assign `probe` to a bucket of `boundaries`
///
/// Returns `None` only when the probe itself is absent.
pub fn assign<E, C>(comparator: &C, boundaries: &[E], probe: Option<f64>) -> Option<usize>
where
    C: ExtractDouble<E> + ?Sized,
{
    let value = probe?;
    let bucket = boundaries
        .iter()
        .position(|boundary| {
            comparator
                .extract_double(boundary)
                .is_some_and(|limit| value <= limit)
        })
        .unwrap_or(boundaries.len());
    Some(bucket)
}

/// [`assign`] for a packed sequence of nullable doubles
pub fn assign_values(boundaries: &[Option<f64>], probe: Option<f64>) -> Option<usize> {
    assign(&NativeDouble, boundaries, probe)
}

/// Assign a column of probes against one boundary sequence
///
/// The output is aligned with `probes`.
pub fn assign_batch<E, C>(
    comparator: &C,
    boundaries: &[E],
    probes: &[Option<f64>],
) -> Vec<Option<usize>>
where
    E: Sync,
    C: ExtractDouble<E> + Sync + ?Sized,
{
    probes
        .par_iter()
        .map(|probe| assign(comparator, boundaries, *probe))
        .collect()
}
