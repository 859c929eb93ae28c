//! Bucket-assignment functions for query engines.
//!
//! A probe value is assigned to the first boundary it is less than or equal to.
//! Boundaries arrive either as one packed sequence ([`sequence::assign`]) or as
//! separate scalar arguments, in which case a [`VariadicSpecializer`] builds and
//! caches one specialized routine per argument count.

pub mod data;
pub mod error;
pub mod function;
pub mod sequence;
pub mod variadic;

pub use crate::data::{Element, ElementType, ExtractDouble, NativeDouble};
pub use crate::function::{
    as_legacy_double, ArrayBucketFunction, BucketFunction, NullConvention,
    ScalarFunctionImplementation, DOUBLE_BUCKET, VARCHAR_BUCKET,
};
pub use crate::sequence::{assign, assign_batch, assign_values};
pub use crate::variadic::{
    specializer, BucketImplementation, KernelSynthesizer, SpecializerOptions, Synthesize,
    VariadicSpecializer, MAX_ARITY,
};
pub use error::BucketError;

pub mod prelude {
    pub use crate::data::{Element, ElementType, ExtractDouble, NativeDouble};
    pub use crate::error::BucketError;
    pub use crate::function::{ArrayBucketFunction, BucketFunction, DOUBLE_BUCKET, VARCHAR_BUCKET};
    pub use crate::sequence::{assign, assign_batch, assign_values};
    pub use crate::variadic::{specializer, SpecializerOptions, VariadicSpecializer};
}
