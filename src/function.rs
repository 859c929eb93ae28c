//! Scalar function descriptors exposed to the query engine
//!
//! [`BucketFunction`] is the variadic `bucket(probe, b1, b2, ...)` form and
//! [`ArrayBucketFunction`] the packed `array_bucket(array, probe)` form.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{Element, ElementType, ExtractDouble};
use crate::error::BucketError;
use crate::sequence;
use crate::variadic::{BucketImplementation, Synthesize, VariadicSpecializer};

/// How an argument's null value is handled by a bound implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullConvention {
    /// The call yields null as soon as this argument is null
    ReturnNullOnNull,
    /// The implementation receives the null and decides itself
    UseNullFlag,
}

/// A bound variadic bucket call, ready to be wired into an evaluator
#[derive(Debug, Clone)]
pub struct ScalarFunctionImplementation {
    nullable: bool,
    argument_type: ElementType,
    argument_conventions: Vec<NullConvention>,
    handle: Arc<BucketImplementation>,
    deterministic: bool,
}

impl ScalarFunctionImplementation {
    /// Whether the routine itself can produce null for non-null arguments
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn argument_type(&self) -> ElementType {
        self.argument_type
    }

    pub fn argument_conventions(&self) -> &[NullConvention] {
        &self.argument_conventions
    }

    pub fn handle(&self) -> &Arc<BucketImplementation> {
        &self.handle
    }

    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    /// Evaluate the bound call over engine values
    ///
    /// Arguments are read through the function's argument type. An argument
    /// that reads as absent (null, or a string that is not a number) makes the
    /// result null.
    pub fn evaluate(&self, args: &[Element]) -> Result<Option<usize>, BucketError> {
        let values: Vec<Option<f64>> = args
            .iter()
            .map(|arg| self.argument_type.extract_double(arg))
            .collect();
        self.handle.invoke_nullable(&values)
    }
}

/// The variadic `bucket` scalar function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketFunction {
    argument_type: ElementType,
    description: &'static str,
}

pub const DOUBLE_BUCKET: BucketFunction = BucketFunction {
    argument_type: ElementType::Double,
    description: "find bucket given double",
};

pub const VARCHAR_BUCKET: BucketFunction = BucketFunction {
    argument_type: ElementType::Varchar,
    description: "find bucket given strings",
};

impl BucketFunction {
    pub const NAME: &'static str = "bucket";

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn argument_type(&self) -> ElementType {
        self.argument_type
    }

    pub fn return_type(&self) -> ElementType {
        ElementType::BigInt
    }

    /// The function accepts any number of arguments of its argument type
    pub fn is_variable_arity(&self) -> bool {
        true
    }

    pub fn is_hidden(&self) -> bool {
        false
    }

    pub fn is_deterministic(&self) -> bool {
        true
    }

    /// Display form of the signature, e.g. `bucket(double...):bigint`
    pub fn signature(&self) -> String {
        format!(
            "{}({}...):{}",
            Self::NAME,
            self.argument_type,
            self.return_type()
        )
    }

    /// Bind a call site with `arity` arguments
    pub fn specialize<S: Synthesize>(
        &self,
        arity: usize,
        specializer: &VariadicSpecializer<S>,
    ) -> Result<ScalarFunctionImplementation, BucketError> {
        let handle = specializer.get_implementation(arity)?;
        Ok(ScalarFunctionImplementation {
            nullable: false,
            argument_type: self.argument_type,
            argument_conventions: vec![NullConvention::ReturnNullOnNull; arity],
            handle,
            deterministic: self.is_deterministic(),
        })
    }
}

/// The packed `array_bucket(array(E), double)` scalar function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayBucketFunction;

impl ArrayBucketFunction {
    pub const NAME: &'static str = "array_bucket";
    pub const DESCRIPTION: &'static str = "Find the bucket to which the argument belongs.";

    pub fn return_type(&self) -> ElementType {
        ElementType::Integer
    }

    /// The array argument is null-on-null; the probe is passed through as a
    /// nullable value
    pub fn argument_conventions(&self) -> [NullConvention; 2] {
        [NullConvention::ReturnNullOnNull, NullConvention::UseNullFlag]
    }

    /// Evaluate against boundaries of `element_type`
    pub fn evaluate(
        &self,
        element_type: ElementType,
        boundaries: &[Element],
        probe: Option<f64>,
    ) -> Option<usize> {
        sequence::assign(&element_type, boundaries, probe)
    }
}

/// Bucket index in the legacy double encoding
pub fn as_legacy_double(bucket: usize) -> f64 {
    bucket as f64
}
