use derive_more::Display;
use zarrs_manifest_metadata::v2::ArrayMetadataV2DataType;

/// An operation that computes on array elements.
///
/// Virtual arrays only reference chunk data, so every [`ElementwiseOperation`] is rejected with an [`UnsupportedOperationError`](crate::UnsupportedOperationError).
#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum ElementwiseOperation {
    /// Elementwise addition.
    #[display("addition")]
    Add,
    /// Elementwise subtraction.
    #[display("subtraction")]
    Subtract,
    /// Elementwise multiplication.
    #[display("multiplication")]
    Multiply,
    /// Elementwise division.
    #[display("division")]
    Divide,
    /// Elementwise negation.
    #[display("negation")]
    Negate,
    /// An elementwise comparison.
    #[display("comparison")]
    Compare,
    /// A reduction along one or more axes.
    #[display("reduction")]
    Reduce,
    /// A cast to another data type.
    #[display("cast to {_0}")]
    Cast(ArrayMetadataV2DataType),
}
