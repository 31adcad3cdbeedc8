//! Math primitives for tensor-product discretizations.

pub mod bbox;
pub mod quadrature;
pub mod tensor;

pub use bbox::BBox;
pub use quadrature::{gauss_legendre, QuadratureId, TensorProductQuadrature};
pub use tensor::{
    compute_weight, DynamicMultiArray, TensorIndex, TensorIndices, TensorSize, TensorSizedContainer,
};
