//! Spline bases for isogeometric analysis: knot vectors, Bernstein extraction,
//! B-spline and NURBS spaces, element evaluation, geometry maps and refinement.

pub mod bernstein;
pub mod boundary;
pub mod bspline_space;
pub mod cache;
pub mod config;
pub mod dofs;
pub mod evaluator;
pub mod extraction;
pub mod ig_function;
pub mod knot;
pub mod mapping;
pub mod nurbs;
pub mod patch;
pub mod physical_space;
pub mod refine;
pub mod spline_space;

pub use boundary::{project_boundary_values, Face, Side};
pub use bspline_space::BSplineSpace;
pub use cache::{ElementBasisCache, ValueTable};
pub use config::SpaceConfig;
pub use dofs::{DofDistribution, DofProperty};
pub use evaluator::{ElementEvaluator, ReferenceBasis, MAX_DERIVATIVE_ORDER};
pub use extraction::{BernsteinExtraction, BernsteinOperator};
pub use ig_function::{IgFunction, IgFunctionValues};
pub use mapping::{GeometryMap, LinearMap, MappedPoints, SplineMap};
pub use nurbs::NurbsSpace;
pub use patch::{Patch, Subscriber, SubscriberId};
pub use physical_space::PhysicalSpace;
pub use spline_space::{EndBehaviour, InteriorReg, SplineSpace};
