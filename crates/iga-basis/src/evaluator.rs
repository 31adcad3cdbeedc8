//! Element traversal over a reference basis with per-element caching.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use iga_core::{IgaError, Result};
use iga_grid::{ElementHandle, Grid};
use iga_math::{QuadratureId, TensorIndex, TensorProductQuadrature, TensorSize, TensorSizedContainer};
use log::trace;
use nalgebra::DMatrix;

use crate::boundary::Face;
use crate::cache::ElementBasisCache;
use crate::dofs::DofProperty;

/// Highest derivative order the evaluators compute.
pub const MAX_DERIVATIVE_ORDER: usize = 2;

/// Fail with `IndexOutOfRange` for derivative orders above [`MAX_DERIVATIVE_ORDER`].
pub fn check_derivative_order(order: usize) -> Result<()> {
    if order > MAX_DERIVATIVE_ORDER {
        return Err(IgaError::out_of_range(
            "derivative order",
            order,
            MAX_DERIVATIVE_ORDER + 1,
        ));
    }
    Ok(())
}

/// The capabilities element-wise assembly needs from a basis.
pub trait ReferenceBasis<const DIM: usize> {
    fn grid(&self) -> &Arc<Grid<DIM>>;

    /// Number of global basis functions.
    fn num_basis(&self) -> usize;

    /// Number of basis functions active on each element.
    fn num_element_basis(&self) -> usize;

    fn tensor_index(&self, element: usize) -> Result<TensorIndex<DIM>> {
        self.grid().flat_to_tensor(element)
    }

    /// Global indices of the element's functions, in local order.
    fn local_to_global(&self, element: &ElementHandle<DIM>, property: DofProperty) -> Result<Vec<usize>>;

    /// Global indices of the functions that do not vanish on `face`, ascending.
    fn face_dofs(&self, face: Face) -> Result<Vec<usize>> {
        Err(IgaError::NotImplemented(format!("face dofs of face {}", face.index())))
    }

    /// Values and derivatives up to `max_order` at the points of `quadrature`.
    fn fill_cache(
        &self,
        element: &ElementHandle<DIM>,
        quadrature: &TensorProductQuadrature<DIM>,
        max_order: usize,
    ) -> Result<ElementBasisCache<DIM>>;
}

/// Cursor over the elements of a basis.
///
/// Caches are keyed by `(derivative order, quadrature id)` and dropped when
/// the cursor moves to another element. The evaluator borrows the basis, so
/// the basis cannot be refined while a traversal is alive.
pub struct ElementEvaluator<'b, const DIM: usize, B: ReferenceBasis<DIM> + ?Sized> {
    basis: &'b B,
    current: Option<ElementHandle<DIM>>,
    caches: HashMap<(usize, QuadratureId), ElementBasisCache<DIM>>,
}

impl<'b, const DIM: usize, B: ReferenceBasis<DIM> + ?Sized> ElementEvaluator<'b, DIM, B> {
    pub fn new(basis: &'b B) -> Self {
        Self {
            basis,
            current: None,
            caches: HashMap::new(),
        }
    }

    pub fn basis(&self) -> &'b B {
        self.basis
    }

    pub fn current_element(&self) -> Option<ElementHandle<DIM>> {
        self.current
    }

    /// Basis tables of element `element` up to `deriv_order`.
    pub fn evaluate(
        &mut self,
        element: usize,
        deriv_order: usize,
        quadrature: &TensorProductQuadrature<DIM>,
    ) -> Result<&ElementBasisCache<DIM>> {
        check_derivative_order(deriv_order)?;
        let handle = ElementHandle {
            flat: element,
            tensor: self.basis.tensor_index(element)?,
        };
        if self.current != Some(handle) {
            self.caches.clear();
            self.current = Some(handle);
        }
        match self.caches.entry((deriv_order, quadrature.id())) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                trace!(
                    "filling element {} cache (order {}, quadrature {})",
                    element,
                    deriv_order,
                    quadrature.id()
                );
                let cache = self.basis.fill_cache(&handle, quadrature, deriv_order)?;
                Ok(entry.insert(cache))
            }
        }
    }

    /// Global indices of the current element's functions.
    pub fn local_to_global(&self, property: DofProperty) -> Result<Vec<usize>> {
        let handle = self
            .current
            .ok_or_else(|| IgaError::Configuration("no element has been evaluated yet".into()))?;
        self.basis.local_to_global(&handle, property)
    }

    /// Forget the current element and its caches.
    pub fn reset(&mut self) {
        self.current = None;
        self.caches.clear();
    }
}

/// Write tensor-product values and derivatives of one component into `cache`.
///
/// `tables[d][r]` holds the `r`-th physical derivatives of the local 1-D
/// functions of direction `d` (rows) at the 1-D quadrature points (columns).
/// The component's local functions start at row `offset` of the cache.
pub(crate) fn fill_tensor_product<const DIM: usize>(
    cache: &mut ElementBasisCache<DIM>,
    offset: usize,
    tables: &[Vec<DMatrix<f64>>; DIM],
    points: &TensorSizedContainer<DIM>,
) {
    let local = TensorSizedContainer::<DIM>::new(TensorSize(std::array::from_fn(|d| tables[d][0].nrows())));
    let (values, mut gradients, mut hessians) = cache.tables_mut();
    let entry = |k: &[usize; DIM], q: &[usize; DIM], orders: [usize; DIM]| -> f64 {
        (0..DIM).map(|d| tables[d][orders[d]][(k[d], q[d])]).product()
    };
    for (kf, k) in local.indices().enumerate() {
        let row = offset + kf;
        for (qf, q) in points.indices().enumerate() {
            values[(row, qf)] = entry(&k, &q, [0; DIM]);
            if let Some(grads) = gradients.as_deref_mut() {
                grads[(row, qf)] = std::array::from_fn(|a| {
                    let mut orders = [0; DIM];
                    orders[a] = 1;
                    entry(&k, &q, orders)
                });
            }
            if let Some(hess) = hessians.as_deref_mut() {
                hess[(row, qf)] = std::array::from_fn(|a| {
                    std::array::from_fn(|b| {
                        let mut orders = [0; DIM];
                        orders[a] += 1;
                        orders[b] += 1;
                        entry(&k, &q, orders)
                    })
                });
            }
        }
    }
}
