//! Gauss-Legendre and tensor-product quadrature rules on the reference cell `[0,1]^DIM`.

use iga_core::{EntityId, IgaError, Result};

use crate::tensor::{TensorIndex, TensorSize, TensorSizedContainer};

/// Identifies a quadrature rule in per-element caches.
pub type QuadratureId = EntityId;

const MAX_NEWTON_ITERATIONS: usize = 100;

/// Legendre polynomial `P_n(z)` and its derivative.
fn legendre_p_and_dp(n: usize, z: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = z;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let kf = k as f64;
        let p2 = ((2.0 * kf - 1.0) * z * p1 - (kf - 1.0) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (z * p1 - p0) / (z * z - 1.0);
    (p1, dp)
}

/// `n`-point Gauss-Legendre nodes and weights on `[0,1]`, nodes ascending.
///
/// Exact for polynomials of degree `2n - 1`.
pub fn gauss_legendre(n: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if n == 0 {
        return Err(IgaError::Configuration(
            "Gauss-Legendre rule needs at least one point".into(),
        ));
    }

    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let m = (n + 1) / 2;

    for i in 0..m {
        // Chebyshev initial guess, then Newton on P_n
        let mut z = ((i as f64 + 0.75) / (n as f64 + 0.5) * std::f64::consts::PI).cos();
        let mut dp = 1.0;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let (p, d) = legendre_p_and_dp(n, z);
            dp = d;
            let z_new = z - p / d;
            let converged = (z_new - z).abs() < 1e-15;
            z = z_new;
            if converged {
                break;
            }
        }
        if n % 2 == 1 && i == m - 1 {
            z = 0.0;
            dp = legendre_p_and_dp(n, z).1;
        }
        let w = 2.0 / ((1.0 - z * z) * dp * dp);

        // z runs from +1 downwards; map [-1,1] -> [0,1] keeping nodes ascending
        nodes[i] = 0.5 * (1.0 - z);
        nodes[n - 1 - i] = 0.5 * (1.0 + z);
        weights[i] = 0.5 * w;
        weights[n - 1 - i] = 0.5 * w;
    }

    Ok((nodes, weights))
}

/// Tensor product of one-dimensional rules on `[0,1]`.
///
/// Points are numbered row-major (last direction fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct TensorProductQuadrature<const DIM: usize> {
    id: QuadratureId,
    points: [Vec<f64>; DIM],
    weights: [Vec<f64>; DIM],
    layout: TensorSizedContainer<DIM>,
}

impl<const DIM: usize> TensorProductQuadrature<DIM> {
    /// Build a rule from explicit per-direction points and weights.
    pub fn new(points: [Vec<f64>; DIM], weights: [Vec<f64>; DIM]) -> Result<Self> {
        for d in 0..DIM {
            if points[d].is_empty() {
                return Err(IgaError::Configuration(format!(
                    "quadrature direction {} has no points",
                    d
                )));
            }
            if points[d].len() != weights[d].len() {
                return Err(IgaError::mismatch(
                    format!("quadrature weights in direction {}", d),
                    points[d].len(),
                    weights[d].len(),
                ));
            }
            if let Some(&x) = points[d].iter().find(|&&x| !(0.0..=1.0).contains(&x)) {
                return Err(IgaError::Configuration(format!(
                    "quadrature point {} in direction {} is outside [0, 1]",
                    x, d
                )));
            }
        }
        let layout = TensorSizedContainer::<DIM>::new(TensorSize(std::array::from_fn(|d| points[d].len())));
        Ok(Self {
            id: QuadratureId::new(),
            points,
            weights,
            layout,
        })
    }

    /// Evaluation-only rule: every point gets unit weight.
    pub fn from_points(points: [Vec<f64>; DIM]) -> Result<Self> {
        let weights = std::array::from_fn(|d| vec![1.0; points[d].len()]);
        Self::new(points, weights)
    }

    /// Gauss-Legendre rule with `n[d]` points in direction `d`.
    pub fn gauss(n: [usize; DIM]) -> Result<Self> {
        let mut points: [Vec<f64>; DIM] = std::array::from_fn(|_| Vec::new());
        let mut weights: [Vec<f64>; DIM] = std::array::from_fn(|_| Vec::new());
        for d in 0..DIM {
            let (x, w) = gauss_legendre(n[d])?;
            points[d] = x;
            weights[d] = w;
        }
        Self::new(points, weights)
    }

    /// Gauss-Legendre rule with the same number of points in every direction.
    pub fn gauss_uniform(n: usize) -> Result<Self> {
        Self::gauss([n; DIM])
    }

    pub fn id(&self) -> QuadratureId {
        self.id
    }

    pub fn num_points(&self) -> usize {
        self.layout.flat_size()
    }

    pub fn num_points_direction(&self) -> TensorSize<DIM> {
        self.layout.tensor_size()
    }

    pub fn layout(&self) -> &TensorSizedContainer<DIM> {
        &self.layout
    }

    pub fn points_direction(&self, dir: usize) -> &[f64] {
        &self.points[dir]
    }

    pub fn weights_direction(&self, dir: usize) -> &[f64] {
        &self.weights[dir]
    }

    /// Reference coordinates of the point with flat index `flat`.
    pub fn point(&self, flat: usize) -> Result<[f64; DIM]> {
        let idx = self.layout.flat_to_tensor(flat)?;
        Ok(self.point_at(&idx))
    }

    pub fn point_at(&self, idx: &TensorIndex<DIM>) -> [f64; DIM] {
        std::array::from_fn(|d| self.points[d][idx[d]])
    }

    /// Product weight of the point with flat index `flat`.
    pub fn weight(&self, flat: usize) -> Result<f64> {
        let idx = self.layout.flat_to_tensor(flat)?;
        Ok((0..DIM).map(|d| self.weights[d][idx[d]]).product())
    }

    /// Product weights of all points, in flat order.
    pub fn flat_weights(&self) -> Vec<f64> {
        self.layout
            .indices()
            .map(|idx| (0..DIM).map(|d| self.weights[d][idx[d]]).product())
            .collect()
    }
}
