//! Knot-vector model of a (possibly vector-valued) tensor-product spline space.
//!
//! A [`SplineSpace`] combines a [`Grid`] with, per component and direction,
//! a degree, interior knot multiplicities and an end behaviour. From these it
//! derives the knots with repetition and the number of basis functions.
//!
//! For every end behaviour the knot vector of a direction with `n + 1` grid
//! knots, degree `p` and interior multiplicities `m_1..m_{n-1}` has the form
//!
//! ```text
//! [ l_0 .. l_{p-1}, x_0, x_1 (m_1 times), .., x_{n-1} (m_{n-1} times), x_n, r_1 .. r_p ]
//! ```
//!
//! so element `e` always lives on span `p + m_1 + .. + m_e`.

use std::sync::Arc;

use iga_core::traits::Validate;
use iga_core::{check_range, IgaError, Result, Tolerance};
use iga_grid::{Grid, RefinementEvent};
use iga_math::TensorSize;
use log::debug;
use serde::{Deserialize, Serialize};

/// Per component, per direction polynomial degree.
pub type DegreeTable<const DIM: usize> = Vec<[usize; DIM]>;
/// Per component, per direction multiplicity of every interior grid knot.
pub type MultiplicityTable<const DIM: usize> = Vec<[Vec<usize>; DIM]>;
/// Per component, per direction end behaviour.
pub type EndBehaviourTable<const DIM: usize> = Vec<[EndBehaviour; DIM]>;
/// Per component, per direction knots with repetition.
pub type KnotsTable<const DIM: usize> = Vec<[Vec<f64>; DIM]>;

/// How the knot vector is closed at the two ends of a direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndBehaviour {
    /// End knots repeated `p + 1` times (clamped).
    Interpolatory,
    /// Explicit `p + 1` knots per side. The innermost knot of each side is
    /// the domain end, the others lie outside the domain.
    EndKnots { left: Vec<f64>, right: Vec<f64> },
    /// Wrap around, identifying the last `p` functions with the first `p`.
    Periodic,
}

impl EndBehaviour {
    pub fn is_periodic(&self) -> bool {
        matches!(self, Self::Periodic)
    }

    pub fn is_interpolatory(&self) -> bool {
        matches!(self, Self::Interpolatory)
    }
}

/// Interior regularity presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteriorReg {
    /// Multiplicity 1: `C^{p-1}` across interior knots.
    Maximum,
    /// Multiplicity `p`: `C^0` across interior knots.
    Minimum,
}

impl InteriorReg {
    pub fn multiplicity(self, degree: usize) -> usize {
        match self {
            Self::Maximum => 1,
            Self::Minimum => degree.max(1),
        }
    }
}

/// Tensor-product spline space description over a shared grid.
#[derive(Debug, Clone)]
pub struct SplineSpace<const DIM: usize> {
    grid: Arc<Grid<DIM>>,
    degree: DegreeTable<DIM>,
    interior_mult: MultiplicityTable<DIM>,
    end_behaviour: EndBehaviourTable<DIM>,
    num_basis: Vec<TensorSize<DIM>>,
}

impl<const DIM: usize> SplineSpace<DIM> {
    /// Build a space from explicit tables; all tables need one entry per component.
    pub fn new(
        grid: Arc<Grid<DIM>>,
        degree: DegreeTable<DIM>,
        interior_mult: MultiplicityTable<DIM>,
        end_behaviour: EndBehaviourTable<DIM>,
    ) -> Result<Self> {
        check_tables(&grid, &degree, &interior_mult, &end_behaviour)?;
        let num_basis = (0..degree.len())
            .map(|c| {
                TensorSize(std::array::from_fn(|d| {
                    count_basis(degree[c][d], &interior_mult[c][d], &end_behaviour[c][d])
                }))
            })
            .collect::<Vec<_>>();
        let space = Self {
            grid,
            degree,
            interior_mult,
            end_behaviour,
            num_basis,
        };
        debug!(
            "spline space on grid {} (rev {}): {} component(s), {} basis functions",
            space.grid.id(),
            space.grid.revision(),
            space.n_components(),
            space.num_basis()
        );
        Ok(space)
    }

    /// Interpolatory ends and the same regularity at every interior knot.
    pub fn with_regularity(grid: Arc<Grid<DIM>>, degree: DegreeTable<DIM>, reg: InteriorReg) -> Result<Self> {
        let interior_mult = Self::multiplicity_table(&grid, &degree, reg);
        let end_behaviour = vec![std::array::from_fn(|_| EndBehaviour::Interpolatory); degree.len()];
        Self::new(grid, degree, interior_mult, end_behaviour)
    }

    /// Scalar space with maximum regularity and interpolatory ends.
    pub fn scalar(grid: Arc<Grid<DIM>>, degree: [usize; DIM]) -> Result<Self> {
        Self::with_regularity(grid, vec![degree], InteriorReg::Maximum)
    }

    /// Multiplicities realizing `reg` on every interior knot of `grid`.
    pub fn multiplicity_table(grid: &Grid<DIM>, degree: &DegreeTable<DIM>, reg: InteriorReg) -> MultiplicityTable<DIM> {
        let n_knots = grid.num_knots_dim();
        degree
            .iter()
            .map(|deg| std::array::from_fn(|d| vec![reg.multiplicity(deg[d]); n_knots[d] - 2]))
            .collect()
    }

    pub fn grid(&self) -> &Arc<Grid<DIM>> {
        &self.grid
    }

    pub fn degree(&self) -> &DegreeTable<DIM> {
        &self.degree
    }

    pub fn interior_mult(&self) -> &MultiplicityTable<DIM> {
        &self.interior_mult
    }

    pub fn end_behaviour(&self) -> &EndBehaviourTable<DIM> {
        &self.end_behaviour
    }

    pub fn n_components(&self) -> usize {
        self.degree.len()
    }

    pub fn component_degree(&self, comp: usize) -> Result<[usize; DIM]> {
        self.degree
            .get(comp)
            .copied()
            .ok_or_else(|| IgaError::out_of_range("component", comp, self.n_components()))
    }

    /// Number of basis functions per direction, per component.
    pub fn num_basis_table(&self) -> &[TensorSize<DIM>] {
        &self.num_basis
    }

    pub fn num_basis_component(&self, comp: usize) -> Result<usize> {
        self.num_basis
            .get(comp)
            .map(TensorSize::flat_size)
            .ok_or_else(|| IgaError::out_of_range("component", comp, self.n_components()))
    }

    /// Total number of basis functions over all components.
    pub fn num_basis(&self) -> usize {
        self.num_basis.iter().map(TensorSize::flat_size).sum()
    }

    /// Number of basis functions of component `comp` active on one element.
    pub fn num_element_basis_component(&self, comp: usize) -> Result<usize> {
        Ok(self.component_degree(comp)?.iter().map(|p| p + 1).product())
    }

    /// Number of basis functions active on one element, over all components.
    pub fn num_element_basis(&self) -> usize {
        self.degree
            .iter()
            .map(|deg| deg.iter().map(|p| p + 1).product::<usize>())
            .sum()
    }

    pub fn is_periodic(&self, comp: usize, dir: usize) -> bool {
        self.end_behaviour[comp][dir].is_periodic()
    }

    /// `acc[i] = m_1 + .. + m_i` for every grid knot `i`, with `acc[0] = 0`
    /// and the last knot adding nothing.
    ///
    /// The local functions of element `e` start at index `acc[e]`.
    pub fn accumulated_multiplicities(&self, comp: usize, dir: usize) -> Vec<usize> {
        accumulate(&self.interior_mult[comp][dir])
    }

    /// Knots with repetition for this space's own end behaviours.
    pub fn knots_with_repetition(&self) -> KnotsTable<DIM> {
        build_knots(&self.grid, &self.degree, &self.interior_mult, &self.end_behaviour)
    }

    /// Greville abscissae of component `comp` in direction `dir`: the mean of
    /// the `p` interior knots of each function's support, or the interval
    /// midpoint for degree 0.
    pub fn greville_abscissae(&self, comp: usize, dir: usize) -> Result<Vec<f64>> {
        check_range("direction", dir, DIM)?;
        let p = self.component_degree(comp)?[dir];
        if self.is_periodic(comp, dir) {
            return Err(IgaError::Configuration(format!(
                "Greville abscissae of periodic direction {} of component {}",
                dir, comp
            )));
        }
        let knots = &self.knots_with_repetition()[comp][dir];
        let n = knots.len() - p - 1;
        Ok((0..n)
            .map(|i| {
                if p == 0 {
                    0.5 * (knots[i] + knots[i + 1])
                } else {
                    knots[i + 1..=i + p].iter().sum::<f64>() / p as f64
                }
            })
            .collect())
    }

    /// Knots with repetition for the given end behaviours.
    pub fn compute_knots_with_repetition(&self, ends: &EndBehaviourTable<DIM>) -> Result<KnotsTable<DIM>> {
        check_tables(&self.grid, &self.degree, &self.interior_mult, ends)?;
        Ok(build_knots(&self.grid, &self.degree, &self.interior_mult, ends))
    }

    /// The same space over the refined grid.
    ///
    /// Existing interior knots keep their multiplicity, inserted knots get
    /// multiplicity 1.
    pub fn refined(&self, grid: &Arc<Grid<DIM>>, event: &RefinementEvent<DIM>) -> Result<Self> {
        if !event.previous().same_as(&self.grid) {
            return Err(IgaError::GridMismatch(format!(
                "refinement of grid {} (rev {}) delivered to a space on grid {} (rev {})",
                event.previous().id(),
                event.previous().revision(),
                self.grid.id(),
                self.grid.revision()
            )));
        }
        let old_knots = self.grid.knots();
        let new_knots = grid.knots();
        let interior_mult = self
            .interior_mult
            .iter()
            .map(|mults| {
                std::array::from_fn(|d| {
                    let old = &old_knots[d];
                    let new = &new_knots[d];
                    new[1..new.len() - 1]
                        .iter()
                        .map(|x| match old.binary_search_by(|k| k.total_cmp(x)) {
                            // old interior knot i sits at position i in `old`
                            Ok(i) if i > 0 && i < old.len() - 1 => mults[d][i - 1],
                            _ => 1,
                        })
                        .collect()
                })
            })
            .collect();
        Self::new(
            Arc::clone(grid),
            self.degree.clone(),
            interior_mult,
            self.end_behaviour.clone(),
        )
    }
}

impl<const DIM: usize> Validate for SplineSpace<DIM> {
    fn validate(&self) -> Result<()> {
        check_tables(&self.grid, &self.degree, &self.interior_mult, &self.end_behaviour)
    }
}

fn accumulate(mults: &[usize]) -> Vec<usize> {
    let mut acc = Vec::with_capacity(mults.len() + 2);
    let mut sum = 0;
    acc.push(0);
    for &m in mults {
        sum += m;
        acc.push(sum);
    }
    acc.push(sum);
    acc
}

fn count_basis(p: usize, mults: &[usize], end: &EndBehaviour) -> usize {
    let sum: usize = mults.iter().sum();
    if end.is_periodic() {
        sum + 1
    } else {
        sum + p + 1
    }
}

fn check_tables<const DIM: usize>(
    grid: &Grid<DIM>,
    degree: &DegreeTable<DIM>,
    interior_mult: &MultiplicityTable<DIM>,
    end_behaviour: &EndBehaviourTable<DIM>,
) -> Result<()> {
    if degree.is_empty() {
        return Err(IgaError::Configuration("a space needs at least one component".into()));
    }
    let n_comp = degree.len();
    if interior_mult.len() != n_comp {
        return Err(IgaError::mismatch("multiplicity table components", n_comp, interior_mult.len()));
    }
    if end_behaviour.len() != n_comp {
        return Err(IgaError::mismatch("end behaviour table components", n_comp, end_behaviour.len()));
    }
    let tol = Tolerance::default();
    for c in 0..n_comp {
        for d in 0..DIM {
            let knots = &grid.knots()[d];
            let p = degree[c][d];
            let mults = &interior_mult[c][d];
            if mults.len() != knots.len() - 2 {
                return Err(IgaError::mismatch(
                    format!("interior multiplicities of component {} direction {}", c, d),
                    knots.len() - 2,
                    mults.len(),
                ));
            }
            let max_mult = p.max(1);
            if let Some(&m) = mults.iter().find(|&&m| m == 0 || m > max_mult) {
                return Err(IgaError::Configuration(format!(
                    "multiplicity {} outside [1, {}] for degree {} (component {}, direction {})",
                    m, max_mult, p, c, d
                )));
            }
            match &end_behaviour[c][d] {
                EndBehaviour::Interpolatory => {}
                EndBehaviour::Periodic => {
                    let n_basis = count_basis(p, mults, &EndBehaviour::Periodic);
                    if n_basis < p + 1 {
                        return Err(IgaError::Configuration(format!(
                            "periodic direction {} of component {} has {} basis functions, degree {} needs at least {}",
                            d,
                            c,
                            n_basis,
                            p,
                            p + 1
                        )));
                    }
                }
                EndBehaviour::EndKnots { left, right } => {
                    check_end_knots(left, right, knots, p, tol)
                        .map_err(|e| annotate(e, c, d))?;
                }
            }
        }
    }
    Ok(())
}

fn check_end_knots(left: &[f64], right: &[f64], knots: &[f64], p: usize, tol: Tolerance) -> Result<()> {
    if left.len() != p + 1 {
        return Err(IgaError::mismatch("left end knots", p + 1, left.len()));
    }
    if right.len() != p + 1 {
        return Err(IgaError::mismatch("right end knots", p + 1, right.len()));
    }
    let (x0, xn) = (knots[0], knots[knots.len() - 1]);
    if !tol.approx_eq(left[p], x0) || !tol.approx_eq(right[0], xn) {
        return Err(IgaError::InvalidKnots(format!(
            "innermost end knots ({}, {}) differ from the domain ends ({}, {})",
            left[p], right[0], x0, xn
        )));
    }
    if left.windows(2).chain(right.windows(2)).any(|w| w[1] < w[0]) {
        return Err(IgaError::InvalidKnots("end knots are not non-decreasing".into()));
    }
    Ok(())
}

fn annotate(err: IgaError, comp: usize, dir: usize) -> IgaError {
    match err {
        IgaError::InvalidKnots(msg) => {
            IgaError::InvalidKnots(format!("{} (component {}, direction {})", msg, comp, dir))
        }
        other => other,
    }
}

/// Domain knots with interior multiplicities expanded.
fn expand(knots: &[f64], mults: &[usize]) -> Vec<f64> {
    let mut out = Vec::with_capacity(mults.iter().sum::<usize>() + 2);
    out.push(knots[0]);
    for (x, &m) in knots[1..knots.len() - 1].iter().zip(mults) {
        out.extend(std::iter::repeat(*x).take(m));
    }
    out.push(knots[knots.len() - 1]);
    out
}

fn build_knots<const DIM: usize>(
    grid: &Grid<DIM>,
    degree: &DegreeTable<DIM>,
    interior_mult: &MultiplicityTable<DIM>,
    end_behaviour: &EndBehaviourTable<DIM>,
) -> KnotsTable<DIM> {
    degree
        .iter()
        .enumerate()
        .map(|(c, deg)| {
            std::array::from_fn(|d| {
                let knots = &grid.knots()[d];
                let p = deg[d];
                let inner = expand(knots, &interior_mult[c][d]);
                let (x0, xn) = (knots[0], knots[knots.len() - 1]);
                let (left, right): (Vec<f64>, Vec<f64>) = match &end_behaviour[c][d] {
                    EndBehaviour::Interpolatory => (vec![x0; p], vec![xn; p]),
                    EndBehaviour::EndKnots { left, right } => (left[..p].to_vec(), right[1..].to_vec()),
                    EndBehaviour::Periodic => {
                        let period = xn - x0;
                        let last = inner.len() - 1;
                        (
                            inner[last - p..last].iter().map(|x| x - period).collect(),
                            inner[1..=p].iter().map(|x| x + period).collect(),
                        )
                    }
                };
                let mut rep = left;
                rep.extend(inner);
                rep.extend(right);
                rep
            })
        })
        .collect()
}
