use iga_core::{IgaError, Result};

/// Axis-aligned box `[min_0, max_0] x ... x [min_{d-1}, max_{d-1}]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox<const DIM: usize> {
    pub min: [f64; DIM],
    pub max: [f64; DIM],
}

impl<const DIM: usize> BBox<DIM> {
    /// Build a box, failing if any side is empty or inverted.
    pub fn new(min: [f64; DIM], max: [f64; DIM]) -> Result<Self> {
        for k in 0..DIM {
            if !(min[k] < max[k]) {
                return Err(IgaError::Configuration(format!(
                    "bounding box side {} is empty: [{}, {}]",
                    k, min[k], max[k]
                )));
            }
        }
        Ok(Self { min, max })
    }

    /// The unit hypercube `[0,1]^DIM`.
    pub fn unit() -> Self {
        Self {
            min: [0.0; DIM],
            max: [1.0; DIM],
        }
    }

    pub fn from_points(points: &[[f64; DIM]]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut min = *first;
        let mut max = *first;
        for p in rest {
            for k in 0..DIM {
                min[k] = min[k].min(p[k]);
                max[k] = max[k].max(p[k]);
            }
        }
        Some(Self { min, max })
    }

    pub fn center(&self) -> [f64; DIM] {
        std::array::from_fn(|k| 0.5 * (self.min[k] + self.max[k]))
    }

    pub fn extents(&self) -> [f64; DIM] {
        std::array::from_fn(|k| self.max[k] - self.min[k])
    }

    /// Product of the side lengths.
    pub fn measure(&self) -> f64 {
        self.extents().iter().product()
    }

    pub fn contains_point(&self, p: &[f64; DIM]) -> bool {
        (0..DIM).all(|k| p[k] >= self.min[k] && p[k] <= self.max[k])
    }
}
