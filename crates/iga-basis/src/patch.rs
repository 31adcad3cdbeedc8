//! A grid together with everything built on it, kept consistent under refinement.

use std::fmt;
use std::sync::Arc;

use iga_core::{IgaError, Result};
use iga_grid::{Grid, RefinementEvent, RefinementListener};
use log::debug;
use slotmap::{new_key_type, SlotMap};

use crate::bspline_space::BSplineSpace;
use crate::evaluator::ReferenceBasis;
use crate::ig_function::IgFunction;
use crate::nurbs::NurbsSpace;

new_key_type! {
    /// Handle of an object registered with a [`Patch`].
    pub struct SubscriberId;
}

/// An object that depends on the patch grid.
pub enum Subscriber<const DIM: usize> {
    BSpline(BSplineSpace<DIM>),
    Nurbs(NurbsSpace<DIM>),
    Function(IgFunction<DIM>),
    Listener(Box<dyn RefinementListener<DIM>>),
}

impl<const DIM: usize> Subscriber<DIM> {
    fn grid(&self) -> Option<&Arc<Grid<DIM>>> {
        match self {
            Self::BSpline(s) => Some(s.grid()),
            Self::Nurbs(s) => Some(s.grid()),
            Self::Function(f) => Some(f.grid()),
            Self::Listener(_) => None,
        }
    }

    /// The rebuilt object, or `None` for external listeners.
    fn refined(&self, grid: &Arc<Grid<DIM>>, event: &RefinementEvent<DIM>) -> Result<Option<Self>> {
        Ok(match self {
            Self::BSpline(s) => Some(Self::BSpline(s.refined(grid, event)?)),
            Self::Nurbs(s) => Some(Self::Nurbs(s.refined(grid, event)?)),
            Self::Function(f) => Some(Self::Function(f.refined(grid, event)?)),
            Self::Listener(_) => None,
        })
    }
}

impl<const DIM: usize> fmt::Debug for Subscriber<DIM> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BSpline(s) => f.debug_tuple("BSpline").field(s).finish(),
            Self::Nurbs(s) => f.debug_tuple("Nurbs").field(s).finish(),
            Self::Function(s) => f.debug_tuple("Function").field(s).finish(),
            Self::Listener(_) => f.write_str("Listener(..)"),
        }
    }
}

/// Owner of a grid and registry of its dependents.
///
/// Refinement rebuilds every registered space and function aside, notifies
/// external listeners in subscription order, and commits the new grid and
/// objects only if nothing failed.
#[derive(Debug)]
pub struct Patch<const DIM: usize> {
    grid: Arc<Grid<DIM>>,
    subscribers: SlotMap<SubscriberId, Subscriber<DIM>>,
    order: Vec<SubscriberId>,
}

impl<const DIM: usize> Patch<DIM> {
    pub fn new(grid: Grid<DIM>) -> Self {
        Self::from_shared(Arc::new(grid))
    }

    pub fn from_shared(grid: Arc<Grid<DIM>>) -> Self {
        Self {
            grid,
            subscribers: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    pub fn grid(&self) -> &Arc<Grid<DIM>> {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Register `subscriber`; spaces and functions must live on the patch grid.
    pub fn subscribe(&mut self, subscriber: Subscriber<DIM>) -> Result<SubscriberId> {
        if let Some(grid) = subscriber.grid() {
            if !grid.same_as(&self.grid) {
                return Err(IgaError::GridMismatch(format!(
                    "object on grid {} (rev {}) subscribed to a patch on grid {} (rev {})",
                    grid.id(),
                    grid.revision(),
                    self.grid.id(),
                    self.grid.revision()
                )));
            }
        }
        let id = self.subscribers.insert(subscriber);
        self.order.push(id);
        Ok(id)
    }

    pub fn add_bspline_space(&mut self, space: BSplineSpace<DIM>) -> Result<SubscriberId> {
        self.subscribe(Subscriber::BSpline(space))
    }

    pub fn add_nurbs_space(&mut self, space: NurbsSpace<DIM>) -> Result<SubscriberId> {
        self.subscribe(Subscriber::Nurbs(space))
    }

    pub fn add_function(&mut self, function: IgFunction<DIM>) -> Result<SubscriberId> {
        self.subscribe(Subscriber::Function(function))
    }

    pub fn add_listener(&mut self, listener: Box<dyn RefinementListener<DIM>>) -> SubscriberId {
        let id = self.subscribers.insert(Subscriber::Listener(listener));
        self.order.push(id);
        id
    }

    /// Remove a subscriber; later refinements no longer reach it.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> Option<Subscriber<DIM>> {
        let removed = self.subscribers.remove(id)?;
        self.order.retain(|&other| other != id);
        Some(removed)
    }

    pub fn get(&self, id: SubscriberId) -> Option<&Subscriber<DIM>> {
        self.subscribers.get(id)
    }

    pub fn bspline_space(&self, id: SubscriberId) -> Option<&BSplineSpace<DIM>> {
        match self.subscribers.get(id)? {
            Subscriber::BSpline(s) => Some(s),
            _ => None,
        }
    }

    pub fn nurbs_space(&self, id: SubscriberId) -> Option<&NurbsSpace<DIM>> {
        match self.subscribers.get(id)? {
            Subscriber::Nurbs(s) => Some(s),
            _ => None,
        }
    }

    pub fn function(&self, id: SubscriberId) -> Option<&IgFunction<DIM>> {
        match self.subscribers.get(id)? {
            Subscriber::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Subscribers in subscription order.
    pub fn subscribers(&self) -> impl Iterator<Item = (SubscriberId, &Subscriber<DIM>)> + '_ {
        self.order.iter().filter_map(|&id| self.subscribers.get(id).map(|s| (id, s)))
    }

    /// Split the intervals of the flagged directions and update all subscribers.
    ///
    /// Every listener is notified, even after one of them fails. The patch
    /// switches to the refined grid and rebuilt objects only when all
    /// rebuilds and notifications succeed; otherwise the first error is
    /// returned and the patch is left as it was.
    pub fn refine_directions(&mut self, directions: [bool; DIM], subdivisions: [usize; DIM]) -> Result<()> {
        let (grid, event) = self.grid.refine_directions(directions, subdivisions)?;

        let mut rebuilt = Vec::new();
        for &id in &self.order {
            if let Some(new) = self.subscribers[id].refined(&grid, &event)? {
                rebuilt.push((id, new));
            }
        }

        let mut first_error = None;
        for &id in &self.order {
            if let Subscriber::Listener(listener) = &mut self.subscribers[id] {
                if let Err(err) = listener.on_refinement(&grid, &event) {
                    debug!("listener {:?} rejected refinement of grid {}: {}", id, grid.id(), err);
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        debug!(
            "patch on grid {}: revision {} -> {}, {} object(s) rebuilt",
            grid.id(),
            self.grid.revision(),
            grid.revision(),
            rebuilt.len()
        );
        for (id, new) in rebuilt {
            self.subscribers[id] = new;
        }
        self.grid = grid;
        Ok(())
    }

    /// Split every interval of every direction into `subdivisions` parts.
    pub fn refine(&mut self, subdivisions: usize) -> Result<()> {
        self.refine_directions([true; DIM], [subdivisions; DIM])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        tag: usize,
        log: Rc<RefCell<Vec<(usize, u64)>>>,
    }

    impl RefinementListener<1> for Recorder {
        fn on_refinement(&mut self, grid: &Arc<Grid<1>>, _event: &RefinementEvent<1>) -> Result<()> {
            self.log.borrow_mut().push((self.tag, grid.revision()));
            Ok(())
        }
    }

    #[test]
    fn test_listeners_in_subscription_order() {
        let mut patch = Patch::new(Grid::<1>::uniform([3]).unwrap());
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = patch.add_listener(Box::new(Recorder { tag: 1, log: log.clone() }));
        patch.add_listener(Box::new(Recorder { tag: 2, log: log.clone() }));
        patch.add_listener(Box::new(Recorder { tag: 3, log: log.clone() }));
        patch.refine(2).unwrap();
        assert_eq!(*log.borrow(), vec![(1, 1), (2, 1), (3, 1)]);

        assert!(patch.unsubscribe(a).is_some());
        assert!(patch.unsubscribe(a).is_none());
        patch.refine(2).unwrap();
        assert_eq!(&log.borrow()[3..], &[(2, 2), (3, 2)]);
        assert_eq!(patch.len(), 2);
    }

    struct Rejecting;

    impl RefinementListener<1> for Rejecting {
        fn on_refinement(&mut self, _grid: &Arc<Grid<1>>, _event: &RefinementEvent<1>) -> Result<()> {
            Err(IgaError::Configuration("refinement rejected".into()))
        }
    }

    #[test]
    fn test_failed_listener_keeps_patch_unchanged() {
        let mut patch = Patch::new(Grid::<1>::uniform([3]).unwrap());
        let space = BSplineSpace::scalar(patch.grid().clone(), [2]).unwrap();
        let id = patch.add_bspline_space(space).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        patch.add_listener(Box::new(Rejecting));
        patch.add_listener(Box::new(Recorder { tag: 2, log: log.clone() }));

        assert!(matches!(patch.refine(2), Err(IgaError::Configuration(_))));
        // later listeners still hear about the attempt
        assert_eq!(*log.borrow(), vec![(2, 1)]);
        assert_eq!(patch.grid().revision(), 0);
        assert_eq!(patch.grid().num_elements(), 2);
        let space = patch.bspline_space(id).unwrap();
        assert!(space.grid().same_as(patch.grid()));
        assert_eq!(space.num_basis(), 4);
    }

    #[test]
    fn test_spaces_follow_the_grid() {
        let mut patch = Patch::new(Grid::<1>::uniform([3]).unwrap());
        let space = BSplineSpace::scalar(patch.grid().clone(), [2]).unwrap();
        let id = patch.add_bspline_space(space).unwrap();
        patch.refine(3).unwrap();
        let space = patch.bspline_space(id).unwrap();
        assert_eq!(space.grid().num_elements(), 6);
        assert_eq!(space.num_basis(), 8);
        assert!(space.grid().same_as(patch.grid()));
        assert!(patch.nurbs_space(id).is_none());
    }

    #[test]
    fn test_stale_space_rejected() {
        let mut patch = Patch::new(Grid::<1>::uniform([3]).unwrap());
        let stale = BSplineSpace::scalar(patch.grid().clone(), [1]).unwrap();
        patch.refine(2).unwrap();
        assert!(matches!(
            patch.add_bspline_space(stale),
            Err(IgaError::GridMismatch(_))
        ));
        let other = BSplineSpace::scalar(Arc::new(Grid::<1>::uniform([3]).unwrap()), [1]).unwrap();
        assert!(patch.add_bspline_space(other).is_err());
    }
}
