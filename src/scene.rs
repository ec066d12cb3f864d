//! Z-ordered container of drawables.

use crate::change::ChangeFlag;
use crate::drawable::{Drawable, DrawableId, TraceControl};
use crate::geom::Point;
use crate::subject::{Event, Subject};
use crate::surface::Canvas;
use crate::transform::CoordMap;

/// Suggested z-indices for common drawable kinds.
///
/// Values are coarse so applications can slot their own layers in between.
pub mod z {
    /// Background decorations (grids, frames).
    pub const BACKGROUND: i32 = -100;
    /// Data traces.
    pub const TRACES: i32 = 0;
    /// Interactive shapes drawn above traces.
    pub const SHAPES: i32 = 20;
    /// Text labels.
    pub const LABELS: i32 = 40;
}

struct Entry {
    id: DrawableId,
    z_index: i32,
    drawable: Box<dyn Drawable>,
}

/// An ordered collection of drawables, back to front.
///
/// Members are kept sorted by z-index at all times. Within a tie, [`add`]
/// places the newcomer above existing members and [`prepend`] places it
/// beneath them. Structural changes set the graph's own change flag and are
/// broadcast on its [`Subject`].
///
/// [`add`]: SceneGraph::add
/// [`prepend`]: SceneGraph::prepend
pub struct SceneGraph {
    entries: Vec<Entry>,
    next_id: u64,
    flag: ChangeFlag,
    subject: Subject,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create an empty scene graph.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
            flag: ChangeFlag::default(),
            subject: Subject::new("scene-graph"),
        }
    }

    /// Access the subject broadcasting structural changes.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the graph has no members.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a drawable above every member with the same or lower z-index.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if another member renders the same model
    /// object.
    pub fn add(&mut self, drawable: Box<dyn Drawable>) -> DrawableId {
        let z_index = drawable.z_index();
        let index = self.entries.partition_point(|entry| entry.z_index <= z_index);
        self.insert(index, drawable)
    }

    /// Insert several drawables, in order, as by repeated [`add`](Self::add).
    pub fn add_all<I>(&mut self, drawables: I) -> Vec<DrawableId>
    where
        I: IntoIterator<Item = Box<dyn Drawable>>,
    {
        drawables.into_iter().map(|drawable| self.add(drawable)).collect()
    }

    /// Insert a drawable beneath every member with the same or higher
    /// z-index.
    pub fn prepend(&mut self, drawable: Box<dyn Drawable>) -> DrawableId {
        let z_index = drawable.z_index();
        let index = self.entries.partition_point(|entry| entry.z_index < z_index);
        self.insert(index, drawable)
    }

    fn insert(&mut self, index: usize, drawable: Box<dyn Drawable>) -> DrawableId {
        if let Some(model) = drawable.model_id() {
            debug_assert!(
                !self
                    .entries
                    .iter()
                    .any(|entry| entry.drawable.model_id() == Some(model)),
                "model {model:?} is already drawn by this scene graph"
            );
        }
        let id = DrawableId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            index,
            Entry {
                id,
                z_index: drawable.z_index(),
                drawable,
            },
        );
        self.flag.set();
        self.subject.notify(&Event::DrawableAdded(id));
        id
    }

    /// Remove one member. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: DrawableId) -> Option<Box<dyn Drawable>> {
        let index = self.position(id)?;
        let entry = self.entries.remove(index);
        self.flag.set();
        self.subject.notify(&Event::DrawableRemoved(id));
        Some(entry.drawable)
    }

    /// Remove every member matching the predicate, front-most first.
    ///
    /// Returns the removed drawables in back-to-front order.
    pub fn remove_all<P>(&mut self, mut predicate: P) -> Vec<Box<dyn Drawable>>
    where
        P: FnMut(&dyn Drawable) -> bool,
    {
        let mut removed = Vec::new();
        for index in (0..self.entries.len()).rev() {
            if predicate(self.entries[index].drawable.as_ref()) {
                let entry = self.entries.remove(index);
                self.flag.set();
                self.subject.notify(&Event::DrawableRemoved(entry.id));
                removed.push(entry.drawable);
            }
        }
        removed.reverse();
        removed
    }

    /// Remove every member.
    pub fn clear(&mut self) -> Vec<Box<dyn Drawable>> {
        self.remove_all(|_| true)
    }

    /// Find the back-most member matching the predicate.
    pub fn find<P>(&self, mut predicate: P) -> Option<DrawableId>
    where
        P: FnMut(&dyn Drawable) -> bool,
    {
        self.entries
            .iter()
            .find(|entry| predicate(entry.drawable.as_ref()))
            .map(|entry| entry.id)
    }

    /// Find the front-most member containing a model-space point.
    pub fn find_at(&self, point: Point) -> Option<DrawableId> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.drawable.contains(point))
            .map(|entry| entry.id)
    }

    /// Access a member.
    pub fn get(&self, id: DrawableId) -> Option<&dyn Drawable> {
        let index = self.position(id)?;
        Some(self.entries[index].drawable.as_ref())
    }

    /// Mutate a member, restoring z-order afterwards.
    ///
    /// If the z-index changed, the member moves above every member with the
    /// same z-index and [`Event::Reordered`] is broadcast.
    pub fn update<R, F>(&mut self, id: DrawableId, f: F) -> Option<R>
    where
        F: FnOnce(&mut dyn Drawable) -> R,
    {
        let index = self.position(id)?;
        let result = f(self.entries[index].drawable.as_mut());
        let z_index = self.entries[index].drawable.z_index();
        if z_index != self.entries[index].z_index {
            let mut entry = self.entries.remove(index);
            entry.z_index = z_index;
            let target = self.entries.partition_point(|other| other.z_index <= z_index);
            self.entries.insert(target, entry);
            self.flag.set();
            self.subject.notify(&Event::Reordered);
        }
        Some(result)
    }

    /// Member ids, back to front.
    pub fn to_ordered_list(&self) -> Vec<DrawableId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Iterate over members, back to front.
    pub fn iter(&self) -> impl Iterator<Item = (DrawableId, &dyn Drawable)> + '_ {
        self.entries
            .iter()
            .map(|entry| (entry.id, entry.drawable.as_ref()))
    }

    /// Run `f` on every member exposing trace controls.
    pub fn for_each_trace<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut dyn TraceControl),
    {
        for entry in &mut self.entries {
            if let Some(trace) = entry.drawable.as_trace_mut() {
                f(trace);
            }
        }
    }

    /// Report and reset structural and member change state.
    ///
    /// Every member is queried, even after one reported a change.
    pub fn changed(&mut self) -> bool {
        let structural = self.flag.query();
        self.entries
            .iter_mut()
            .fold(structural, |changed, entry| entry.drawable.changed() | changed)
    }

    /// Draw every member, back to front.
    pub fn draw(&mut self, canvas: &mut dyn Canvas, map: &CoordMap) {
        for entry in &mut self.entries {
            entry.drawable.draw(canvas, map);
        }
    }

    fn position(&self, id: DrawableId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field(
                "members",
                &self
                    .entries
                    .iter()
                    .map(|entry| (entry.id, entry.z_index))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderCommand;
    use crate::subject::observer_fn;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Probe {
        tag: u32,
        z_index: i32,
        dirty: ChangeFlag,
        queries: Rc<RefCell<Vec<u32>>>,
    }

    impl Probe {
        fn boxed(tag: u32, z_index: i32) -> Box<dyn Drawable> {
            Box::new(Self {
                tag,
                z_index,
                dirty: ChangeFlag::default(),
                queries: Rc::default(),
            })
        }
    }

    impl Drawable for Probe {
        fn draw(&mut self, canvas: &mut dyn Canvas, _map: &CoordMap) {
            canvas.draw(RenderCommand::ClipEnd);
        }

        fn changed(&mut self) -> bool {
            self.queries.borrow_mut().push(self.tag);
            self.dirty.query()
        }

        fn z_index(&self) -> i32 {
            self.z_index
        }

        fn set_z_index(&mut self, z_index: i32) {
            self.z_index = z_index;
        }

        fn contains(&self, point: Point) -> bool {
            point.x <= f64::from(self.tag)
        }
    }

    fn z_order(scene: &SceneGraph) -> Vec<i32> {
        scene.iter().map(|(_, drawable)| drawable.z_index()).collect()
    }

    #[test]
    fn add_and_prepend_break_ties_differently() {
        let mut added = SceneGraph::new();
        let ids: Vec<_> = [3, 1, 2, 1]
            .into_iter()
            .map(|z| added.add(Probe::boxed(0, z)))
            .collect();
        assert_eq!(added.to_ordered_list(), [ids[1], ids[3], ids[2], ids[0]]);

        let mut prepended = SceneGraph::new();
        let ids: Vec<_> = [3, 1, 2, 1]
            .into_iter()
            .map(|z| prepended.prepend(Probe::boxed(0, z)))
            .collect();
        assert_eq!(prepended.to_ordered_list(), [ids[3], ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn add_all_orders_ties_like_repeated_add() {
        let mut scene = SceneGraph::new();
        let first = scene.add(Probe::boxed(1, 1));
        let ids = scene.add_all([3, 1, 2, 1].map(|z| Probe::boxed(0, z)));
        assert_eq!(ids.len(), 4);
        assert_eq!(
            scene.to_ordered_list(),
            [first, ids[1], ids[3], ids[2], ids[0]]
        );
        assert_eq!(z_order(&scene), [1, 1, 1, 2, 3]);
    }

    #[test]
    fn changed_queries_every_member() {
        let queries = Rc::new(RefCell::new(Vec::new()));
        let mut scene = SceneGraph::new();
        for tag in 0..3 {
            scene.add(Box::new(Probe {
                tag,
                z_index: 0,
                dirty: ChangeFlag::new(true),
                queries: Rc::clone(&queries),
            }));
        }
        assert!(scene.changed());
        assert_eq!(*queries.borrow(), [0, 1, 2]);
        assert!(!scene.changed());
    }

    #[test]
    fn remove_all_visits_each_member_once() {
        let mut scene = SceneGraph::new();
        for tag in 0..6 {
            scene.add(Probe::boxed(tag, (tag % 3) as i32));
        }
        let mut visited = 0;
        let removed = scene.remove_all(|drawable| {
            visited += 1;
            drawable.z_index() != 1
        });
        assert_eq!(visited, 6);
        assert_eq!(removed.len(), 4);
        assert_eq!(z_order(&scene), [1, 1]);
    }

    #[test]
    fn removing_absent_member_is_a_no_op() {
        let mut scene = SceneGraph::new();
        let id = scene.add(Probe::boxed(0, 0));
        assert!(scene.remove(id).is_some());
        scene.changed();
        assert!(scene.remove(id).is_none());
        assert!(!scene.changed());
    }

    #[test]
    fn structural_changes_are_broadcast() {
        let mut scene = SceneGraph::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        scene.subject().subscribe(observer_fn(move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        }));
        let a = scene.add(Probe::boxed(0, 0));
        let b = scene.add(Probe::boxed(1, 0));
        scene.remove(a);
        assert_eq!(
            *events.borrow(),
            [
                Event::DrawableAdded(a),
                Event::DrawableAdded(b),
                Event::DrawableRemoved(a),
            ]
        );
    }

    #[test]
    fn hit_test_prefers_front_most() {
        let mut scene = SceneGraph::new();
        let wide = scene.add(Probe::boxed(10, 0));
        let narrow = scene.add(Probe::boxed(5, 1));
        assert_eq!(scene.find_at(Point::new(3.0, 0.0)), Some(narrow));
        assert_eq!(scene.find_at(Point::new(8.0, 0.0)), Some(wide));
        assert_eq!(scene.find_at(Point::new(20.0, 0.0)), None);
    }

    #[test]
    #[should_panic(expected = "already drawn")]
    #[cfg(debug_assertions)]
    fn duplicate_model_fails_fast_in_debug() {
        let series = crate::datasource::PointSeries::shared(4);
        let mut scene = SceneGraph::new();
        scene.add(Box::new(crate::trace::Trace::new(&series)));
        scene.add(Box::new(crate::trace::Trace::new(&series)));
    }

    #[test]
    fn update_restores_order_when_z_changes() {
        let mut scene = SceneGraph::new();
        let a = scene.add(Probe::boxed(0, 0));
        let b = scene.add(Probe::boxed(1, 0));
        let c = scene.add(Probe::boxed(2, 1));
        scene.changed();

        scene.update(a, |drawable| drawable.set_z_index(0));
        assert!(!scene.changed());
        assert_eq!(scene.to_ordered_list(), [a, b, c]);

        scene.update(a, |drawable| drawable.set_z_index(1));
        assert!(scene.changed());
        assert_eq!(scene.to_ordered_list(), [b, c, a]);
    }

    proptest! {
        #[test]
        fn add_keeps_insertion_order_within_ties(zs in proptest::collection::vec(-3i32..3, 0..24)) {
            let mut scene = SceneGraph::new();
            let mut expected: Vec<(i32, DrawableId)> = zs
                .iter()
                .map(|&z| (z, scene.add(Probe::boxed(0, z))))
                .collect();
            expected.sort_by_key(|(z, _)| *z);
            let ids: Vec<_> = expected.into_iter().map(|(_, id)| id).collect();
            prop_assert_eq!(scene.to_ordered_list(), ids);
        }

        #[test]
        fn prepend_reverses_insertion_order_within_ties(zs in proptest::collection::vec(-3i32..3, 0..24)) {
            let mut scene = SceneGraph::new();
            let mut expected: Vec<(i32, DrawableId)> = zs
                .iter()
                .map(|&z| (z, scene.prepend(Probe::boxed(0, z))))
                .collect();
            expected.reverse();
            expected.sort_by_key(|(z, _)| *z);
            let ids: Vec<_> = expected.into_iter().map(|(_, id)| id).collect();
            prop_assert_eq!(scene.to_ordered_list(), ids);
        }
    }
}
