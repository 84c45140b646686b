//! Region quadtree used as the physics broad phase.
//!
//! The tree stores `(Rect, T)` entries. A leaf splits into four equal quadrants
//! once it holds more than `max_objects` entries; entries that straddle a
//! quadrant boundary are stored in every quadrant they overlap, so
//! [`QuadTree::retrieve`] can return the same item more than once. Callers that
//! need unique candidates must deduplicate.

use crate::math::Rect;

/// Default number of entries a leaf holds before it splits.
pub const DEFAULT_MAX_OBJECTS: usize = 10;
/// Default depth at which leaves stop splitting.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Quadrant order used by [`QuadTree::quadrants`]: NE, NW, SW, SE.
pub const NORTH_EAST: usize = 0;
pub const NORTH_WEST: usize = 1;
pub const SOUTH_WEST: usize = 2;
pub const SOUTH_EAST: usize = 3;

#[derive(Debug, Clone)]
pub struct QuadTree<T: Copy> {
    bounds: Rect,
    max_objects: usize,
    max_depth: usize,
    depth: usize,
    objects: Vec<(Rect, T)>,
    children: Option<Box<[QuadTree<T>; 4]>>,
}

impl<T: Copy> QuadTree<T> {
    pub fn new(bounds: Rect, max_objects: usize) -> Self {
        Self::with_depth_limit(bounds, max_objects, DEFAULT_MAX_DEPTH)
    }

    pub fn with_depth_limit(bounds: Rect, max_objects: usize, max_depth: usize) -> Self {
        Self::node(bounds, max_objects.max(1), max_depth, 0)
    }

    fn node(bounds: Rect, max_objects: usize, max_depth: usize, depth: usize) -> Self {
        Self {
            bounds,
            max_objects,
            max_depth,
            depth,
            objects: Vec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_split(&self) -> bool {
        self.children.is_some()
    }

    /// Child nodes in NE, NW, SW, SE order, if this node has split.
    pub fn children(&self) -> Option<&[QuadTree<T>; 4]> {
        self.children.as_deref()
    }

    /// Entries stored directly in this node (always empty once split).
    pub fn local_len(&self) -> usize {
        self.objects.len()
    }

    /// Total stored entries, counting duplicated straddlers once per leaf.
    pub fn len(&self) -> usize {
        self.objects.len()
            + self
                .children
                .as_ref()
                .map(|c| c.iter().map(|n| n.len()).sum())
                .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and collapse the tree back to a single leaf.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.children = None;
    }

    pub fn insert(&mut self, rect: Rect, item: T) {
        if let Some(children) = self.children.as_mut() {
            for index in quadrants(&self.bounds, &rect) {
                children[index].insert(rect, item);
            }
            return;
        }

        self.objects.push((rect, item));

        if self.objects.len() > self.max_objects && self.depth < self.max_depth {
            self.split();
        }
    }

    /// Collect every item stored in a leaf whose quadrant the query overlaps.
    ///
    /// This over-approximates: the result contains every item whose rectangle
    /// overlaps `rect`, plus neighbours sharing a leaf, possibly repeated.
    pub fn retrieve(&self, rect: &Rect) -> Vec<T> {
        let mut found = Vec::new();
        self.retrieve_into(rect, &mut found);
        found
    }

    pub fn retrieve_into(&self, rect: &Rect, out: &mut Vec<T>) {
        out.extend(self.objects.iter().map(|(_, item)| *item));

        if let Some(children) = &self.children {
            for index in quadrants(&self.bounds, rect) {
                children[index].retrieve_into(rect, out);
            }
        }
    }

    /// Quadrant indices of this node that `rect` overlaps.
    pub fn quadrants(&self, rect: &Rect) -> Vec<usize> {
        quadrants(&self.bounds, rect)
    }

    fn split(&mut self) {
        let Rect {
            x,
            y,
            width,
            height,
        } = self.bounds;
        let hw = width * 0.5;
        let hh = height * 0.5;
        let depth = self.depth + 1;
        let (max_objects, max_depth) = (self.max_objects, self.max_depth);
        let child = |bounds| QuadTree::node(bounds, max_objects, max_depth, depth);

        let mut children = Box::new([
            child(Rect::new(x + hw, y, hw, hh)),
            child(Rect::new(x, y, hw, hh)),
            child(Rect::new(x, y + hh, hw, hh)),
            child(Rect::new(x + hw, y + hh, hw, hh)),
        ]);

        for (rect, item) in self.objects.drain(..) {
            for index in quadrants(&self.bounds, &rect) {
                children[index].insert(rect, item);
            }
        }

        self.children = Some(children);
    }
}

/// Every rect lands in at least one quadrant, also when it lies outside `bounds`.
fn quadrants(bounds: &Rect, rect: &Rect) -> Vec<usize> {
    let mid_x = bounds.x + bounds.width * 0.5;
    let mid_y = bounds.y + bounds.height * 0.5;

    let west = rect.left() <= mid_x;
    let east = rect.right() >= mid_x;
    let north = rect.top() <= mid_y;
    let south = rect.bottom() >= mid_y;

    let mut indexes = Vec::with_capacity(4);
    if east && north {
        indexes.push(NORTH_EAST);
    }
    if west && north {
        indexes.push(NORTH_WEST);
    }
    if west && south {
        indexes.push(SOUTH_WEST);
    }
    if east && south {
        indexes.push(SOUTH_EAST);
    }
    indexes
}
