//! AABB rigid-body physics with a quadtree broad phase and impulse resolution.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::events::{EventBus, HandlerError, NamedEvent, SubscriptionId};
use crate::math::{Rect, Vec2};
use crate::spatial::{QuadTree, DEFAULT_MAX_DEPTH, DEFAULT_MAX_OBJECTS};

/// Restitution given to bodies that do not set one.
pub const DEFAULT_RESTITUTION: f32 = 0.2;
/// Share of the centre offset used to push overlapping bodies apart.
pub const DEFAULT_CORRECTION: f32 = 0.5;
const MIN_CORRECTION: f32 = 0.01;
const MAX_CORRECTION: f32 = 0.5;

/// Opaque handle to a body owned by a [`PhysicsWorld`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyId(u32);

impl BodyId {
    /// Get the underlying integer ID (useful for debugging or serialization).
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// Axis-aligned rigid body.
///
/// `position` is the top-left corner of the AABB and `size` its extent.
/// `mass` is ignored for static bodies, which behave as infinitely heavy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidBody2D {
    pub position: Vec2,
    pub size: Vec2,
    pub velocity: Vec2,
    pub mass: f32,
    pub is_static: bool,
    pub use_gravity: bool,
    pub collider: bool,
    pub restitution: f32,
    pub damping: f32,
    #[serde(default)]
    pub max_velocity: Option<f32>,
}

impl RigidBody2D {
    /// A dynamic body affected by gravity with a collider.
    pub fn dynamic(position: Vec2, size: Vec2, mass: f32) -> Self {
        Self {
            position,
            size,
            velocity: Vec2::ZERO,
            mass,
            is_static: false,
            use_gravity: true,
            collider: true,
            restitution: DEFAULT_RESTITUTION,
            damping: 0.0,
            max_velocity: None,
        }
    }

    /// An immovable body (walls, ground, platforms).
    pub fn fixed(position: Vec2, size: Vec2) -> Self {
        Self {
            mass: 0.0,
            is_static: true,
            use_gravity: false,
            ..Self::dynamic(position, size, 0.0)
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_max_velocity(mut self, max_velocity: f32) -> Self {
        self.max_velocity = Some(max_velocity);
        self
    }

    pub fn with_gravity(mut self, use_gravity: bool) -> Self {
        self.use_gravity = use_gravity;
        self
    }

    pub fn with_collider(mut self, collider: bool) -> Self {
        self.collider = collider;
        self
    }

    pub fn aabb(&self) -> Rect {
        Rect::from_position_size(self.position, self.size)
    }

    pub fn center(&self) -> Vec2 {
        self.aabb().center()
    }

    /// Zero for static bodies.
    pub fn inverse_mass(&self) -> f32 {
        if self.is_static {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Check the invariants the simulation relies on.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.position.is_finite() {
            return Err(PhysicsError::NonFinite { field: "position" });
        }
        if !self.velocity.is_finite() {
            return Err(PhysicsError::NonFinite { field: "velocity" });
        }
        if !self.size.is_finite() || self.size.x < 0.0 || self.size.y < 0.0 {
            return Err(PhysicsError::InvalidSize {
                width: self.size.x,
                height: self.size.y,
            });
        }
        if !self.is_static && !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(PhysicsError::InvalidMass { mass: self.mass });
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(PhysicsError::InvalidRestitution {
                restitution: self.restitution,
            });
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err(PhysicsError::InvalidDamping {
                damping: self.damping,
            });
        }
        if let Some(max) = self.max_velocity {
            if !(max > 0.0) {
                return Err(PhysicsError::InvalidMaxVelocity { max_velocity: max });
            }
        }
        Ok(())
    }
}

/// Rejected body configuration. Raised when a body is added, never while stepping.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    #[error("dynamic body needs a finite mass > 0, got {mass}")]
    InvalidMass { mass: f32 },
    #[error("restitution must be within [0, 1], got {restitution}")]
    InvalidRestitution { restitution: f32 },
    #[error("damping must be finite and >= 0, got {damping}")]
    InvalidDamping { damping: f32 },
    #[error("body size must be finite and non-negative, got {width}x{height}")]
    InvalidSize { width: f32, height: f32 },
    #[error("max velocity must be > 0, got {max_velocity}")]
    InvalidMaxVelocity { max_velocity: f32 },
    #[error("body {field} must be finite")]
    NonFinite { field: &'static str },
    #[error("body id {0:?} is already in use")]
    DuplicateId(BodyId),
}

/// Physics world configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Acceleration applied to bodies with `use_gravity` (units per second squared).
    pub gravity: Vec2,
    /// Region covered by the broad-phase quadtree.
    pub bounds: Rect,
    pub max_objects: usize,
    pub max_depth: usize,
    /// Positional correction factor, clamped to [0.01, 0.5] when used.
    pub correction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, 9.8),
            bounds: Rect::new(0.0, 0.0, 1280.0, 720.0),
            max_objects: DEFAULT_MAX_OBJECTS,
            max_depth: DEFAULT_MAX_DEPTH,
            correction: DEFAULT_CORRECTION,
        }
    }
}

impl PhysicsConfig {
    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    #[must_use]
    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    #[must_use]
    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    #[must_use]
    pub fn with_correction(mut self, correction: f32) -> Self {
        self.correction = correction;
        self
    }
}

/// Events raised by the physics world.
///
/// Records: `collision {bodyA, bodyB}`, `bodyAdded {body}`, `bodyRemoved {body}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PhysicsEvent {
    Collision {
        #[serde(rename = "bodyA")]
        body_a: BodyId,
        #[serde(rename = "bodyB")]
        body_b: BodyId,
    },
    BodyAdded {
        body: BodyId,
    },
    BodyRemoved {
        body: BodyId,
    },
}

impl NamedEvent for PhysicsEvent {
    fn name(&self) -> &'static str {
        match self {
            PhysicsEvent::Collision { .. } => "collision",
            PhysicsEvent::BodyAdded { .. } => "bodyAdded",
            PhysicsEvent::BodyRemoved { .. } => "bodyRemoved",
        }
    }
}

pub struct PhysicsWorld {
    config: PhysicsConfig,
    bodies: BTreeMap<BodyId, RigidBody2D>,
    next_id: u32,

    // Rebuilt every step; never handed out.
    quadtree: QuadTree<BodyId>,
    candidates: Vec<BodyId>,
    resolved: HashSet<(BodyId, BodyId)>,

    events: EventBus<PhysicsEvent>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    pub fn with_config(config: PhysicsConfig) -> Self {
        let quadtree =
            QuadTree::with_depth_limit(config.bounds, config.max_objects, config.max_depth);
        Self {
            config,
            bodies: BTreeMap::new(),
            next_id: 1,
            quadtree,
            candidates: Vec::new(),
            resolved: HashSet::new(),
            events: EventBus::new(),
        }
    }

    pub fn with_gravity(gravity: Vec2) -> Self {
        Self::with_config(PhysicsConfig::default().with_gravity(gravity))
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    /// Remove every body, keeping configuration and subscriptions.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.quadtree.clear();
    }

    pub fn on_event<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&PhysicsEvent) -> anyhow::Result<()> + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn off_event(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Drain physics events collected since the last call.
    pub fn drain_events(&mut self) -> Vec<PhysicsEvent> {
        self.events.drain()
    }

    pub fn handler_errors(&self) -> crossbeam_channel::Receiver<HandlerError> {
        self.events.errors()
    }

    pub fn events_mut(&mut self) -> &mut EventBus<PhysicsEvent> {
        &mut self.events
    }

    /// Validate and register a body.
    pub fn add_body(&mut self, body: RigidBody2D) -> Result<BodyId, PhysicsError> {
        body.validate()?;
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.bodies.insert(id, body);
        log::debug!("physics: added body {id:?} (static: {})", body.is_static);
        self.events.publish(PhysicsEvent::BodyAdded { body: id });
        Ok(id)
    }

    /// Register a body under a known id, used when restoring a snapshot.
    pub(crate) fn insert_with_id(
        &mut self,
        id: BodyId,
        body: RigidBody2D,
    ) -> Result<(), PhysicsError> {
        body.validate()?;
        if self.bodies.contains_key(&id) {
            return Err(PhysicsError::DuplicateId(id));
        }
        self.bodies.insert(id, body);
        self.next_id = self.next_id.max(id.0 + 1);
        self.events.publish(PhysicsEvent::BodyAdded { body: id });
        Ok(())
    }

    /// Remove a body. Returns whether one existed.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        if self.bodies.remove(&id).is_some() {
            log::debug!("physics: removed body {id:?}");
            self.events.publish(PhysicsEvent::BodyRemoved { body: id });
            true
        } else {
            false
        }
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody2D> {
        self.bodies.get(&id)
    }

    /// Edit a body in place. The edit is rolled back if the result fails
    /// validation; a missing id yields `Ok(false)`.
    pub fn update_body<F>(&mut self, id: BodyId, edit: F) -> Result<bool, PhysicsError>
    where
        F: FnOnce(&mut RigidBody2D),
    {
        let Some(body) = self.bodies.get_mut(&id) else {
            return Ok(false);
        };
        let mut edited = *body;
        edit(&mut edited);
        edited.validate()?;
        if edited.is_static {
            edited.velocity = Vec2::ZERO;
        }
        *body = edited;
        Ok(true)
    }

    pub fn has_body(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    /// Bodies in ascending id order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &RigidBody2D)> {
        self.bodies.iter().map(|(id, body)| (*id, body))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn set_position(&mut self, id: BodyId, position: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            if position.is_finite() {
                body.position = position;
            }
        }
    }

    /// Static bodies keep a zero velocity.
    pub fn set_velocity(&mut self, id: BodyId, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            if !body.is_static && velocity.is_finite() {
                body.velocity = velocity;
            }
        }
    }

    /// Instantaneous velocity change scaled by the body's inverse mass.
    pub fn apply_impulse(&mut self, id: BodyId, impulse: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            if !body.is_static && impulse.is_finite() {
                body.velocity += impulse * body.inverse_mass();
            }
        }
    }

    /// Symmetric AABB overlap test.
    pub fn check_collision(a: &RigidBody2D, b: &RigidBody2D) -> bool {
        a.aabb().overlaps(&b.aabb())
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        if !dt.is_finite() || dt < 0.0 {
            log::warn!("physics: ignoring step with invalid dt {dt}");
            return;
        }

        self.rebuild_index();
        self.resolved.clear();

        let gravity = self.config.gravity;
        let correction = self.config.correction.clamp(MIN_CORRECTION, MAX_CORRECTION);
        let dynamic: Vec<BodyId> = self
            .bodies
            .iter()
            .filter(|(_, b)| !b.is_static)
            .map(|(id, _)| *id)
            .collect();

        for id in dynamic {
            let Some(body) = self.bodies.get_mut(&id) else {
                continue;
            };

            if body.use_gravity {
                body.velocity += gravity * dt;
            }
            let velocity = body.velocity;
            body.position += velocity * dt;

            if body.collider {
                self.collide(id, correction);
            }

            if let Some(body) = self.bodies.get_mut(&id) {
                if body.damping > 0.0 {
                    body.velocity *= (1.0 - body.damping * dt).max(0.0);
                }
                if let Some(max) = body.max_velocity {
                    let speed = body.velocity.length();
                    if speed > max {
                        body.velocity *= max / speed;
                    }
                }
            }
        }
    }

    fn rebuild_index(&mut self) {
        self.quadtree.clear();
        for (id, body) in &self.bodies {
            if body.collider {
                self.quadtree.insert(body.aabb(), *id);
            }
        }
    }

    /// Test `id` against its broad-phase candidates and resolve each new overlapping pair.
    fn collide(&mut self, id: BodyId, correction: f32) {
        let Some(aabb) = self.bodies.get(&id).map(RigidBody2D::aabb) else {
            return;
        };

        self.candidates.clear();
        self.quadtree.retrieve_into(&aabb, &mut self.candidates);
        self.candidates.sort_unstable();
        self.candidates.dedup();

        for i in 0..self.candidates.len() {
            let other = self.candidates[i];
            if other == id {
                continue;
            }
            let pair = if id < other { (id, other) } else { (other, id) };
            if self.resolved.contains(&pair) {
                continue;
            }

            let (Some(mut a), Some(mut b)) =
                (self.bodies.get(&id).copied(), self.bodies.get(&other).copied())
            else {
                continue;
            };
            if !Self::check_collision(&a, &b) {
                continue;
            }

            self.resolved.insert(pair);
            if resolve_collision(&mut a, &mut b, correction) {
                self.bodies.insert(id, a);
                self.bodies.insert(other, b);
            }
            self.events.publish(PhysicsEvent::Collision {
                body_a: id,
                body_b: other,
            });
        }
    }
}

/// Impulse response plus positional correction for one overlapping pair.
///
/// The normal points from `b`'s centre to `a`'s. Returns `false` when nothing
/// changed: both bodies static, or already separating along the normal.
pub fn resolve_collision(a: &mut RigidBody2D, b: &mut RigidBody2D, correction: f32) -> bool {
    if a.is_static && b.is_static {
        return false;
    }

    let delta = a.center() - b.center();
    let normal = Vec2::from_angle(delta.angle());

    let va = if a.is_static { Vec2::ZERO } else { a.velocity };
    let vb = if b.is_static { Vec2::ZERO } else { b.velocity };
    let relative = (va - vb).dot(normal);
    if relative > 0.0 {
        return false;
    }

    let inv_a = a.inverse_mass();
    let inv_b = b.inverse_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 {
        return false;
    }

    let restitution = a.restitution.min(b.restitution);
    let magnitude = -(1.0 + restitution) * relative / inv_sum;
    let impulse = normal * magnitude;

    let factor = correction.clamp(MIN_CORRECTION, MAX_CORRECTION);
    if !a.is_static {
        a.velocity += impulse * inv_a;
        a.position += delta * (factor * inv_a / inv_sum);
    }
    if !b.is_static {
        b.velocity -= impulse * inv_b;
        b.position -= delta * (factor * inv_b / inv_sum);
    }
    true
}
