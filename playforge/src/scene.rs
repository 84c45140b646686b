//! Scene host for playforge.
//!
//! A [`Scene`] owns the object world, the physics world and the animation
//! runtime, runs them in a fixed order every frame, and saves/loads the
//! simulation state as JSON.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::animation::{AnimationClip, AnimationRuntime, ClipDef, InstanceId, PlayOptions};
use crate::math::Vec2;
use crate::physics::{BodyId, PhysicsConfig, PhysicsWorld, RigidBody2D};
use crate::world::{EntityId, GameObject, World};

/// Current snapshot format version.
pub const SCENE_VERSION: u32 = 1;

/// Serializable representation of a physics body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializableBody {
    pub id: BodyId,
    #[serde(flatten)]
    pub body: RigidBody2D,
}

/// Serializable representation of physics world state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializablePhysics {
    pub gravity: Vec2,
    pub bodies: Vec<SerializableBody>,
}

/// Serializable object with its id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializableObject {
    pub id: EntityId,
    #[serde(flatten)]
    pub object: GameObject,
}

/// Complete scene state that can be serialized.
///
/// Running animation instances are not part of a snapshot; clips are.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Scene version for migration support.
    pub version: u32,
    pub objects: Vec<SerializableObject>,
    pub physics: SerializablePhysics,
    #[serde(default)]
    pub animations: Vec<ClipDef>,
}

impl SceneSnapshot {
    /// Serialize this snapshot to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version > SCENE_VERSION {
            bail!(
                "scene version {} is newer than supported version {SCENE_VERSION}",
                snapshot.version
            );
        }
        Ok(snapshot)
    }

    /// Save this snapshot to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write scene to {}", path.display()))?;
        Ok(())
    }

    /// Load a snapshot from a file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene from {}", path.display()))?;
        Self::from_json(&json)
    }
}

impl PhysicsWorld {
    /// Extract serializable physics state from the physics world.
    pub fn extract_serializable(&self) -> SerializablePhysics {
        SerializablePhysics {
            gravity: self.gravity(),
            bodies: self
                .bodies()
                .map(|(id, body)| SerializableBody { id, body: *body })
                .collect(),
        }
    }

    /// Replace every body with the serialized ones, keeping their ids.
    ///
    /// All bodies are validated before anything is removed, so a bad snapshot
    /// leaves the world untouched.
    pub fn restore_from_serializable(&mut self, data: &SerializablePhysics) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &data.bodies {
            entry
                .body
                .validate()
                .with_context(|| format!("invalid body {:?} in scene", entry.id))?;
            if !seen.insert(entry.id) {
                bail!("body id {:?} appears twice in scene", entry.id);
            }
        }
        if !data.gravity.is_finite() {
            bail!("scene gravity must be finite");
        }

        let existing: Vec<BodyId> = self.bodies().map(|(id, _)| id).collect();
        for id in existing {
            self.remove_body(id);
        }
        self.set_gravity(data.gravity);
        for entry in &data.bodies {
            self.insert_with_id(entry.id, entry.body)?;
        }
        Ok(())
    }
}

/// Scene configuration, readable from JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub physics: PhysicsConfig,
    /// Queue physics and animation events for `drain_events`. Off by default:
    /// a scene that nobody drains would otherwise grow every frame.
    pub retain_events: bool,
}

impl SceneConfig {
    #[must_use]
    pub fn with_physics(mut self, physics: PhysicsConfig) -> Self {
        self.physics = physics;
        self
    }

    #[must_use]
    pub fn with_retained_events(mut self, retain: bool) -> Self {
        self.retain_events = retain;
        self
    }
}

/// Structural change requested while a frame is running, applied at the end
/// of [`Scene::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneAction {
    /// Remove a body and unlink it from its object.
    RemoveBody(BodyId),
    Despawn(EntityId),
    StopAnimation(InstanceId),
    PauseAnimation(InstanceId),
    ResumeAnimation(InstanceId),
}

pub struct Scene {
    world: World,
    physics: PhysicsWorld,
    animation: AnimationRuntime,
    action_tx: Sender<SceneAction>,
    action_rx: Receiver<SceneAction>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneConfig::default())
    }
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        let (action_tx, action_rx) = crossbeam_channel::unbounded();
        let mut physics = PhysicsWorld::with_config(config.physics);
        physics.events_mut().set_retain(config.retain_events);
        let mut animation = AnimationRuntime::new();
        animation.events_mut().set_retain(config.retain_events);
        Self {
            world: World::new(),
            physics,
            animation,
            action_tx,
            action_rx,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    pub fn animation(&self) -> &AnimationRuntime {
        &self.animation
    }

    pub fn animation_mut(&mut self) -> &mut AnimationRuntime {
        &mut self.animation
    }

    /// Sender for deferred actions; safe to move into event handlers.
    pub fn actions(&self) -> Sender<SceneAction> {
        self.action_tx.clone()
    }

    /// Add an object. Any body link it carries is dropped; use [`Scene::attach_body`].
    pub fn spawn(&mut self, mut object: GameObject) -> EntityId {
        object.body = None;
        self.world.spawn(object)
    }

    /// Remove an object together with its body and animations.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        let Some(object) = self.world.despawn(entity) else {
            return false;
        };
        if let Some(body) = object.body {
            self.physics.remove_body(body);
        }
        self.animation.stop_target(entity);
        true
    }

    /// Give an object a physics body, replacing any it had. The object moves
    /// to the body's position.
    pub fn attach_body(&mut self, entity: EntityId, body: RigidBody2D) -> Result<BodyId> {
        if !self.world.is_alive(entity) {
            return Err(anyhow!("no entity {entity:?} to attach a body to"));
        }
        let id = self.physics.add_body(body)?;
        let object = self
            .world
            .get_mut(entity)
            .ok_or_else(|| anyhow!("entity {entity:?} vanished while attaching a body"))?;
        let previous = object.body.replace(id);
        object.position = body.position;
        if let Some(previous) = previous {
            self.physics.remove_body(previous);
        }
        Ok(id)
    }

    pub fn detach_body(&mut self, entity: EntityId) -> bool {
        match self.world.get_mut(entity).and_then(|obj| obj.body.take()) {
            Some(body) => {
                self.physics.remove_body(body);
                true
            }
            None => false,
        }
    }

    pub fn body_of(&self, entity: EntityId) -> Option<BodyId> {
        self.world.get(entity)?.body
    }

    pub fn entity_of(&self, body: BodyId) -> Option<EntityId> {
        self.world
            .iter()
            .find(|(_, obj)| obj.body == Some(body))
            .map(|(id, _)| id)
    }

    /// Register a clip with the scene's runtime.
    pub fn create_animation(&mut self, clip: AnimationClip) {
        self.animation.create_animation(clip);
    }

    /// Play a clip on an object. Missing objects or clips yield `None`.
    pub fn play(
        &mut self,
        entity: EntityId,
        clip: &str,
        options: PlayOptions,
    ) -> Option<InstanceId> {
        if !self.world.is_alive(entity) {
            log::warn!("scene: cannot play `{clip}` on missing entity {entity:?}");
            return None;
        }
        self.animation.play(entity, clip, options)
    }

    /// Run one frame: physics, body sync, animation, then deferred actions.
    ///
    /// Objects with a body take their position from physics.
    pub fn update(&mut self, dt: f32) {
        self.physics.step(dt);
        self.sync_bodies();
        self.animation.advance(dt, &mut self.world);
        self.apply_actions();
    }

    fn sync_bodies(&mut self) {
        for (id, object) in self.world.iter_mut() {
            let Some(body) = object.body else {
                continue;
            };
            match self.physics.body(body) {
                Some(state) => object.position = state.position,
                None => {
                    log::debug!("scene: body {body:?} of {id:?} is gone, unlinking");
                    object.body = None;
                }
            }
        }
    }

    /// Apply every queued [`SceneAction`]. Called by [`Scene::update`].
    pub fn apply_actions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(action) = self.action_rx.try_recv() {
            log::debug!("scene: applying {action:?}");
            match action {
                SceneAction::RemoveBody(body) => {
                    if let Some(entity) = self.entity_of(body) {
                        self.detach_body(entity);
                    } else {
                        self.physics.remove_body(body);
                    }
                }
                SceneAction::Despawn(entity) => {
                    self.despawn(entity);
                }
                SceneAction::StopAnimation(id) => {
                    self.animation.stop(id);
                }
                SceneAction::PauseAnimation(id) => {
                    self.animation.pause(id);
                }
                SceneAction::ResumeAnimation(id) => {
                    self.animation.resume(id);
                }
            }
            applied += 1;
        }
        applied
    }

    /// Capture objects, bodies and clips.
    pub fn snapshot(&self) -> SceneSnapshot {
        let mut animations: Vec<ClipDef> = self
            .animation
            .animation_names()
            .filter_map(|name| self.animation.animation(name))
            .map(|clip| clip.to_def())
            .collect();
        animations.sort_by(|a, b| a.name.cmp(&b.name));

        SceneSnapshot {
            version: SCENE_VERSION,
            objects: self
                .world
                .iter()
                .map(|(id, object)| SerializableObject {
                    id,
                    object: object.clone(),
                })
                .collect(),
            physics: self.physics.extract_serializable(),
            animations,
        }
    }

    /// Replace the scene state with a snapshot. Running animations are stopped.
    ///
    /// The snapshot is checked up front; on error the scene is unchanged.
    pub fn restore(&mut self, snapshot: &SceneSnapshot) -> Result<()> {
        let clips = snapshot
            .animations
            .iter()
            .cloned()
            .map(|def| {
                let name = def.name.clone();
                AnimationClip::try_from(def).with_context(|| format!("invalid clip `{name}`"))
            })
            .collect::<Result<Vec<_>>>()?;

        let body_ids: HashSet<BodyId> = snapshot.physics.bodies.iter().map(|b| b.id).collect();
        let mut linked = HashSet::new();
        let mut world = World::new();
        for entry in &snapshot.objects {
            let mut object = entry.object.clone();
            if let Some(body) = object.body {
                if !body_ids.contains(&body) {
                    log::warn!("scene: object {:?} links missing body {body:?}", entry.id);
                    object.body = None;
                } else if !linked.insert(body) {
                    bail!("body {body:?} is linked by more than one object");
                }
            }
            if !world.insert_with_id(entry.id, object) {
                bail!("entity id {:?} appears twice in scene", entry.id);
            }
        }

        self.physics.restore_from_serializable(&snapshot.physics)?;
        self.world = world;
        self.animation.clear();
        for clip in clips {
            self.animation.create_animation(clip);
        }
        // Anything queued against the old state no longer applies.
        while self.action_rx.try_recv().is_ok() {}
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        self.snapshot().to_json()
    }

    pub fn load_json(&mut self, json: &str) -> Result<()> {
        self.restore(&SceneSnapshot::from_json(json)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.snapshot().save_to_file(path)
    }

    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        self.restore(&SceneSnapshot::load_from_file(path)?)
    }
}
