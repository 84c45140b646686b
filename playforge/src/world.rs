use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::animation::{Animatable, AnimationTargets, Property, Rgb, TrackValue};
use crate::math::Vec2;
use crate::physics::BodyId;

/// Unique identifier for an object in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Get the underlying integer ID (useful for debugging or serialization).
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// A scene object: transform, appearance, and an optional physics body.
///
/// Paths with no built-in field land in `custom`, so clips can drive
/// game-specific values without extending this type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameObject {
    pub name: String,
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    pub size: Vec2,
    pub opacity: f32,
    pub color: Rgb,
    pub visible: bool,
    pub custom: BTreeMap<String, TrackValue>,
    pub body: Option<BodyId>,
}

impl Default for GameObject {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            size: Vec2::ONE,
            opacity: 1.0,
            color: Rgb::WHITE,
            visible: true,
            custom: BTreeMap::new(),
            body: None,
        }
    }
}

impl GameObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_size(mut self, size: Vec2) -> Self {
        self.size = size;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn custom(&self, path: &str) -> Option<&TrackValue> {
        self.custom.get(path)
    }
}

fn as_flag(value: &TrackValue) -> Option<bool> {
    match value {
        TrackValue::Number(n) => Some(*n >= 0.5),
        TrackValue::Discrete(s) => s.parse().ok(),
        _ => None,
    }
}

impl Animatable for GameObject {
    fn apply(&mut self, property: &Property, value: &TrackValue) {
        let number = value.as_number();
        match property {
            Property::X => {
                if let Some(n) = number {
                    self.position.x = n;
                }
            }
            Property::Y => {
                if let Some(n) = number {
                    self.position.y = n;
                }
            }
            Property::Position => {
                if let Some(v) = value.as_vec2() {
                    self.position = v;
                }
            }
            Property::Rotation => {
                if let Some(n) = number {
                    self.rotation = n;
                }
            }
            Property::ScaleX => {
                if let Some(n) = number {
                    self.scale.x = n;
                }
            }
            Property::ScaleY => {
                if let Some(n) = number {
                    self.scale.y = n;
                }
            }
            // A single number scales uniformly.
            Property::Scale => {
                if let Some(v) = value.as_vec2() {
                    self.scale = v;
                } else if let Some(n) = number {
                    self.scale = Vec2::new(n, n);
                }
            }
            Property::Width => {
                if let Some(n) = number {
                    self.size.x = n;
                }
            }
            Property::Height => {
                if let Some(n) = number {
                    self.size.y = n;
                }
            }
            Property::Size => {
                if let Some(v) = value.as_vec2() {
                    self.size = v;
                }
            }
            Property::Opacity => {
                if let Some(n) = number {
                    self.opacity = n.clamp(0.0, 1.0);
                }
            }
            Property::Color => {
                if let Some(c) = value.as_color() {
                    self.color = c;
                }
            }
            Property::Visible => {
                if let Some(flag) = as_flag(value) {
                    self.visible = flag;
                }
            }
            Property::Custom(path) => {
                self.custom.insert(path.clone(), value.clone());
            }
        }
    }
}

/// Object store keyed by `EntityId`, iterated in id order.
pub struct World {
    next_id: u32,
    objects: BTreeMap<EntityId, GameObject>,
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            objects: BTreeMap::new(),
        }
    }

    /// Spawn an object and return its `EntityId`.
    pub fn spawn(&mut self, object: GameObject) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.objects.insert(id, object);
        id
    }

    /// Re-create an object under a known id, used when restoring a snapshot.
    pub(crate) fn insert_with_id(&mut self, id: EntityId, object: GameObject) -> bool {
        if self.objects.contains_key(&id) {
            return false;
        }
        self.objects.insert(id, object);
        self.next_id = self.next_id.max(id.0.wrapping_add(1)).max(1);
        true
    }

    /// Despawn an object, handing it back if it existed.
    pub fn despawn(&mut self, entity: EntityId) -> Option<GameObject> {
        self.objects.remove(&entity)
    }

    /// Check if an entity is currently alive.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.objects.contains_key(&entity)
    }

    pub fn get(&self, entity: EntityId) -> Option<&GameObject> {
        self.objects.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut GameObject> {
        self.objects.get_mut(&entity)
    }

    /// First object with the given name.
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.objects
            .iter()
            .find(|(_, obj)| obj.name == name)
            .map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &GameObject)> {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut GameObject)> {
        self.objects.iter_mut().map(|(id, obj)| (*id, obj))
    }

    /// Number of alive entities.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.next_id = 1;
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationTargets for World {
    fn animatable_mut(&mut self, target: EntityId) -> Option<&mut dyn Animatable> {
        self.objects
            .get_mut(&target)
            .map(|obj| obj as &mut dyn Animatable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_not_reused_after_despawn() {
        let mut world = World::new();
        let a = world.spawn(GameObject::new("a"));
        assert!(world.despawn(a).is_some());
        let b = world.spawn(GameObject::new("b"));
        assert_ne!(a, b);
        assert!(!world.is_alive(a));
        assert_eq!(world.find("b"), Some(b));
    }

    #[test]
    fn applies_known_properties() {
        let mut obj = GameObject::new("hero");
        obj.apply(&Property::X, &TrackValue::Number(4.0));
        obj.apply(&Property::Position, &TrackValue::from([1.0, 2.0]));
        obj.apply(&Property::Scale, &TrackValue::Number(2.0));
        obj.apply(&Property::Opacity, &TrackValue::Number(1.3));
        obj.apply(&Property::Color, &TrackValue::from("#102030"));
        obj.apply(&Property::Visible, &TrackValue::from(false));

        assert_eq!(obj.position, Vec2::new(1.0, 2.0));
        assert_eq!(obj.scale, Vec2::new(2.0, 2.0));
        assert_eq!(obj.opacity, 1.0);
        assert_eq!(obj.color, Rgb::new(0x10, 0x20, 0x30));
        assert!(!obj.visible);
    }

    #[test]
    fn mismatched_kinds_are_ignored() {
        let mut obj = GameObject::new("hero").with_position(Vec2::new(3.0, 3.0));
        obj.apply(&Property::X, &TrackValue::from("#ffffff"));
        obj.apply(&Property::Color, &TrackValue::Number(1.0));
        assert_eq!(obj.position.x, 3.0);
        assert_eq!(obj.color, Rgb::WHITE);
    }

    #[test]
    fn unknown_paths_go_to_custom() {
        let mut obj = GameObject::new("hero");
        obj.apply(&Property::parse("shadow.blur"), &TrackValue::Number(0.25));
        assert_eq!(obj.custom("shadow.blur"), Some(&TrackValue::Number(0.25)));
    }

    #[test]
    fn world_resolves_animation_targets() {
        let mut world = World::new();
        let id = world.spawn(GameObject::new("box"));
        world
            .animatable_mut(id)
            .unwrap()
            .apply(&Property::Rotation, &TrackValue::Number(1.5));
        assert_eq!(world.get(id).unwrap().rotation, 1.5);

        world.despawn(id);
        assert!(world.animatable_mut(id).is_none());
    }
}
