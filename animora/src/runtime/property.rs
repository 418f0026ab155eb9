use crate::{Attribute, Error, ObjectId, PropertyType};

/// Scene-graph access consumed by the player.
///
/// The engine owns no object storage of its own: targets are resolved, read and written through
/// this trait. `read`/`write` report [`Error::PropertyNotFound`] or [`Error::WrongDataType`];
/// the player treats both as per-sample failures.
pub trait PropertyAccess {
    /// Resolves `path` relative to `context`, or from the scene root when `context` is `None`.
    fn resolve(&self, context: Option<ObjectId>, path: &str) -> Option<ObjectId>;

    fn read(
        &self,
        object: ObjectId,
        property: &PropertyType,
        attribute: Attribute,
    ) -> Result<f32, Error>;

    fn write(
        &mut self,
        object: ObjectId,
        property: &PropertyType,
        attribute: Attribute,
        value: f32,
    ) -> Result<(), Error>;

    /// `false` once the object has been removed from the scene.
    fn is_alive(&self, _object: ObjectId) -> bool {
        true
    }

    /// Whether `object` lives in the subtree rooted at `root`.
    fn is_within(&self, _object: ObjectId, _root: ObjectId) -> bool {
        true
    }
}
