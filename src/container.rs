//! Decoded Containers and Extracted Objects
//!
//! A bundle decodes into a [`BundleContainer`]. Providers read from it to
//! extract a single object, a collection of sub-objects or a scene. The
//! container is owned by its loader; providers only ever see `&dyn BundleContainer`.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type-erased, shareable object extracted from a container.
pub type AssetObject = Arc<dyn Any + Send + Sync>;

/// A decoded bundle owned by its loader.
pub type BoxedContainer = Box<dyn BundleContainer>;

/// The runtime type a caller asked a provider for.
#[derive(Clone, Copy)]
pub struct AssetType {
    id: TypeId,
    name: &'static str,
}

impl AssetType {
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether `object` is an instance of this type.
    #[inline]
    pub fn matches(&self, object: &AssetObject) -> bool {
        (**object).type_id() == self.id
    }
}

impl PartialEq for AssetType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AssetType {}

impl std::hash::Hash for AssetType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A loaded scene, opaque to this crate.
#[derive(Clone)]
pub struct SceneObject {
    name: String,
    root: AssetObject,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, root: AssetObject) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn root(&self) -> &AssetObject {
        &self.root
    }
}

impl fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObject").field("name", &self.name).finish()
    }
}

/// An in-flight operation of an external subsystem (decode or extraction).
pub trait AsyncRequest<T>: Send {
    /// Polls the operation without blocking.
    fn is_done(&self) -> bool;

    fn progress(&self) -> f32 {
        if self.is_done() { 1.0 } else { 0.0 }
    }

    /// Blocks the calling thread until [`AsyncRequest::is_done`] holds.
    fn wait(&mut self);

    /// Takes the result. `None` means the operation produced nothing.
    fn take_result(&mut self) -> Option<T>;
}

/// A request that is complete from the start.
pub struct ReadyRequest<T> {
    result: Option<T>,
}

impl<T> ReadyRequest<T> {
    pub fn new(result: Option<T>) -> Self {
        Self { result }
    }
}

impl<T: Send> AsyncRequest<T> for ReadyRequest<T> {
    fn is_done(&self) -> bool {
        true
    }

    fn wait(&mut self) {}

    fn take_result(&mut self) -> Option<T> {
        self.result.take()
    }
}

/// The decoded, read-only content of a bundle.
///
/// Only `load_asset` is required; the async and collection variants fall back
/// to it. Implementations backed by a real decoder override the async methods
/// to return genuinely pending requests.
pub trait BundleContainer: Send + Sync {
    fn load_asset(&self, name: &str, asset_type: &AssetType) -> Option<AssetObject>;

    fn load_asset_async(
        &self,
        name: &str,
        asset_type: &AssetType,
    ) -> Box<dyn AsyncRequest<AssetObject>> {
        Box::new(ReadyRequest::new(self.load_asset(name, asset_type)))
    }

    /// All objects stored under `name`. Empty when nothing matches.
    fn load_sub_assets(&self, name: &str, asset_type: &AssetType) -> Vec<AssetObject> {
        self.load_asset(name, asset_type).into_iter().collect()
    }

    fn load_sub_assets_async(
        &self,
        name: &str,
        asset_type: &AssetType,
    ) -> Box<dyn AsyncRequest<Vec<AssetObject>>> {
        Box::new(ReadyRequest::new(Some(self.load_sub_assets(name, asset_type))))
    }

    fn load_scene(&self, _name: &str) -> Option<SceneObject> {
        None
    }

    fn load_scene_async(&self, name: &str) -> Box<dyn AsyncRequest<SceneObject>> {
        Box::new(ReadyRequest::new(self.load_scene(name)))
    }

    /// Releases the decoded data. Called exactly once, when the owning loader
    /// is destroyed.
    fn unload(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Single(AssetObject);

    impl BundleContainer for Single {
        fn load_asset(&self, name: &str, asset_type: &AssetType) -> Option<AssetObject> {
            (name == "only" && asset_type.matches(&self.0)).then(|| Arc::clone(&self.0))
        }
    }

    #[test]
    fn test_asset_type_matches_erased_object() {
        let object: AssetObject = Arc::new(7_u32);
        assert!(AssetType::of::<u32>().matches(&object));
        assert!(!AssetType::of::<String>().matches(&object));
    }

    #[test]
    fn test_default_async_variants_are_ready() {
        let container = Single(Arc::new(String::from("x")));
        let ty = AssetType::of::<String>();

        let mut request = container.load_asset_async("only", &ty);
        assert!(request.is_done());
        assert!((request.progress() - 1.0).abs() < f32::EPSILON);
        assert!(request.take_result().is_some());
        assert!(request.take_result().is_none());

        let mut subs = container.load_sub_assets_async("only", &ty);
        assert_eq!(subs.take_result().map(|v| v.len()), Some(1));

        let mut scene = container.load_scene_async("only");
        assert!(scene.take_result().is_none());
    }
}
