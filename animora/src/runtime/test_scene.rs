//! In-memory scene graph used by the runtime tests.

use std::collections::{HashMap, HashSet};

use crate::runtime::property::PropertyAccess;
use crate::{Attribute, Error, ObjectId, PropertyType};

pub(crate) const ROOT: ObjectId = ObjectId(0);

/// Routes `log` output through the test harness; run with `RUST_LOG=animora=debug` to see it.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug)]
struct SceneObject {
    name: String,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    alive: bool,
    values: HashMap<(String, Attribute), f32>,
}

#[derive(Debug)]
pub(crate) struct TestScene {
    objects: HashMap<ObjectId, SceneObject>,
    next_id: u64,
    wrong_type: HashSet<(ObjectId, String)>,
    failing_writes: HashSet<(ObjectId, String)>,
    pub(crate) writes: Vec<(ObjectId, String, Attribute, f32)>,
}

impl TestScene {
    pub(crate) fn new() -> Self {
        let mut objects = HashMap::new();
        objects.insert(
            ROOT,
            SceneObject {
                name: "root".to_string(),
                parent: None,
                children: Vec::new(),
                alive: true,
                values: HashMap::new(),
            },
        );
        Self {
            objects,
            next_id: 1,
            wrong_type: HashSet::new(),
            failing_writes: HashSet::new(),
            writes: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, parent: ObjectId, name: &str) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(
            id,
            SceneObject {
                name: name.to_string(),
                parent: Some(parent),
                children: Vec::new(),
                alive: true,
                values: HashMap::new(),
            },
        );
        self.objects
            .get_mut(&parent)
            .expect("parent exists")
            .children
            .push(id);
        id
    }

    pub(crate) fn set(&mut self, object: ObjectId, property: &str, value: f32) {
        self.set_attr(object, property, Attribute::Value, value);
    }

    pub(crate) fn set_attr(
        &mut self,
        object: ObjectId,
        property: &str,
        attribute: Attribute,
        value: f32,
    ) {
        self.objects
            .get_mut(&object)
            .expect("object exists")
            .values
            .insert((property.to_string(), attribute), value);
    }

    pub(crate) fn get(&self, object: ObjectId, property: &str) -> f32 {
        self.get_attr(object, property, Attribute::Value)
    }

    pub(crate) fn get_attr(&self, object: ObjectId, property: &str, attribute: Attribute) -> f32 {
        *self
            .objects
            .get(&object)
            .and_then(|o| o.values.get(&(property.to_string(), attribute)))
            .unwrap_or_else(|| panic!("missing {property} on {object:?}"))
    }

    /// Marks the object and its subtree as removed.
    pub(crate) fn remove(&mut self, object: ObjectId) {
        let children = match self.objects.get_mut(&object) {
            Some(o) => {
                o.alive = false;
                o.children.clone()
            }
            None => return,
        };
        for child in children {
            self.remove(child);
        }
    }

    pub(crate) fn set_wrong_type(&mut self, object: ObjectId, property: &str) {
        self.wrong_type.insert((object, property.to_string()));
    }

    pub(crate) fn fail_writes(&mut self, object: ObjectId, property: &str) {
        self.failing_writes.insert((object, property.to_string()));
    }

    pub(crate) fn write_count(&self, object: ObjectId, property: &str) -> usize {
        self.writes
            .iter()
            .filter(|(o, p, _, _)| *o == object && p == property)
            .count()
    }

    fn alive(&self, object: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&object).filter(|o| o.alive)
    }
}

impl PropertyAccess for TestScene {
    fn resolve(&self, context: Option<ObjectId>, path: &str) -> Option<ObjectId> {
        let mut current = context.unwrap_or(ROOT);
        self.alive(current)?;
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            let object = self.alive(current)?;
            current = if segment == ".." {
                object.parent?
            } else {
                object
                    .children
                    .iter()
                    .copied()
                    .find(|c| self.alive(*c).is_some_and(|o| o.name == segment))?
            };
        }
        self.alive(current).map(|_| current)
    }

    fn read(
        &self,
        object: ObjectId,
        property: &PropertyType,
        attribute: Attribute,
    ) -> Result<f32, Error> {
        if self
            .wrong_type
            .contains(&(object, property.as_str().to_string()))
        {
            return Err(Error::WrongDataType {
                property: property.clone(),
                attribute,
            });
        }
        self.alive(object)
            .and_then(|o| o.values.get(&(property.as_str().to_string(), attribute)))
            .copied()
            .ok_or_else(|| Error::PropertyNotFound {
                property: property.clone(),
            })
    }

    fn write(
        &mut self,
        object: ObjectId,
        property: &PropertyType,
        attribute: Attribute,
        value: f32,
    ) -> Result<(), Error> {
        let name = property.as_str().to_string();
        if self.wrong_type.contains(&(object, name.clone()))
            || self.failing_writes.contains(&(object, name.clone()))
        {
            return Err(Error::WrongDataType {
                property: property.clone(),
                attribute,
            });
        }
        let Some(slot) = self
            .objects
            .get_mut(&object)
            .filter(|o| o.alive)
            .and_then(|o| o.values.get_mut(&(name.clone(), attribute)))
        else {
            return Err(Error::PropertyNotFound {
                property: property.clone(),
            });
        };
        *slot = value;
        self.writes.push((object, name, attribute, value));
        Ok(())
    }

    fn is_alive(&self, object: ObjectId) -> bool {
        self.alive(object).is_some()
    }

    fn is_within(&self, object: ObjectId, root: ObjectId) -> bool {
        let mut current = Some(object);
        while let Some(id) = current {
            if id == root {
                return true;
            }
            current = self.objects.get(&id).and_then(|o| o.parent);
        }
        false
    }
}
