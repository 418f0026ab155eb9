use animora::{
    AnimationItem, AnimationLibrary, AnimationPlayer, Attribute, Error, ObjectId, PropertyAccess,
    PropertyType,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;

/// Scene that creates objects and properties on first touch, so any asset can be played
/// without a host application.
#[derive(Default)]
struct FlatScene {
    paths: HashMap<String, ObjectId>,
    values: HashMap<(ObjectId, String, Attribute), f32>,
    writes: Vec<serde_json::Value>,
}

impl FlatScene {
    fn object(&mut self, path: &str) -> ObjectId {
        let next = ObjectId(self.paths.len() as u64);
        *self.paths.entry(path.to_string()).or_insert(next)
    }

    fn path_of(&self, object: ObjectId) -> &str {
        self.paths
            .iter()
            .find(|(_, id)| **id == object)
            .map(|(path, _)| path.as_str())
            .unwrap_or("<unknown>")
    }
}

impl PropertyAccess for FlatScene {
    fn resolve(&self, context: Option<ObjectId>, path: &str) -> Option<ObjectId> {
        let base = context.map(|c| self.path_of(c)).unwrap_or("");
        let full = if base.is_empty() {
            path.to_string()
        } else {
            format!("{base}/{path}")
        };
        self.paths.get(&full).copied()
    }

    fn read(
        &self,
        object: ObjectId,
        property: &PropertyType,
        attribute: Attribute,
    ) -> Result<f32, Error> {
        Ok(self
            .values
            .get(&(object, property.as_str().to_string(), attribute))
            .copied()
            .unwrap_or(0.0))
    }

    fn write(
        &mut self,
        object: ObjectId,
        property: &PropertyType,
        attribute: Attribute,
        value: f32,
    ) -> Result<(), Error> {
        self.values
            .insert((object, property.as_str().to_string(), attribute), value);
        let write = json!({
            "object": self.path_of(object),
            "property": property.as_str(),
            "attribute": format!("{attribute:?}"),
            "value": value,
        });
        self.writes.push(write);
        Ok(())
    }
}

fn load_library(path: &PathBuf) -> AnimationLibrary {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("anim") {
        #[cfg(feature = "binary")]
        {
            let bytes = std::fs::read(path).expect("read asset");
            return AnimationLibrary::from_bytes(&bytes).expect("parse binary asset");
        }
        #[cfg(not(feature = "binary"))]
        {
            panic!("Input is .anim but animora was built without feature `binary`.");
        }
    }

    let json = std::fs::read_to_string(path).expect("read json");
    AnimationLibrary::from_json_str(&json).expect("parse json")
}

fn find_item(library: &AnimationLibrary, name: &str) -> Option<AnimationItem> {
    library
        .find_sequence(name)
        .map(AnimationItem::from)
        .or_else(|| library.find_clip(name).map(AnimationItem::from))
        .or_else(|| library.find_animation(name).map(AnimationItem::from))
}

/// Registers every path an item can target under `root`: animation and clip paths, each of
/// them again below every sequence member path.
fn register_paths(library: &AnimationLibrary, scene: &mut FlatScene, root: &str) {
    let mut leaves = vec![String::new()];
    leaves.extend(library.animations().filter_map(|(_, a)| a.target_path.clone()));
    for (clip_id, clip) in library.clips() {
        for animation in clip.animations() {
            leaves.extend(library.clip_target_path(clip_id, *animation));
        }
    }
    let mut prefixes = vec![String::new()];
    for (_, sequence) in library.sequences() {
        prefixes.extend(sequence.entries().iter().filter_map(|e| e.target_path.clone()));
    }

    for prefix in &prefixes {
        for leaf in &leaves {
            let path = [root, prefix.as_str(), leaf.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("/");
            scene.object(&path);
        }
    }
}

fn main() {
    env_logger::init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some(asset_path) = args.first().map(PathBuf::from) else {
        eprintln!("usage: timeline_dump <asset.json|asset.anim> <item> [seconds] [fps]");
        std::process::exit(2);
    };
    let item_name = args.get(1).cloned().unwrap_or_default();
    let seconds: f32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1.0);
    let fps: f32 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(30.0);

    let library = load_library(&asset_path);
    let Some(item) = find_item(&library, &item_name) else {
        eprintln!("no animation, clip or sequence named {item_name:?}");
        std::process::exit(1);
    };

    let mut scene = FlatScene::default();
    register_paths(&library, &mut scene, "root");
    let root = scene.object("root");

    let mut player = AnimationPlayer::new(library);
    let handle = player
        .start(item, Some(root), &mut scene)
        .expect("start item");

    let dt = 1.0 / fps.max(1.0);
    let mut frames = Vec::new();
    let mut t = 0.0;
    while t < seconds && player.is_live(handle) {
        player.update(dt, &mut scene).expect("update");
        t += dt;
        frames.push(json!({
            "time": t,
            "writes": std::mem::take(&mut scene.writes),
        }));
    }
    player.finish_all(&mut scene);

    let out = json!({
        "item": item_name,
        "frames": frames,
        "restore": scene.writes,
    });
    println!("{}", serde_json::to_string_pretty(&out).expect("serialize"));
}
