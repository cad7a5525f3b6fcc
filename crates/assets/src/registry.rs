use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::AssetError;
use crate::environment::EnvironmentAsset;
use crate::id::AssetId;
use crate::model::ModelAsset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Model,
    Environment,
}

/// What the registry remembers about a decoded asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: AssetId,
    pub kind: AssetKind,
    pub name: String,
    pub primitives: usize,
    pub triangles: usize,
    pub textures: usize,
    pub width: u32,
    pub height: u32,
}

impl AssetSummary {
    pub fn of_model(model: &ModelAsset) -> Self {
        Self {
            id: model.id,
            kind: AssetKind::Model,
            name: model.name.clone(),
            primitives: model.primitives.len(),
            triangles: model.triangle_count(),
            textures: model.textures.len(),
            width: 0,
            height: 0,
        }
    }

    pub fn of_environment(env: &EnvironmentAsset) -> Self {
        Self {
            id: env.id,
            kind: AssetKind::Environment,
            name: env.name.clone(),
            primitives: 0,
            triangles: 0,
            textures: 1,
            width: env.image.width,
            height: env.image.height,
        }
    }
}

/// Content-addressed record of every asset integrated into a viewer.
///
/// Loading the same file twice yields one entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetRegistry {
    assets: BTreeMap<AssetId, AssetSummary>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a summary. Returns false if the id was already known.
    pub fn register(&mut self, summary: AssetSummary) -> bool {
        let id = summary.id;
        let fresh = self.assets.insert(id, summary).is_none();
        if !fresh {
            tracing::debug!(%id, "asset already registered");
        }
        fresh
    }

    pub fn get(&self, id: AssetId) -> Option<&AssetSummary> {
        self.assets.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetSummary> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Write the registry as pretty JSON, for inspection.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let file = std::fs::File::open(path)?;
        let registry = serde_json::from_reader(file)?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_scene::ImageData;

    fn environment(id: u64) -> EnvironmentAsset {
        EnvironmentAsset {
            id: AssetId(id),
            name: format!("env{id}.hdr"),
            image: ImageData::rgba32f(2, 1, vec![0.0; 8]).unwrap(),
        }
    }

    #[test]
    fn duplicate_content_is_one_entry() {
        let mut registry = AssetRegistry::new();
        assert!(registry.register(AssetSummary::of_environment(&environment(7))));
        assert!(!registry.register(AssetSummary::of_environment(&environment(7))));
        assert_eq!(registry.len(), 1);
        let entry = registry.get(AssetId(7)).unwrap();
        assert_eq!(entry.kind, AssetKind::Environment);
        assert_eq!((entry.width, entry.height), (2, 1));
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut registry = AssetRegistry::new();
        registry.register(AssetSummary::of_environment(&environment(1)));
        registry.register(AssetSummary::of_environment(&environment(2)));
        registry.save(tmp.path()).unwrap();

        let loaded = AssetRegistry::load(tmp.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(AssetId(2)), registry.get(AssetId(2)));
    }
}
