//! The worldstate document and its migration history.
//!
//! Every change to the shape of the persisted document is a step in
//! [`registry`]. Steps are numbered contiguously from 0; the newest one
//! must carry [`LAST_MIGRATION_VERSION`].

use std::path::PathBuf;
use std::sync::Arc;

use worldstate_migrate::{
    shape, FnStep, IoLimiter, MigrationRegistry, MigrationStep, RegistryError, StepError,
};
use worldstate_tree::{Document, Map, Value};

mod probe;
mod steps;

pub use probe::{FfprobeProbe, MediaProbe};

/// Version of the newest migration. Bump it together with every new step.
pub const LAST_MIGRATION_VERSION: u32 = 12;

/// First step that probes local media files.
pub const ASSET_DURATION_VERSION: u32 = 7;

/// Collections holding per-character data.
const CHARACTER_COLLECTIONS: [&str; 2] = ["characters", "characterTemplates"];

/// What migration steps may use besides the document.
pub struct WorldContext {
    /// Root directory of uploaded files; local assets are relative to it.
    pub files_root: PathBuf,
    /// Shared bound on concurrent heavy I/O.
    pub limiter: IoLimiter,
    /// Measures audio files.
    pub probe: Arc<dyn MediaProbe>,
}

impl WorldContext {
    pub fn new(
        files_root: impl Into<PathBuf>,
        limiter: IoLimiter,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            files_root: files_root.into(),
            limiter,
            probe,
        }
    }
}

/// All migrations of the worldstate document, validated.
pub fn registry() -> Result<MigrationRegistry<WorldContext>, RegistryError> {
    let steps: Vec<Box<dyn MigrationStep<WorldContext>>> = vec![
        Box::new(FnStep::new(0, "token_border_color", steps::token_border_color)),
        Box::new(FnStep::new(1, "paralyzed_typo", steps::paralyzed_typo)),
        Box::new(FnStep::new(2, "map_object_rotation", steps::map_object_rotation)),
        Box::new(FnStep::new(3, "map_settings", steps::map_settings)),
        Box::new(FnStep::new(4, "ephemeral_reset", steps::ephemeral_reset)),
        Box::new(FnStep::new(5, "hit_points", steps::hit_points)),
        Box::new(FnStep::new(6, "log_roll_names", steps::log_roll_names)),
        Box::new(steps::AssetDuration),
        Box::new(FnStep::new(8, "playlist_entry_type", steps::playlist_entry_type)),
        Box::new(FnStep::new(9, "remove_cover_conditions", steps::remove_cover_conditions)),
        Box::new(FnStep::new(10, "hero_points", steps::hero_points)),
        Box::new(FnStep::new(11, "armor_class_zero_to_null", steps::armor_class_zero_to_null)),
        Box::new(FnStep::new(12, "character_id_list", steps::character_id_list)),
    ];
    MigrationRegistry::build(steps, LAST_MIGRATION_VERSION)
}

/// `{ ids: [], entities: {} }`
pub fn empty_collection() -> Value {
    let mut collection = Map::new();
    collection.insert("ids".into(), Value::array(Vec::new()));
    collection.insert("entities".into(), Value::empty_object());
    Value::from(collection)
}

/// Clear who is connected and what is playing.
///
/// This state only makes sense while a session is running, so it is dropped
/// whenever the document is loaded.
pub fn reset_ephemeral(document: &mut Document) -> Result<(), StepError> {
    let root = shape::object_mut(document, "")?;
    let mut ephemeral = Map::new();
    ephemeral.insert("players".into(), empty_collection());
    ephemeral.insert("activeSongs".into(), empty_collection());
    root.insert("ephemeral".into(), Value::from(ephemeral));
    Ok(())
}

/// Run `f` on every entity of `collection`, passing the entity's dot path.
fn for_each_entity<F>(document: &mut Document, collection: &str, mut f: F) -> Result<(), StepError>
where
    F: FnMut(&mut Map, &str) -> Result<(), StepError>,
{
    let root = shape::object_mut(document, "")?;
    let entities = shape::object_field_mut(
        shape::object_field_mut(root, collection, "")?,
        "entities",
        collection,
    )?;
    let base = shape::join(collection, "entities");
    for (id, entity) in entities.iter_mut() {
        let path = shape::join(&base, id);
        f(shape::object_mut(entity, &path)?, &path)?;
    }
    Ok(())
}
