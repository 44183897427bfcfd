use worldstate_migrate::{shape, StepError};
use worldstate_tree::{Document, Value};

use crate::world::{for_each_entity, WorldContext};

/// v2: map objects gain a rotation, initially 0.
pub(crate) fn map_object_rotation(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    for_each_entity(&mut document, "maps", |map, path| {
        let objects_path = shape::join(path, "objects");
        let objects = shape::object_field_mut(map, "objects", path)?;
        let entities = shape::object_field_mut(objects, "entities", &objects_path)?;
        let base = shape::join(&objects_path, "entities");
        for (id, object) in entities.iter_mut() {
            shape::object_mut(object, &shape::join(&base, id))?
                .insert("rotation".into(), Value::from(0u64));
        }
        Ok(())
    })?;
    Ok(document)
}

/// v3: everything on a map except `id` and `objects` moves under `settings`.
pub(crate) fn map_settings(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    for_each_entity(&mut document, "maps", |map, path| {
        shape::field(map, "id", path)?;
        shape::field(map, "objects", path)?;

        let mut settings = std::mem::take(map);
        for key in ["id", "objects"] {
            if let Some(value) = settings.remove(key) {
                map.insert(key.to_string(), value);
            }
        }
        map.insert("settings".into(), Value::from(settings));
        Ok(())
    })?;
    Ok(document)
}
