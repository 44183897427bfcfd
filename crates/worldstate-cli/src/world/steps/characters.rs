use rand::Rng;
use worldstate_migrate::{shape, StepError};
use worldstate_tree::{Document, Map, Value};

use crate::world::{for_each_entity, WorldContext, CHARACTER_COLLECTIONS};

/// Token border colors handed out to characters that predate the setting.
const TOKEN_BORDER_COLORS: [&str; 40] = [
    "#c49fa6", "#a74d63", "#dd385d", "#df7f81", "#b03f36", "#e14427", "#7e5f56", "#e77e5e",
    "#9f5c3c", "#ce7225", "#d9ae7f", "#d9a83c", "#836a2a", "#d6db33", "#8f9c38", "#cddb66",
    "#7c855b", "#bed994", "#78d747", "#c9d7c1", "#448235", "#64d784", "#5ca98e", "#457264",
    "#6be6c9", "#72c4d9", "#507691", "#5788cf", "#bbb8de", "#5661d8", "#8f7ad0", "#8e44de",
    "#765d87", "#9445ab", "#de96e3", "#d64cce", "#ba6ba5", "#a23372", "#e44598", "#e68eb1",
];

/// v0: `image` becomes `tokenImage`, and every character gets a border color.
pub(crate) fn token_border_color(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    let mut rng = rand::thread_rng();
    for collection in CHARACTER_COLLECTIONS {
        for_each_entity(&mut document, collection, |character, _| {
            if let Some(image) = character.remove("image") {
                character.insert("tokenImage".into(), image);
            }
            let color = TOKEN_BORDER_COLORS[rng.gen_range(0..TOKEN_BORDER_COLORS.len())];
            character.insert("tokenBorderColor".into(), Value::from(color));
            Ok(())
        })?;
    }
    Ok(document)
}

/// v1: fix the spelling of the `paralysed` condition.
pub(crate) fn paralyzed_typo(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    for collection in CHARACTER_COLLECTIONS {
        for_each_entity(&mut document, collection, |character, path| {
            for condition in conditions(character, path)? {
                if condition.as_str() == Some("paralysed") {
                    *condition = Value::from("paralyzed");
                }
            }
            Ok(())
        })?;
    }
    Ok(document)
}

/// v5: temporary hit points and max HP adjustments start at zero.
pub(crate) fn hit_points(mut document: Document, _: &WorldContext) -> Result<Document, StepError> {
    for collection in CHARACTER_COLLECTIONS {
        for_each_entity(&mut document, collection, |character, _| {
            character.insert("temporaryHP".into(), Value::from(0u64));
            character.insert("maxHPAdjustment".into(), Value::from(0u64));
            Ok(())
        })?;
    }
    Ok(document)
}

/// v9: cover is no longer tracked as a condition.
///
/// Only player characters ever had cover conditions; templates are left alone.
pub(crate) fn remove_cover_conditions(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    for_each_entity(&mut document, "characters", |character, path| {
        conditions(character, path)?
            .retain(|condition| !condition.as_str().is_some_and(|name| name.contains("cover")));
        Ok(())
    })?;
    Ok(document)
}

/// v11: an armor class of 0 meant "unknown"; store it as null.
pub(crate) fn armor_class_zero_to_null(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    for collection in CHARACTER_COLLECTIONS {
        for_each_entity(&mut document, collection, |character, _| {
            if let Some(ac) = character.get_mut("AC") {
                if ac.as_f64() == Some(0.0) {
                    *ac = Value::Null;
                }
            }
            Ok(())
        })?;
    }
    Ok(document)
}

/// v12: rebuild `characters.ids` from the entities, which had drifted apart.
pub(crate) fn character_id_list(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    let root = shape::object_mut(&mut document, "")?;
    let characters = shape::object_field_mut(root, "characters", "")?;
    let entities = shape::object(
        shape::field(characters, "entities", "characters")?,
        "characters.entities",
    )?;

    let ids = entities
        .iter()
        .map(|(key, character)| {
            let path = shape::join("characters.entities", key);
            shape::str_field(shape::object(character, &path)?, "id", &path).map(Value::from)
        })
        .collect::<Result<Vec<_>, StepError>>()?;

    characters.insert("ids".into(), Value::array(ids));
    Ok(document)
}

fn conditions<'a>(character: &'a mut Map, path: &str) -> Result<&'a mut Vec<Value>, StepError> {
    let field = shape::field_mut(character, "conditions", path)?;
    shape::array_mut(field, &shape::join(path, "conditions"))
}
