use worldstate_migrate::{shape, StepError};
use worldstate_tree::{Document, Value};

use crate::world::{for_each_entity, reset_ephemeral, WorldContext};

/// v4: drop the misspelled `ephermal` key and start with empty ephemeral state.
pub(crate) fn ephemeral_reset(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    shape::object_mut(&mut document, "")?.remove("ephermal");
    reset_ephemeral(&mut document)?;
    Ok(document)
}

/// v6: dice roll log entries carry a roll name; only initiative rolls had one.
pub(crate) fn log_roll_names(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    for_each_entity(&mut document, "logEntries", |entry, path| {
        if entry.get("type").and_then(Value::as_str) != Some("diceRoll") {
            return Ok(());
        }
        let payload = shape::object_field_mut(entry, "payload", path)?;
        let name = match payload.get("rollType").and_then(Value::as_str) {
            Some("initiative") => Value::from("Initiative"),
            _ => Value::Null,
        };
        payload.insert("rollName".into(), name);
        Ok(())
    })?;
    Ok(document)
}

/// v10: players without a hero point flag get `false`.
pub(crate) fn hero_points(mut document: Document, _: &WorldContext) -> Result<Document, StepError> {
    for_each_entity(&mut document, "players", |player, _| {
        let flag = player
            .entry("hasHeroPoint".to_string())
            .or_insert(Value::Null);
        if flag.is_null() {
            *flag = Value::from(false);
        }
        Ok(())
    })?;
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{empty_collection, testing};
    use worldstate_tree::json;

    fn ctx() -> WorldContext {
        testing::context(1.0).0
    }

    #[test]
    fn misspelled_ephemeral_is_replaced() {
        let doc = json!({ "ephermal": { "players": [] }, "maps": {} });
        let doc = ephemeral_reset(doc, &ctx()).unwrap();
        assert!(doc.get("ephermal").is_none());
        assert_eq!(doc.get_path("ephemeral.players"), Some(&empty_collection()));
        assert_eq!(doc.get("maps"), Some(&json!({})));
    }

    #[test]
    fn roll_names_only_for_dice_rolls() {
        let doc = json!({ "logEntries": { "entities": {
            "a": { "type": "diceRoll", "payload": { "rollType": "initiative" } },
            "b": { "type": "diceRoll", "payload": { "rollType": "attack" } },
            "c": { "type": "diceRoll", "payload": {} },
            "d": { "type": "message", "payload": {} }
        } } });
        let doc = log_roll_names(doc, &ctx()).unwrap();

        assert_eq!(
            doc.get_path("logEntries.entities.a.payload.rollName"),
            Some(&json!("Initiative"))
        );
        assert_eq!(doc.get_path("logEntries.entities.b.payload.rollName"), Some(&Value::Null));
        assert_eq!(doc.get_path("logEntries.entities.c.payload.rollName"), Some(&Value::Null));
        assert_eq!(doc.get_path("logEntries.entities.d.payload"), Some(&json!({})));
    }

    #[test]
    fn dice_roll_without_payload_fails() {
        let doc = json!({ "logEntries": { "entities": { "a": { "type": "diceRoll" } } } });
        let err = log_roll_names(doc, &ctx()).unwrap_err();
        assert_eq!(err.to_string(), "missing key `logEntries.entities.a.payload`");
    }

    #[test]
    fn hero_point_defaults_to_false() {
        let doc = json!({ "players": { "entities": {
            "p1": {},
            "p2": { "hasHeroPoint": null },
            "p3": { "hasHeroPoint": true }
        } } });
        let doc = hero_points(doc, &ctx()).unwrap();
        assert_eq!(doc.get_path("players.entities.p1.hasHeroPoint"), Some(&json!(false)));
        assert_eq!(doc.get_path("players.entities.p2.hasHeroPoint"), Some(&json!(false)));
        assert_eq!(doc.get_path("players.entities.p3.hasHeroPoint"), Some(&json!(true)));
    }
}
