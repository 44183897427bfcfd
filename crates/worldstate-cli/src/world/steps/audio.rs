use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use worldstate_migrate::{shape, MigrationStep, StepError};
use worldstate_tree::{Document, Map, Value, ValueKind};

use crate::world::{for_each_entity, WorldContext, ASSET_DURATION_VERSION};

/// v7: audio assets store their length as `duration` in milliseconds.
///
/// External assets already knew their length in seconds. Local files are
/// measured with the context's [`MediaProbe`](crate::world::MediaProbe),
/// at most as many at once as the shared limiter allows.
pub(crate) struct AssetDuration;

/// Where the duration of one asset comes from.
enum Source {
    Seconds(f64),
    File(PathBuf),
}

impl Source {
    fn of(asset: &Map, path: &str, ctx: &WorldContext) -> Result<Self, StepError> {
        let external_path = shape::join(path, "external");
        let external = shape::field(asset, "external", path)?;
        let external = external.as_bool().ok_or_else(|| StepError::Shape {
            path: external_path,
            expected: ValueKind::Boolean,
            found: external.kind(),
        })?;

        if external {
            let seconds_path = shape::join(path, "durationSeconds");
            let seconds = shape::field(asset, "durationSeconds", path)?;
            let seconds = seconds.as_f64().ok_or_else(|| StepError::Shape {
                path: seconds_path,
                expected: ValueKind::Number,
                found: seconds.kind(),
            })?;
            Ok(Self::Seconds(seconds))
        } else {
            let file = shape::str_field(asset, "filenameOrUrl", path)?;
            Ok(Self::File(ctx.files_root.join(file)))
        }
    }
}

#[async_trait]
impl MigrationStep<WorldContext> for AssetDuration {
    fn version(&self) -> u32 {
        ASSET_DURATION_VERSION
    }

    fn name(&self) -> &'static str {
        "asset_duration"
    }

    async fn migrate(
        &self,
        mut document: Document,
        ctx: &WorldContext,
    ) -> Result<Document, StepError> {
        let root = shape::object_mut(&mut document, "")?;
        let assets = shape::object_field_mut(
            shape::object_field_mut(root, "assets", "")?,
            "entities",
            "assets",
        )?;

        let mut durations = Vec::with_capacity(assets.len());
        let mut files = Vec::new();
        for (id, asset) in assets.iter() {
            let path = shape::join("assets.entities", id);
            match Source::of(shape::object(asset, &path)?, &path, ctx)? {
                Source::Seconds(seconds) => durations.push((id.clone(), seconds * 1000.0)),
                Source::File(file) => files.push((id.clone(), file)),
            }
        }

        debug!(local = files.len(), external = durations.len(), "measuring asset durations");
        let probes = files.into_iter().map(|(id, file)| async move {
            let duration = ctx.probe.audio_duration_ms(&file).await?;
            Ok::<_, StepError>((id, duration))
        });
        durations.extend(ctx.limiter.try_join_all(probes).await?);

        for (id, duration) in durations {
            let asset = shape::object_field_mut(assets, &id, "assets.entities")?;
            asset.remove("durationSeconds");
            asset.insert("duration".into(), millis(duration));
        }
        Ok(document)
    }
}

/// Whole milliseconds are stored as integers.
fn millis(duration: f64) -> Value {
    if duration.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(&duration) {
        Value::from(duration as u64)
    } else {
        Value::from(duration)
    }
}

/// v8: playlist entries of sound sets are typed; all existing ones are songs.
pub(crate) fn playlist_entry_type(
    mut document: Document,
    _: &WorldContext,
) -> Result<Document, StepError> {
    for_each_entity(&mut document, "soundSets", |sound_set, path| {
        let playlists_path = shape::join(path, "playlists");
        let playlists = shape::array_mut(
            shape::field_mut(sound_set, "playlists", path)?,
            &playlists_path,
        )?;
        for (i, playlist) in playlists.iter_mut().enumerate() {
            let playlist_path = shape::join(&playlists_path, &i.to_string());
            let playlist = shape::object_mut(playlist, &playlist_path)?;
            let entries_path = shape::join(&playlist_path, "entries");
            let entries = shape::array_mut(
                shape::field_mut(playlist, "entries", &playlist_path)?,
                &entries_path,
            )?;
            for (j, entry) in entries.iter_mut().enumerate() {
                shape::object_mut(entry, &shape::join(&entries_path, &j.to_string()))?
                    .insert("type".into(), Value::from("song"));
            }
        }
        Ok(())
    })?;
    Ok(document)
}
