//! The individual migrations, grouped by the part of the document they touch.

mod audio;
mod characters;
mod maps;
mod session;

pub(super) use audio::{playlist_entry_type, AssetDuration};
pub(super) use characters::{
    armor_class_zero_to_null, character_id_list, hit_points, paralyzed_typo,
    remove_cover_conditions, token_border_color,
};
pub(super) use maps::{map_object_rotation, map_settings};
pub(super) use session::{ephemeral_reset, hero_points, log_roll_names};
