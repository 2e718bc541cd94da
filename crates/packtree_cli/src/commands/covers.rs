use crate::config::Settings;
use crate::support::{open_catalog, print_json};
use packtree_core::{assign_child_covers, PackLevel, SqliteCatalogRepository};
use serde_json::json;
use uuid::Uuid;

pub struct Args {
    pub root: Uuid,
    pub level: i64,
    pub cover: Option<String>,
    pub clear: bool,
}

pub fn run(settings: &Settings, args: Args) -> Result<(), String> {
    let level = PackLevel::from_i64(args.level)
        .ok_or_else(|| format!("unknown pack level {}; expected 2 or 3", args.level))?;
    let cover = if args.clear { None } else { args.cover.as_deref() };

    let conn = open_catalog(&settings.db)?;
    let repo = SqliteCatalogRepository::try_new(&conn)
        .map_err(|err| format!("catalog not ready: {err}"))?;
    let updated = assign_child_covers(&repo, args.root, level, cover)
        .map_err(|err| format!("covers failed: {err}"))?;

    if settings.json {
        return print_json(&json!({
            "root_id": args.root,
            "level": level.as_i64(),
            "cover": cover,
            "packs_updated": updated,
        }));
    }

    println!("packtree covers {} --level {}", args.root, level);
    match cover {
        Some(cover) => println!("  Cover: {cover}"),
        None => println!("  Cover: (cleared)"),
    }
    println!("  Packs updated: {updated}");
    Ok(())
}
