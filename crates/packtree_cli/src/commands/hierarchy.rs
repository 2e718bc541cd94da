use crate::config::Settings;
use crate::support::{open_catalog, print_json};
use packtree_core::{CatalogQueryService, PackNode, SqliteCatalogRepository};
use uuid::Uuid;

fn print_node(node: &PackNode, depth: usize) {
    println!(
        "{}- {} [level {}] id={} courses={}",
        "  ".repeat(depth + 1),
        node.pack.title,
        node.pack.level,
        node.pack.id,
        node.course_count
    );
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

pub fn run(settings: &Settings, root: Option<Uuid>) -> Result<(), String> {
    let conn = open_catalog(&settings.db)?;
    let repo = SqliteCatalogRepository::try_new(&conn)
        .map_err(|err| format!("catalog not ready: {err}"))?;
    let tree = CatalogQueryService::new(&repo)
        .hierarchy(root)
        .map_err(|err| format!("hierarchy failed: {err}"))?;

    if settings.json {
        return print_json(&tree);
    }

    println!("packtree hierarchy {}", settings.db.display());
    if tree.is_empty() {
        println!("  (no packs)");
    }
    for node in &tree {
        print_node(node, 0);
    }
    Ok(())
}
