use crate::config::{CliConfig, Settings};
use crate::support::{emit_reconcile_report, open_catalog};
use packtree_core::{PackLevel, Reconciler, SqliteCatalogRepository};
use uuid::Uuid;

pub struct Args {
    pub root: Uuid,
    pub level: i64,
    pub no_premerge: bool,
    pub dedupe_courses: bool,
    pub transactional: bool,
}

pub fn run(settings: &Settings, config: &CliConfig, args: Args) -> Result<(), String> {
    let level = PackLevel::from_i64(args.level)
        .ok_or_else(|| format!("unknown pack level {}; expected 1, 2 or 3", args.level))?;

    let mut options = config.reconcile_options();
    options.transactional |= args.transactional;
    options.dedupe_courses |= args.dedupe_courses;
    if args.no_premerge {
        options.merge_before_collapse = false;
    }

    let conn = open_catalog(&settings.db)?;
    let repo = SqliteCatalogRepository::try_new(&conn)
        .map_err(|err| format!("catalog not ready: {err}"))?;
    let report = Reconciler::with_options(&repo, options)
        .collapse_level(args.root, level)
        .map_err(|err| format!("collapse failed: {err}"))?;

    emit_reconcile_report(
        &format!("packtree collapse {} --level {}", args.root, level),
        &report,
        settings.json,
    )
}
