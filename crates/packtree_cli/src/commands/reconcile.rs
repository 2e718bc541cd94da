use crate::config::{CliConfig, Settings};
use crate::support::{emit_reconcile_report, open_catalog};
use packtree_core::{
    CatalogRepository, DetectionScope, ReconcileOptions, Reconciler, SqliteCatalogRepository,
};
use uuid::Uuid;

pub struct Args {
    pub parent: Option<Uuid>,
    pub root_title: Option<String>,
    pub dedupe_pack: Option<Uuid>,
    pub exceptions_only: bool,
    pub transactional: bool,
    pub shallow: bool,
    pub dedupe_courses: bool,
}

impl Args {
    fn apply_to(&self, mut options: ReconcileOptions) -> ReconcileOptions {
        options.transactional |= self.transactional;
        options.dedupe_courses |= self.dedupe_courses;
        if self.shallow {
            options.recursive = false;
        }
        options
    }
}

pub fn run(settings: &Settings, config: &CliConfig, args: Args) -> Result<(), String> {
    let conn = open_catalog(&settings.db)?;
    let repo = SqliteCatalogRepository::try_new(&conn)
        .map_err(|err| format!("catalog not ready: {err}"))?;
    let reconciler = Reconciler::with_options(&repo, args.apply_to(config.reconcile_options()));

    let (title, report) = if args.exceptions_only {
        let report = reconciler.apply_exceptions();
        ("packtree reconcile --exceptions-only".to_string(), report)
    } else if let Some(pack_id) = args.dedupe_pack {
        let report = reconciler.dedupe_courses(pack_id);
        (format!("packtree reconcile --dedupe-pack {pack_id}"), report)
    } else if let Some(parent_id) = args.parent {
        let parent = repo
            .get_pack(parent_id)
            .map_err(|err| format!("failed to read pack {parent_id}: {err}"))?
            .ok_or_else(|| format!("scope pack not found: {parent_id}"))?;
        let scope = DetectionScope::children_of(&parent)
            .ok_or_else(|| format!("pack {parent_id} is at the leaf level and has no child packs"))?;
        let report = reconciler.reconcile(&scope);
        (format!("packtree reconcile --parent {parent_id}"), report)
    } else if let Some(root_title) = &args.root_title {
        let report = reconciler.reconcile_root_by_title(root_title);
        (format!("packtree reconcile --root-title {root_title}"), report)
    } else {
        let report = reconciler.reconcile(&DetectionScope::Roots { title: None });
        ("packtree reconcile".to_string(), report)
    };

    let report = report.map_err(|err| format!("reconcile failed: {err}"))?;
    emit_reconcile_report(&title, &report, settings.json)
}

#[cfg(test)]
mod tests {
    use super::Args;
    use packtree_core::ReconcileOptions;

    fn args() -> Args {
        Args {
            parent: None,
            root_title: None,
            dedupe_pack: None,
            exceptions_only: false,
            transactional: false,
            shallow: false,
            dedupe_courses: false,
        }
    }

    #[test]
    fn flags_only_strengthen_configured_options() {
        let configured = ReconcileOptions {
            transactional: true,
            ..ReconcileOptions::default()
        };
        let options = args().apply_to(configured.clone());
        assert_eq!(options, configured);

        let options = Args {
            shallow: true,
            dedupe_courses: true,
            ..args()
        }
        .apply_to(ReconcileOptions::default());
        assert!(!options.recursive);
        assert!(options.dedupe_courses);
        assert!(!options.transactional);
    }
}
