use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "packtree",
    about = "packtree: import, reconcile and collapse hierarchical course packs",
    version
)]
pub struct Cli {
    /// Path to the SQLite catalog file
    #[arg(long, global = true, env = "PACKTREE_DB")]
    pub db: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for rolling log files (defaults to `logs/` next to the catalog)
    #[arg(long, global = true, env = "PACKTREE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, global = true, env = "PACKTREE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a categorized vocabulary feed as a three-level pack tree
    Import {
        /// JSON array of `{category, subcategory, english, chinese, phonetic?}`
        feed: PathBuf,

        /// JSON object mapping words to phonetic transcriptions
        #[arg(long)]
        phonetics: Option<PathBuf>,

        /// Title of the level-1 pack receiving the feed
        #[arg(long)]
        root_title: Option<String>,
    },

    /// Detect and merge duplicate packs
    Reconcile {
        /// Reconcile the child packs of this pack
        #[arg(long, conflicts_with_all = ["root_title", "dedupe_pack", "exceptions_only"])]
        parent: Option<Uuid>,

        /// Reconcile the level-1 packs carrying this title
        #[arg(long, conflicts_with_all = ["dedupe_pack", "exceptions_only"])]
        root_title: Option<String>,

        /// Only merge same-titled courses inside this pack
        #[arg(long, conflicts_with = "exceptions_only")]
        dedupe_pack: Option<Uuid>,

        /// Only apply the configured exception groups
        #[arg(long)]
        exceptions_only: bool,

        /// Merge each duplicate set inside one unit of work
        #[arg(long)]
        transactional: bool,

        /// Do not descend below the selected scope
        #[arg(long)]
        shallow: bool,

        /// Also merge same-titled courses inside every visited pack
        #[arg(long)]
        dedupe_courses: bool,
    },

    /// Remove a pack level beneath one level-1 pack
    Collapse {
        /// Level-1 pack whose subtree is collapsed
        root: Uuid,

        /// Level to remove
        #[arg(long, default_value_t = 3)]
        level: i64,

        /// Skip merging duplicate level-2 packs first
        #[arg(long)]
        no_premerge: bool,

        /// Merge same-titled courses after collapsing
        #[arg(long)]
        dedupe_courses: bool,

        /// Merge each duplicate set inside one unit of work
        #[arg(long)]
        transactional: bool,
    },

    /// Report structural problems without changing anything
    Audit,

    /// Print the nested pack tree
    Hierarchy {
        /// Only print the tree under this level-1 pack
        #[arg(long)]
        root: Option<Uuid>,
    },

    /// Assign one cover image to every pack at a level under a root
    Covers {
        /// Level-1 pack whose descendants receive the cover
        root: Uuid,

        /// Level of the packs to update
        #[arg(long, default_value_t = 2)]
        level: i64,

        /// Cover URL to assign
        #[arg(long, required_unless_present = "clear", conflicts_with = "clear")]
        cover: Option<String>,

        /// Remove the cover instead of setting one
        #[arg(long)]
        clear: bool,
    },
}
