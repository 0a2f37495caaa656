//! Tar archives for tree-shaped artifacts
//!
//! Repositories are packed into a single uncompressed tar file whose entries
//! all sit under one top-level folder, and unpacked either directly or, when
//! the destination tree already exists, through a staging directory.
//!
//! # Refresh protocol
//!
//! | Phase | Action | Recovery if interrupted |
//! |-------|--------|-------------------------|
//! | Stage | Extract into `<tree>.carryall-staging/` | Delete staging, retry |
//! | Relocate | Move preserved subtrees from the live tree into staging | Staging holds them; delete nothing, retry |
//! | Swap | Remove the live tree, rename the staged tree into place | Staged tree is complete |
//! | Cleanup | Remove the staging directory | Orphaned staging, safe to delete |

mod builder;
mod extractor;
mod refresh;

pub use builder::build;
pub use extractor::{extract, top_level_folder, ExtractSummary};
pub use refresh::{restore_tree, staging_dir, SwapPhase, TreeRestore, STAGING_SUFFIX};
