//! Turns the file suggestions of a finished response into files on disk:
//! staged patch files, applied patches and brand-new files.

pub mod new_files;
pub mod paths;
pub mod patches;

pub use new_files::{write_new_files, NewFilesSummary};
pub use paths::Workspace;
pub use patches::{
    apply_git_patches, list_patch_files, write_patches, ApplySummary, PatchWriteSummary,
};

/// Patch directory relative to the repository root.
pub const PATCHES_DIR: &str = ".machtiani/patches";
