//! Dalvik-to-host class loading pipeline.
//!
//! Three stages: [`translate`] lowers decoded dex classes into stack
//! machine [`host`] class units, [`remap`] substitutes framework
//! references with their shim counterparts, and [`registry`] serves the
//! resulting units read-only.

pub mod errors;
pub mod host;
pub mod registry;
pub mod remap;
pub mod translate;

pub use crate::registry::ClassRegistry;
pub use crate::translate::TranslateStats;

use dr_dex::Dex;

/// Translates and rewrites every class of a dex file into `registry`,
/// returning the per-file stats.
pub fn load_dex(dex: &Dex, registry: &mut ClassRegistry) -> TranslateStats {
    let (classes, stats) = translate::translate_dex(dex);
    for class in classes {
        registry.register(remap::rewrite_class(class));
    }
    stats
}
