//! # `DroidRunner`
//!
//! `droidrunner` runs Android application packages as testable processes
//! on a plain virtual-machine runtime, with no emulator or device. The
//! project is subdivided into multiple crates; `droidrunner` acts as the
//! entry point by hosting the driver façade and re-exporting important
//! structs and functions from the sub-crates, mostly within the
//! [`prelude`] namespace.
//!
//! ## Library basics
//!
//! The central type is the [`driver::Driver`]: it opens an APK, loads
//! the translated classes, and exposes the launch/tap/find/screenshot
//! surface:
//!
//! ```rust,no_run
//! use droidrunner::prelude::*;
//!
//! let mut driver = Driver::load("app.apk")?;
//! driver.launch(None)?;
//! driver.tap(100, 50)?;
//! let _image = driver.screenshot()?;
//! driver.close()?;
//! # Ok::<(), DrError>(())
//! ```
//!
//! ## Sub-crates
//!
//!  - [`dr_package`] (apk), [`dr_dex`] and [`dr_resources`] (resources
//!    and manifest) contain the decoders for the binary formats an APK
//!    is made of,
//!  - [`dr_loader`] lowers Dalvik classes into host class units and
//!    rewrites framework references into the shim namespace,
//!  - [`dr_shim`] is the in-process framework replacement: lifecycle,
//!    fragments, views, input dispatch and rendering,
//!  - [`dr_utils`] contains the small helpers the other crates share.

mod errors;

pub mod cli;
pub mod dr_info;
pub mod dr_run;
pub mod driver;

pub use dr_dex as dex;
pub use dr_loader as loader;
pub use dr_package as package;
pub use dr_resources as resources;
pub use dr_shim as shim;
pub use dr_utils as utils;

/// Reexport module of commonly used structures and functions from the
/// `DroidRunner` project sub-crates:
///
/// ```rust
/// use droidrunner::prelude::*;
/// ```
pub mod prelude {
    pub use crate::driver::{ActivityFactory, Driver};
    pub use crate::errors::{DrError, DrResult};

    pub use dr_loader::{ClassRegistry, TranslateStats};
    pub use dr_package::Session;
    pub use dr_resources::config::DeviceConfig;
    pub use dr_resources::manifest::Manifest;
    pub use dr_shim::activity::{Activity, LifecycleEvent, LifecycleState};
    pub use dr_shim::window::Window;

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("DR_LOG", "info")
            .write_style("DR_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        let _ = builder.try_init();
    }
}
