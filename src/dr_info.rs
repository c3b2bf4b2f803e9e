//! The `info` subcommand: a JSON summary of an APK.

use crate::driver::Driver;
use crate::errors::{DrError, DrResult};
use crate::prelude::init_logger;
use clap::ArgMatches;
use regex::Regex;
use serde::Serialize;

#[derive(Serialize)]
struct TranslationSummary {
    translated: usize,
    failed: usize,
}

#[derive(Serialize)]
struct PackageSummary {
    package: Option<String>,
    version_code: Option<u32>,
    version_name: Option<String>,
    min_sdk_version: Option<u32>,
    target_sdk_version: Option<u32>,
    launcher_activity: Option<String>,
    activities: Vec<String>,
    permissions: Vec<String>,
    entry_count: usize,
    dex_count: usize,
    classes_loaded: usize,
    translation: Vec<TranslationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classes: Option<Vec<String>>,
}

pub fn run(args: &ArgMatches) -> DrResult<()> {
    init_logger(args);

    let filename = args
        .get_one::<String>("input")
        .ok_or_else(|| DrError::BadArguments("--input needed".to_string()))?;

    let driver = Driver::load(filename)?;
    let manifest = driver.session().manifest();

    let classes = args
        .get_one::<String>("filter-class")
        .map(|pattern| -> DrResult<Vec<String>> {
            let regex = Regex::new(pattern)?;
            Ok(driver
                .registry()
                .iter()
                .map(|class| class.name.clone())
                .filter(|name| regex.is_match(name))
                .collect())
        })
        .transpose()?;

    let summary = PackageSummary {
        package: manifest.and_then(|m| m.package().map(str::to_string)),
        version_code: manifest.and_then(|m| m.version_code()),
        version_name: manifest.and_then(|m| m.version_name().map(str::to_string)),
        min_sdk_version: manifest.and_then(|m| m.min_sdk_version()),
        target_sdk_version: manifest.and_then(|m| m.target_sdk_version()),
        launcher_activity: manifest.and_then(|m| m.launcher_activity()),
        activities: manifest.map(|m| m.activities()).unwrap_or_default(),
        permissions: manifest
            .map(|m| m.permissions().iter().map(|p| (*p).to_string()).collect())
            .unwrap_or_default(),
        entry_count: driver.session().iter_entries().count(),
        dex_count: driver.session().nb_dexs(),
        classes_loaded: driver.registry().len(),
        translation: driver
            .translate_stats()
            .iter()
            .map(|stats| TranslationSummary {
                translated: stats.translated,
                failed: stats.failed,
            })
            .collect(),
        classes,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    driver.close()
}
