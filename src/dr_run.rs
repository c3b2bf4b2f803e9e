//! The `run` subcommand: load, launch, replay taps, screenshot.

use crate::driver::Driver;
use crate::errors::{DrError, DrResult};
use crate::prelude::init_logger;
use clap::ArgMatches;
use dr_resources::config::DeviceConfig;

pub fn run(args: &ArgMatches) -> DrResult<()> {
    init_logger(args);

    let filename = args
        .get_one::<String>("input")
        .ok_or_else(|| DrError::BadArguments("--input needed".to_string()))?;

    let mut driver = Driver::load(filename)?;

    let width = *args.get_one::<i32>("width").unwrap_or(&480);
    let height = *args.get_one::<i32>("height").unwrap_or(&800);
    driver.set_display(width, height);

    if let Some(locale) = args.get_one::<String>("locale") {
        driver.set_device_config(parse_locale(locale)?);
    }

    let activity = args.get_one::<String>("activity").map(String::as_str);
    let state = driver.launch(activity)?.state();
    log::info!("activity is {state:?}");

    if let Some(taps) = args.get_many::<String>("tap") {
        for tap in taps {
            let (x, y) = parse_tap(tap)?;
            let handled = driver.tap(x, y)?;
            log::info!("tap at ({x}, {y}) handled: {handled}");
        }
    }

    if let Some(output) = args.get_one::<String>("screenshot") {
        let image = driver.screenshot()?;
        image.save(output)?;
        log::info!("screenshot written to {output}");
    }

    driver.destroy()?;
    driver.close()
}

fn parse_tap(spec: &str) -> DrResult<(i32, i32)> {
    let mut parts = spec.splitn(2, ',');
    let x = parts.next().and_then(|v| v.trim().parse().ok());
    let y = parts.next().and_then(|v| v.trim().parse().ok());
    match (x, y) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(DrError::BadArguments(format!(
            "--tap expects 'x,y', got '{spec}'"
        ))),
    }
}

fn parse_locale(spec: &str) -> DrResult<DeviceConfig> {
    let mut parts = spec.splitn(2, '-');
    let language = parts
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| DrError::BadArguments(format!("--locale expects 'll[-CC]', got '{spec}'")))?;
    let country = parts.next();
    Ok(DeviceConfig::default().with_locale(language, country))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_specs() {
        assert_eq!(parse_tap("100,50").unwrap(), (100, 50));
        assert_eq!(parse_tap(" 10 , 20 ").unwrap(), (10, 20));
        assert!(parse_tap("100").is_err());
        assert!(parse_tap("a,b").is_err());
    }

    #[test]
    fn locale_specs() {
        let device = parse_locale("es-ES").unwrap();
        assert_eq!(device.language.as_deref(), Some("es"));
        assert_eq!(device.country.as_deref(), Some("ES"));

        let device = parse_locale("fr").unwrap();
        assert_eq!(device.language.as_deref(), Some("fr"));
        assert_eq!(device.country, None);
    }
}
