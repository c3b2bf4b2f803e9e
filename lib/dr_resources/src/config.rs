//! Resource configurations and best-match selection.
//!
//! Each type chunk of the resources table declares the device
//! configuration its entries were compiled for. Selection walks the
//! qualifiers in strict priority order, narrowing the candidate set at
//! each step; a qualifier left unspecified on a candidate neither helps
//! nor hurts it, unless a competing candidate specifies a matching value.

use serde::Serialize;
use std::fmt;

/// Screen orientation qualifier values.
pub const ORIENTATION_PORTRAIT: u8 = 1;
pub const ORIENTATION_LANDSCAPE: u8 = 2;

/// Night mode bits of the `ui_mode` qualifier byte.
const UI_MODE_NIGHT_MASK: u8 = 0x30;
const UI_MODE_NIGHT_NO: u8 = 0x10;
const UI_MODE_NIGHT_YES: u8 = 0x20;

/// Screen layout size bucket bits.
const SCREENLAYOUT_SIZE_MASK: u8 = 0x0f;

/// A qualifier bundle attached to one type chunk. `None` means "any".
///
/// Trailing fields absent from a small `configSize` are left `None` by
/// the parser, which is the same thing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Config {
    pub mcc: Option<u16>,
    pub mnc: Option<u16>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub orientation: Option<u8>,
    pub touchscreen: Option<u8>,
    pub density: Option<u16>,
    pub keyboard: Option<u8>,
    pub navigation: Option<u8>,
    pub input_flags: Option<u8>,
    pub screen_width: Option<u16>,
    pub screen_height: Option<u16>,
    pub sdk_version: Option<u16>,
    pub minor_version: Option<u16>,
    pub screen_layout: Option<u8>,
    pub ui_mode: Option<u8>,
    pub smallest_width_dp: Option<u16>,
    pub screen_width_dp: Option<u16>,
    pub screen_height_dp: Option<u16>,
    pub locale_script: Option<String>,
    pub locale_variant: Option<String>,
}

impl Config {
    /// Whether every qualifier is "any" (the default configuration).
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    #[must_use]
    pub fn night_mode(&self) -> Option<bool> {
        match self.ui_mode.map(|m| m & UI_MODE_NIGHT_MASK) {
            Some(UI_MODE_NIGHT_YES) => Some(true),
            Some(UI_MODE_NIGHT_NO) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn layout_size(&self) -> Option<u8> {
        match self.screen_layout.map(|l| l & SCREENLAYOUT_SIZE_MASK) {
            Some(0) | None => None,
            Some(size) => Some(size),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_default() {
            return write!(f, "(default)");
        }
        let mut parts: Vec<String> = Vec::new();
        if let Some(lang) = &self.language {
            match &self.country {
                Some(c) => parts.push(format!("{lang}-r{}", c.to_uppercase())),
                None => parts.push(lang.clone()),
            }
        }
        if let Some(density) = self.density {
            parts.push(format!("{density}dpi"));
        }
        if let Some(orientation) = self.orientation {
            parts.push(match orientation {
                ORIENTATION_PORTRAIT => "port".to_string(),
                ORIENTATION_LANDSCAPE => "land".to_string(),
                other => format!("orientation{other}"),
            });
        }
        if let Some(night) = self.night_mode() {
            parts.push(if night { "night" } else { "notnight" }.to_string());
        }
        if let Some(sdk) = self.sdk_version {
            parts.push(format!("v{sdk}"));
        }
        write!(f, "{}", parts.join("-"))
    }
}

/// The target device configuration resources are resolved against.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceConfig {
    pub language: Option<String>,
    pub country: Option<String>,
    pub night_mode: Option<bool>,
    pub density: Option<u16>,
    pub orientation: Option<u8>,
    pub layout_size: Option<u8>,
    pub sdk_version: Option<u16>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            language: None,
            country: None,
            night_mode: Some(false),
            density: Some(160),
            orientation: Some(ORIENTATION_PORTRAIT),
            layout_size: None,
            sdk_version: Some(33),
        }
    }
}

impl DeviceConfig {
    #[must_use]
    pub fn with_locale(mut self, language: &str, country: Option<&str>) -> Self {
        self.language = Some(language.to_lowercase());
        self.country = country.map(str::to_uppercase);
        self
    }

    #[must_use]
    pub fn with_density(mut self, density: u16) -> Self {
        self.density = Some(density);
        self
    }

    #[must_use]
    pub fn with_sdk_version(mut self, sdk: u16) -> Self {
        self.sdk_version = Some(sdk);
        self
    }
}

/// Selects the best matching candidate for `device`, or `None` when no
/// candidate survives. Selection is a pure function of its inputs, so
/// re-running it over the same candidates always returns the same pick.
pub fn best_match<'a, T>(
    candidates: Vec<(&'a Config, T)>,
    device: &DeviceConfig,
) -> Option<(&'a Config, T)> {
    let mut surviving = candidates;

    for step in [
        Step::Locale,
        Step::NightMode,
        Step::Density,
        Step::Orientation,
        Step::LayoutSize,
        Step::SdkVersion,
    ] {
        surviving = filter_step(surviving, device, step);
        if surviving.len() <= 1 {
            break;
        }
    }

    surviving.into_iter().next()
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Locale,
    NightMode,
    Density,
    Orientation,
    LayoutSize,
    SdkVersion,
}

fn filter_step<'a, T>(
    candidates: Vec<(&'a Config, T)>,
    device: &DeviceConfig,
    step: Step,
) -> Vec<(&'a Config, T)> {
    match step {
        Step::Locale => locale_step(candidates, device),
        Step::NightMode => exact_step(candidates, device.night_mode, |c| c.night_mode()),
        Step::Density => density_step(candidates, device),
        Step::Orientation => exact_step(candidates, device.orientation, |c| c.orientation),
        Step::LayoutSize => layout_size_step(candidates, device),
        Step::SdkVersion => sdk_step(candidates, device),
    }
}

// Exact-match qualifiers: a specified mismatching value is a
// contradiction; a specified matching value beats "any".
fn exact_step<'a, T, Q: PartialEq + Copy>(
    candidates: Vec<(&'a Config, T)>,
    device_value: Option<Q>,
    qualifier: impl Fn(&Config) -> Option<Q>,
) -> Vec<(&'a Config, T)> {
    let Some(device_value) = device_value else {
        // Device leaves the qualifier open: only unqualified candidates
        // can match it.
        return keep_if_any(candidates, |c| qualifier(c).is_none());
    };

    let no_contradiction: Vec<_> = candidates
        .into_iter()
        .filter(|(c, _)| qualifier(c).map_or(true, |v| v == device_value))
        .collect();

    keep_if_any(no_contradiction, |c| qualifier(c).is_some())
}

// Keeps only candidates satisfying `pred` unless that empties the set.
fn keep_if_any<'a, T>(
    candidates: Vec<(&'a Config, T)>,
    pred: impl Fn(&Config) -> bool,
) -> Vec<(&'a Config, T)> {
    if candidates.iter().any(|(c, _)| pred(c)) {
        candidates.into_iter().filter(|(c, _)| pred(c)).collect()
    } else {
        candidates
    }
}

fn locale_step<'a, T>(
    candidates: Vec<(&'a Config, T)>,
    device: &DeviceConfig,
) -> Vec<(&'a Config, T)> {
    let Some(language) = &device.language else {
        return keep_if_any(candidates, |c| c.language.is_none());
    };

    // A specified language that differs from the device locale is a
    // contradiction and eliminates the candidate outright.
    let no_contradiction: Vec<_> = candidates
        .into_iter()
        .filter(|(c, _)| c.language.as_deref().map_or(true, |l| l == language))
        .collect();

    let narrowed = keep_if_any(no_contradiction, |c| c.language.is_some());

    // Among language matches, a mismatching specified country is a
    // contradiction, and a matching country beats an unspecified one.
    match &device.country {
        Some(country) => {
            let no_contradiction: Vec<_> = narrowed
                .into_iter()
                .filter(|(c, _)| c.country.as_deref().map_or(true, |cc| cc == country))
                .collect();
            keep_if_any(no_contradiction, |c| c.country.is_some())
        }
        None => keep_if_any(narrowed, |c| c.country.is_none()),
    }
}

fn density_step<'a, T>(
    candidates: Vec<(&'a Config, T)>,
    device: &DeviceConfig,
) -> Vec<(&'a Config, T)> {
    let Some(target) = device.density else {
        return keep_if_any(candidates, |c| c.density.is_none());
    };

    // Scaling a lower-density asset up looks worse than scaling a
    // higher-density one down, hence the +1 on the upscale side.
    let penalty = |d: u16| -> u32 {
        let dist = u32::from(target.abs_diff(d));
        if d < target {
            dist * 2 + 1
        } else {
            dist * 2
        }
    };

    let best = candidates
        .iter()
        .filter_map(|(c, _)| c.density.map(penalty))
        .min();

    match best {
        Some(best) => candidates
            .into_iter()
            .filter(|(c, _)| c.density.map(penalty) == Some(best))
            .collect(),
        None => candidates,
    }
}

fn layout_size_step<'a, T>(
    candidates: Vec<(&'a Config, T)>,
    device: &DeviceConfig,
) -> Vec<(&'a Config, T)> {
    let Some(device_size) = device.layout_size else {
        return keep_if_any(candidates, |c| c.layout_size().is_none());
    };

    // A size above the device's is a contradiction.
    let no_contradiction: Vec<_> = candidates
        .into_iter()
        .filter(|(c, _)| c.layout_size().map_or(true, |s| s <= device_size))
        .collect();

    let best = no_contradiction
        .iter()
        .filter_map(|(c, _)| c.layout_size())
        .max();

    match best {
        Some(best) => no_contradiction
            .into_iter()
            .filter(|(c, _)| c.layout_size() == Some(best))
            .collect(),
        None => no_contradiction,
    }
}

fn sdk_step<'a, T>(
    candidates: Vec<(&'a Config, T)>,
    device: &DeviceConfig,
) -> Vec<(&'a Config, T)> {
    let Some(device_sdk) = device.sdk_version else {
        return keep_if_any(candidates, |c| c.sdk_version.is_none());
    };

    // Variants for a newer platform than the device are eliminated.
    let no_contradiction: Vec<_> = candidates
        .into_iter()
        .filter(|(c, _)| c.sdk_version.map_or(true, |v| v <= device_sdk))
        .collect();

    let best = no_contradiction
        .iter()
        .filter_map(|(c, _)| c.sdk_version)
        .max();

    match best {
        Some(best) => no_contradiction
            .into_iter()
            .filter(|(c, _)| c.sdk_version == Some(best))
            .collect(),
        None => no_contradiction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang(language: &str) -> Config {
        Config {
            language: Some(language.to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn locale_prefers_matching_language() {
        let default = Config::default();
        let es = lang("es");
        let fr = lang("fr");
        let candidates = vec![(&default, "Hello"), (&es, "Hola"), (&fr, "Bonjour")];

        let device = DeviceConfig::default().with_locale("es", Some("ES"));
        let (_, value) = best_match(candidates, &device).unwrap();
        assert_eq!(value, "Hola");
    }

    #[test]
    fn locale_falls_back_to_default() {
        let default = Config::default();
        let es = lang("es");
        let fr = lang("fr");
        let candidates = vec![(&default, "Hello"), (&es, "Hola"), (&fr, "Bonjour")];

        let device = DeviceConfig::default().with_locale("de", Some("DE"));
        let (_, value) = best_match(candidates, &device).unwrap();
        assert_eq!(value, "Hello");
    }

    #[test]
    fn country_refines_language() {
        let es = lang("es");
        let es_mx = Config {
            country: Some("MX".to_string()),
            ..lang("es")
        };
        let candidates = vec![(&es, "es"), (&es_mx, "es-rMX")];

        let device = DeviceConfig::default().with_locale("es", Some("MX"));
        let (_, value) = best_match(candidates, &device).unwrap();
        assert_eq!(value, "es-rMX");

        let es2 = lang("es");
        let es_mx2 = es_mx.clone();
        let candidates = vec![(&es2, "es"), (&es_mx2, "es-rMX")];
        let device = DeviceConfig::default().with_locale("es", Some("AR"));
        let (_, value) = best_match(candidates, &device).unwrap();
        assert_eq!(value, "es");
    }

    #[test]
    fn density_prefers_closest_and_penalizes_upscaling() {
        let low = Config {
            density: Some(120),
            ..Config::default()
        };
        let high = Config {
            density: Some(200),
            ..Config::default()
        };
        let candidates = vec![(&low, "low"), (&high, "high")];

        // 160 target: low is 40 below (penalty 81), high is 40 above
        // (penalty 80); downscaling wins.
        let device = DeviceConfig::default().with_density(160);
        let (_, value) = best_match(candidates, &device).unwrap();
        assert_eq!(value, "high");
    }

    #[test]
    fn sdk_candidates_above_device_are_eliminated() {
        let v21 = Config {
            sdk_version: Some(21),
            ..Config::default()
        };
        let v30 = Config {
            sdk_version: Some(30),
            ..Config::default()
        };
        let candidates = vec![(&v21, "v21"), (&v30, "v30")];

        let device = DeviceConfig::default().with_sdk_version(28);
        let (_, value) = best_match(candidates, &device).unwrap();
        assert_eq!(value, "v21");

        let v21b = v21.clone();
        let v30b = v30.clone();
        let candidates = vec![(&v21b, "v21"), (&v30b, "v30")];
        let device = DeviceConfig::default().with_sdk_version(33);
        let (_, value) = best_match(candidates, &device).unwrap();
        assert_eq!(value, "v30");
    }

    #[test]
    fn layout_size_must_not_exceed_device() {
        let large = Config {
            screen_layout: Some(3),
            ..Config::default()
        };
        let normal = Config {
            screen_layout: Some(2),
            ..Config::default()
        };
        let candidates = vec![(&large, "large"), (&normal, "normal")];

        let mut device = DeviceConfig::default();
        device.layout_size = Some(2);
        let (_, value) = best_match(candidates, &device).unwrap();
        assert_eq!(value, "normal");
    }

    #[test]
    fn selection_is_a_fixed_point() {
        let default = Config::default();
        let es = lang("es");
        let device = DeviceConfig::default().with_locale("es", None);

        let first = best_match(vec![(&default, 1), (&es, 2)], &device)
            .map(|(_, v)| v)
            .unwrap();
        let second = best_match(vec![(&default, 1), (&es, 2)], &device)
            .map(|(_, v)| v)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first, 2);
    }
}
