//! The Android Manifest data structure and accessors.
//!
//! A manifest is a binary XML document with a known element vocabulary;
//! the wrapper exposes typed accessors for the nodes the runtime needs,
//! launcher discovery included.

use crate::errors::{ResourcesError, ResourcesResult};
use crate::parsers::parse_xml;
use crate::xml::Element;

/// The `android:` attribute namespace URI.
pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

const ACTION_MAIN: &str = "android.intent.action.MAIN";
const CATEGORY_LAUNCHER: &str = "android.intent.category.LAUNCHER";

/// A decoded Android manifest.
#[derive(Debug)]
pub struct Manifest {
    root: Element,
}

pub fn parse(input: &[u8]) -> ResourcesResult<Manifest> {
    let document = parse_xml(input)?;
    let root = document.root()?;
    if root.name != "manifest" {
        return Err(ResourcesError::MalformedDocument(format!(
            "root element is '{}', expected 'manifest'",
            root.name
        )));
    }
    Ok(Manifest { root })
}

impl Manifest {
    #[cfg(test)]
    pub(crate) fn from_root(root: Element) -> Self {
        Self { root }
    }

    /// The `package` attribute of the manifest element.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.root
            .attribute(None, "package")
            .and_then(|a| a.value.as_str())
    }

    #[must_use]
    pub fn version_code(&self) -> Option<u32> {
        self.android_attr_int(&self.root, "versionCode")
    }

    #[must_use]
    pub fn version_name(&self) -> Option<&str> {
        self.root
            .attribute(Some(ANDROID_NS), "versionName")
            .and_then(|a| a.value.as_str())
    }

    #[must_use]
    pub fn min_sdk_version(&self) -> Option<u32> {
        let uses_sdk = self.root.child_named("uses-sdk")?;
        self.android_attr_int(uses_sdk, "minSdkVersion")
    }

    #[must_use]
    pub fn target_sdk_version(&self) -> Option<u32> {
        let uses_sdk = self.root.child_named("uses-sdk")?;
        self.android_attr_int(uses_sdk, "targetSdkVersion")
    }

    #[must_use]
    pub fn application(&self) -> Option<&Element> {
        self.root.child_named("application")
    }

    /// Requested permissions, in declaration order.
    #[must_use]
    pub fn permissions(&self) -> Vec<&str> {
        self.root
            .children_named("uses-permission")
            .filter_map(|e| self.android_attr_str(e, "name"))
            .collect()
    }

    /// Declared activity class names (aliases excluded), expanded to
    /// fully qualified form.
    #[must_use]
    pub fn activities(&self) -> Vec<String> {
        let Some(application) = self.application() else {
            return Vec::new();
        };
        application
            .children_named("activity")
            .filter_map(|e| self.android_attr_str(e, "name"))
            .map(|name| self.expand_class_name(name))
            .collect()
    }

    /// Finds the activity the launcher would start: the `activity` or
    /// `activity-alias` element declaring a `MAIN`+`LAUNCHER` intent
    /// filter. An alias resolves through its `targetActivity`.
    #[must_use]
    pub fn launcher_activity(&self) -> Option<String> {
        let application = self.application()?;

        for element in &application.children {
            let declared = match element.name.as_str() {
                "activity" => self.android_attr_str(element, "name"),
                "activity-alias" => self.android_attr_str(element, "targetActivity"),
                _ => continue,
            };
            if declared.is_none() {
                continue;
            }
            if element.children_named("intent-filter").any(is_launcher_filter) {
                return declared.map(|name| self.expand_class_name(name));
            }
        }
        None
    }

    // Class names may be declared relative to the package (leading dot
    // or no dot at all).
    fn expand_class_name(&self, name: &str) -> String {
        match (name.starts_with('.'), name.contains('.'), self.package()) {
            (true, _, Some(package)) => format!("{package}{name}"),
            (false, false, Some(package)) => format!("{package}.{name}"),
            _ => name.to_string(),
        }
    }

    fn android_attr_str<'a>(&self, element: &'a Element, name: &str) -> Option<&'a str> {
        element
            .attribute(Some(ANDROID_NS), name)
            .or_else(|| element.attribute(None, name))
            .and_then(|a| a.value.as_str())
    }

    fn android_attr_int(&self, element: &Element, name: &str) -> Option<u32> {
        element
            .attribute(Some(ANDROID_NS), name)
            .or_else(|| element.attribute(None, name))
            .and_then(|a| a.value.as_int())
    }
}

fn is_launcher_filter(filter: &Element) -> bool {
    let has_main = filter.children_named("action").any(|a| {
        a.attribute_anyns("name")
            .and_then(|attr| attr.value.as_str())
            == Some(ACTION_MAIN)
    });
    let has_launcher = filter.children_named("category").any(|c| {
        c.attribute_anyns("name")
            .and_then(|attr| attr.value.as_str())
            == Some(CATEGORY_LAUNCHER)
    });
    has_main && has_launcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ResolvedValue;
    use crate::xml::Attribute;

    fn attr(ns: Option<&str>, name: &str, value: ResolvedValue) -> Attribute {
        Attribute {
            namespace: ns.map(str::to_string),
            name: name.to_string(),
            raw: None,
            value,
        }
    }

    fn string_attr(ns: Option<&str>, name: &str, value: &str) -> Attribute {
        attr(ns, name, ResolvedValue::String(value.to_string()))
    }

    fn element(name: &str, attributes: Vec<Attribute>, children: Vec<Element>) -> Element {
        Element {
            namespace: None,
            name: name.to_string(),
            attributes,
            children,
            cdata: Vec::new(),
        }
    }

    fn launcher_filter() -> Element {
        element(
            "intent-filter",
            vec![],
            vec![
                element(
                    "action",
                    vec![string_attr(Some(ANDROID_NS), "name", ACTION_MAIN)],
                    vec![],
                ),
                element(
                    "category",
                    vec![string_attr(Some(ANDROID_NS), "name", CATEGORY_LAUNCHER)],
                    vec![],
                ),
            ],
        )
    }

    fn manifest_with(application_children: Vec<Element>) -> Manifest {
        Manifest::from_root(element(
            "manifest",
            vec![string_attr(None, "package", "com.example.app")],
            vec![element("application", vec![], application_children)],
        ))
    }

    #[test]
    fn package_and_expansion() {
        let manifest = manifest_with(vec![element(
            "activity",
            vec![string_attr(Some(ANDROID_NS), "name", ".MainActivity")],
            vec![],
        )]);
        assert_eq!(manifest.package(), Some("com.example.app"));
        assert_eq!(
            manifest.activities(),
            vec!["com.example.app.MainActivity".to_string()]
        );
    }

    #[test]
    fn launcher_from_activity() {
        let manifest = manifest_with(vec![
            element(
                "activity",
                vec![string_attr(Some(ANDROID_NS), "name", ".Other")],
                vec![],
            ),
            element(
                "activity",
                vec![string_attr(Some(ANDROID_NS), "name", ".MainActivity")],
                vec![launcher_filter()],
            ),
        ]);
        assert_eq!(
            manifest.launcher_activity(),
            Some("com.example.app.MainActivity".to_string())
        );
    }

    #[test]
    fn launcher_from_alias_resolves_target() {
        let manifest = manifest_with(vec![
            element(
                "activity",
                vec![string_attr(Some(ANDROID_NS), "name", ".Hidden")],
                vec![],
            ),
            element(
                "activity-alias",
                vec![
                    string_attr(Some(ANDROID_NS), "name", ".Alias"),
                    string_attr(Some(ANDROID_NS), "targetActivity", ".Hidden"),
                ],
                vec![launcher_filter()],
            ),
        ]);
        assert_eq!(
            manifest.launcher_activity(),
            Some("com.example.app.Hidden".to_string())
        );
    }

    #[test]
    fn no_launcher_declared() {
        let manifest = manifest_with(vec![element(
            "activity",
            vec![string_attr(Some(ANDROID_NS), "name", ".Quiet")],
            vec![],
        )]);
        assert_eq!(manifest.launcher_activity(), None);
    }
}
