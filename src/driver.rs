//! The driver façade.
//!
//! One [`Driver`] owns a loaded APK end to end: the extraction session,
//! the translated-and-rewritten class registry, and the currently
//! launched activity. All operations are synchronous on the calling
//! thread and report recoverable failures as error values.

use crate::errors::{DrError, DrResult};
use dr_loader::{load_dex, ClassRegistry, TranslateStats};
use dr_package::Session;
use dr_resources::config::DeviceConfig;
use dr_resources::values::ResolvedValue;
use dr_resources::xml::{Attribute, Element};
use dr_shim::activity::{Activity, ActivityCallbacks, NoopActivity};
use dr_shim::errors::{ShimError, ShimResult};
use dr_shim::res::{AttrValue, LayoutAttr, LayoutNode, ResourceResolver};
use dr_shim::view::ViewRef;
use image::RgbaImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Produces the user-code hooks for one activity launch. Tests and
/// embedders register factories for the activity classes they drive;
/// classes without a factory launch with no-op hooks.
pub type ActivityFactory = Box<dyn Fn() -> Box<dyn ActivityCallbacks>>;

pub struct Driver {
    session: Rc<Session>,
    registry: ClassRegistry,
    stats: Vec<TranslateStats>,
    device: DeviceConfig,
    display: (i32, i32),
    factories: HashMap<String, ActivityFactory>,
    activity: Option<Activity>,
}

impl Driver {
    /// Opens an APK and loads every translated class.
    pub fn load<P: AsRef<Path>>(path: P) -> DrResult<Self> {
        let session = Session::open(path)?;

        let mut registry = ClassRegistry::new();
        let stats: Vec<TranslateStats> = session
            .iter_dexs()
            .map(|dex| load_dex(dex, &mut registry))
            .collect();
        log::info!(
            "loaded {} classes from {} dex file(s)",
            registry.len(),
            session.nb_dexs()
        );

        Ok(Self {
            session: Rc::new(session),
            registry,
            stats,
            device: DeviceConfig::default(),
            display: (480, 800),
            factories: HashMap::new(),
            activity: None,
        })
    }

    pub fn set_display(&mut self, width: i32, height: i32) {
        self.display = (width, height);
    }

    pub fn set_device_config(&mut self, device: DeviceConfig) {
        self.device = device;
    }

    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Per-dex translation outcome counts, in `classes*.dex` order.
    #[inline]
    #[must_use]
    pub fn translate_stats(&self) -> &[TranslateStats] {
        &self.stats
    }

    /// Registers the hook factory for an activity class (dotted name).
    pub fn register_activity(&mut self, class_name: &str, factory: ActivityFactory) {
        self.factories.insert(class_name.to_string(), factory);
    }

    /// Launches an activity and drives it to `Resumed`. Without an
    /// explicit name, the manifest's `MAIN`+`LAUNCHER` entry (activity
    /// or activity-alias) is used.
    pub fn launch(&mut self, activity: Option<&str>) -> DrResult<&mut Activity> {
        let name = match activity {
            Some(name) => name.to_string(),
            None => self
                .session
                .manifest()
                .and_then(|m| m.launcher_activity())
                .ok_or(DrError::NoLauncherActivity)?,
        };
        log::info!("launching {name}");

        let internal = name.replace('.', "/");
        if !self.factories.contains_key(&name) && self.registry.get(&internal).is_none() {
            return Err(DrError::ActivityNotFound(name));
        }

        let callbacks: Box<dyn ActivityCallbacks> = match self.factories.get(&name) {
            Some(factory) => factory(),
            None => Box::new(NoopActivity),
        };

        let mut launched =
            Activity::with_callbacks(&name, self.display.0, self.display.1, callbacks);
        if self.session.resources().is_some() {
            launched.set_resources(Rc::new(SessionResources {
                session: Rc::clone(&self.session),
                device: self.device.clone(),
            }));
        }
        launched.resume()?;

        Ok(self.activity.insert(launched))
    }

    #[must_use]
    pub fn activity(&self) -> Option<&Activity> {
        self.activity.as_ref()
    }

    pub fn activity_mut(&mut self) -> Option<&mut Activity> {
        self.activity.as_mut()
    }

    fn launched(&mut self) -> DrResult<&mut Activity> {
        self.activity.as_mut().ok_or(DrError::NotLaunched)
    }

    /// Synthesizes a down+up pair at window coordinates. Out-of-window
    /// taps are not handled, not errors.
    pub fn tap(&mut self, x: i32, y: i32) -> DrResult<bool> {
        let activity = self.launched()?;
        Ok(activity.window_mut().tap(x, y))
    }

    /// Taps the center of the view carrying `id`.
    pub fn tap_view(&mut self, id: i32) -> DrResult<bool> {
        let activity = self.launched()?;
        let view = activity
            .find_view(id)
            .ok_or(DrError::ViewNotFound(id))?;
        let (x, y) = absolute_center(&view);
        Ok(activity.window_mut().tap(x, y))
    }

    /// Recursive descent from the window root; first match wins.
    pub fn find_view(&self, id: i32) -> Option<ViewRef> {
        self.activity.as_ref().and_then(|a| a.find_view(id))
    }

    /// Rasterizes the current window content.
    pub fn screenshot(&mut self) -> DrResult<RgbaImage> {
        let activity = self.launched()?;
        activity.window_mut().perform_layout();
        Ok(activity.window().screenshot())
    }

    pub fn pause(&mut self) -> DrResult<()> {
        Ok(self.launched()?.pause()?)
    }

    pub fn resume(&mut self) -> DrResult<()> {
        Ok(self.launched()?.resume()?)
    }

    pub fn stop(&mut self) -> DrResult<()> {
        Ok(self.launched()?.stop()?)
    }

    pub fn destroy(&mut self) -> DrResult<()> {
        Ok(self.launched()?.destroy()?)
    }

    /// Destroys any launched activity and releases the extraction
    /// session's scratch directory.
    pub fn close(mut self) -> DrResult<()> {
        if let Some(activity) = self.activity.as_mut() {
            let _ = activity.destroy();
        }
        self.activity = None;
        match Rc::try_unwrap(self.session) {
            Ok(session) => session.close()?,
            Err(shared) => drop(shared),
        }
        Ok(())
    }
}

/// Window coordinates of a view's center, accumulated through the
/// parent chain.
fn absolute_center(view: &ViewRef) -> (i32, i32) {
    let (l, t, r, b) = view.borrow().frame();
    let mut x = (l + r) / 2;
    let mut y = (t + b) / 2;

    let mut node = view.borrow().parent();
    while let Some(parent) = node {
        let (pl, pt, _, _) = parent.borrow().frame();
        x += pl;
        y += pt;
        node = parent.borrow().parent();
    }
    (x, y)
}

// -- the injected resource facade ---------------------------------------

struct SessionResources {
    session: Rc<Session>,
    device: DeviceConfig,
}

impl SessionResources {
    fn resolve(&self, id: u32) -> ShimResult<ResolvedValue> {
        let table = self
            .session
            .resources()
            .ok_or_else(|| ShimError::ResourceMissing("package has no resource table".into()))?;
        table
            .resolve(id, &self.device)
            .map_err(|err| ShimError::ResourceMissing(err.to_string()))
    }
}

impl ResourceResolver for SessionResources {
    fn string(&self, id: u32) -> ShimResult<String> {
        match self.resolve(id)? {
            ResolvedValue::String(s) => Ok(s),
            other => Err(ShimError::ResourceMissing(format!(
                "{id:#010x} is not a string: {other}"
            ))),
        }
    }

    fn boolean(&self, id: u32) -> ShimResult<bool> {
        self.resolve(id)?
            .as_bool()
            .ok_or_else(|| ShimError::ResourceMissing(format!("{id:#010x} is not a bool")))
    }

    fn integer(&self, id: u32) -> ShimResult<i32> {
        self.resolve(id)?
            .as_int()
            .map(|v| v as i32)
            .ok_or_else(|| ShimError::ResourceMissing(format!("{id:#010x} is not an integer")))
    }

    fn dimension(&self, id: u32) -> ShimResult<f32> {
        match self.resolve(id)? {
            ResolvedValue::Dimension(d) | ResolvedValue::Float(d) => Ok(d),
            other => Err(ShimError::ResourceMissing(format!(
                "{id:#010x} is not a dimension: {other}"
            ))),
        }
    }

    fn color(&self, id: u32) -> ShimResult<u32> {
        match self.resolve(id)? {
            ResolvedValue::Color(c) => Ok(c),
            ResolvedValue::Int(c) => Ok(c),
            other => Err(ShimError::ResourceMissing(format!(
                "{id:#010x} is not a color: {other}"
            ))),
        }
    }

    // Layout entries resolve to the compiled document's path inside the
    // package; the file is decoded and handed to the shim as a plain
    // tree.
    fn layout(&self, id: u32) -> ShimResult<LayoutNode> {
        let path = self.string(id)?;
        let raw = self
            .session
            .raw(&PathBuf::from(&path))
            .map_err(|err| ShimError::ResourceMissing(format!("layout file {path}: {err}")))?;
        let document = dr_resources::parse_xml(&raw)
            .map_err(|err| ShimError::Inflate(format!("layout {path}: {err}")))?;
        let root = document
            .root()
            .map_err(|err| ShimError::Inflate(format!("layout {path}: {err}")))?;
        Ok(element_to_layout_node(&root))
    }
}

/// Converts a decoded layout element into the shim's format-free tree.
pub(crate) fn element_to_layout_node(element: &Element) -> LayoutNode {
    LayoutNode {
        element: element.name.clone(),
        attributes: element
            .attributes
            .iter()
            .filter_map(convert_attribute)
            .collect(),
        children: element.children.iter().map(element_to_layout_node).collect(),
    }
}

#[allow(clippy::cast_possible_wrap)]
fn convert_attribute(attribute: &Attribute) -> Option<LayoutAttr> {
    let value = match &attribute.value {
        ResolvedValue::String(s) => AttrValue::Str(s.clone()),
        ResolvedValue::Int(i) => AttrValue::Int(*i as i32),
        ResolvedValue::Bool(b) => AttrValue::Bool(*b),
        ResolvedValue::Dimension(d) => AttrValue::Dim(*d),
        ResolvedValue::Float(f) => AttrValue::Dim(*f),
        ResolvedValue::Color(c) => AttrValue::Int(*c as i32),
        // `@id` references identify the view itself; other references
        // stay symbolic for the facade to chase.
        ResolvedValue::Reference(r) if attribute.name == "id" => AttrValue::Int(*r as i32),
        ResolvedValue::Reference(r) => AttrValue::Ref(*r),
        ResolvedValue::Null
        | ResolvedValue::Attribute(_)
        | ResolvedValue::Fraction(_)
        | ResolvedValue::Bag(_) => return None,
    };
    Some(LayoutAttr {
        name: attribute.name.clone(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_shim::view::{add_child, layout, measure, MeasureSpec, SpecMode, View, ViewKind};
    use dr_shim::widget;
    use std::cell::RefCell;
    use std::fs::{self, File};
    use std::io::Write as _;
    use zip_fixture::write_empty_apk;

    // A tiny zip writer for fixtures; only stored (uncompressed)
    // entries, which is all the container reader needs.
    mod zip_fixture {
        use super::*;

        pub fn write_empty_apk(path: &std::path::Path) {
            let file = File::create(path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file("assets/seed.bin", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(&[0u8; 4]).unwrap();
            writer.finish().unwrap();
        }
    }

    fn temp_apk(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("droidrunner-driver-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let apk = dir.join("fixture.apk");
        write_empty_apk(&apk);
        apk
    }

    struct ContentActivity;

    impl ActivityCallbacks for ContentActivity {
        fn on_create(&mut self, activity: &mut Activity) {
            let root = widget::frame_layout();
            let button = widget::button("go");
            button.borrow_mut().set_id(0x42);
            button
                .borrow_mut()
                .set_layout_params(dr_shim::view::LayoutParams::new(200, 100));
            add_child(&root, &button);
            activity.set_content_view(root);
        }
    }

    #[test]
    fn launch_without_manifest_needs_an_explicit_name() {
        let apk = temp_apk("nolauncher");
        let mut driver = Driver::load(&apk).unwrap();
        assert!(matches!(driver.launch(None), Err(DrError::NoLauncherActivity)));
        driver.close().unwrap();
    }

    #[test]
    fn launch_unknown_class_fails() {
        let apk = temp_apk("unknown");
        let mut driver = Driver::load(&apk).unwrap();
        assert!(matches!(
            driver.launch(Some("com.example.Missing")),
            Err(DrError::ActivityNotFound(_))
        ));
        driver.close().unwrap();
    }

    #[test]
    fn launch_tap_and_screenshot_through_a_factory() {
        let apk = temp_apk("factory");
        let mut driver = Driver::load(&apk).unwrap();
        driver.register_activity(
            "com.example.Main",
            Box::new(|| Box::new(ContentActivity)),
        );

        {
            let activity = driver.launch(Some("com.example.Main")).unwrap();
            assert_eq!(
                activity.state(),
                dr_shim::activity::LifecycleState::Resumed
            );
        }

        let clicks = Rc::new(RefCell::new(0u32));
        {
            let counter = Rc::clone(&clicks);
            let button = driver.find_view(0x42).unwrap();
            button.borrow_mut().set_on_click(Box::new(move || {
                *counter.borrow_mut() += 1;
            }));
        }

        assert!(driver.tap_view(0x42).unwrap());
        assert_eq!(*clicks.borrow(), 1);

        // Outside the window: silently not handled.
        assert!(!driver.tap(-5, 10).unwrap());
        assert_eq!(*clicks.borrow(), 1);

        let image = driver.screenshot().unwrap();
        assert_eq!(image.dimensions(), (480, 800));

        driver.destroy().unwrap();
        driver.close().unwrap();
    }

    #[test]
    fn absolute_center_accumulates_offsets() {
        let root = View::new(ViewKind::Frame);
        let inner = View::new(ViewKind::Frame);
        let leaf = View::new(ViewKind::Plain);
        leaf.borrow_mut()
            .set_layout_params(dr_shim::view::LayoutParams::new(10, 10));
        inner
            .borrow_mut()
            .set_layout_params(dr_shim::view::LayoutParams::new(100, 100));
        inner.borrow_mut().set_padding(20, 30, 0, 0);
        add_child(&root, &inner);
        add_child(&inner, &leaf);

        measure(
            &root,
            MeasureSpec::make(480, SpecMode::Exactly),
            MeasureSpec::make(800, SpecMode::Exactly),
        );
        layout(&root, 0, 0, 480, 800);

        // Leaf sits at (20, 30) inside inner, which sits at (0, 0).
        assert_eq!(absolute_center(&leaf), (25, 35));
    }

    #[test]
    fn layout_nodes_mirror_elements() {
        let element = Element {
            namespace: None,
            name: "TextView".to_string(),
            attributes: vec![
                Attribute {
                    namespace: None,
                    name: "id".to_string(),
                    raw: None,
                    value: ResolvedValue::Reference(0x7f08_0001),
                },
                Attribute {
                    namespace: None,
                    name: "text".to_string(),
                    raw: None,
                    value: ResolvedValue::Reference(0x7f01_0000),
                },
                Attribute {
                    namespace: None,
                    name: "clickable".to_string(),
                    raw: None,
                    value: ResolvedValue::Bool(true),
                },
            ],
            children: vec![],
            cdata: vec![],
        };

        let node = element_to_layout_node(&element);
        assert_eq!(node.element, "TextView");
        assert_eq!(node.attr("id"), Some(&AttrValue::Int(0x7f08_0001)));
        assert_eq!(node.attr("text"), Some(&AttrValue::Ref(0x7f01_0000)));
        assert_eq!(node.attr("clickable"), Some(&AttrValue::Bool(true)));
    }
}
