//! Framework reference rewriting.
//!
//! Guest code refers to the platform by internal name (`android/*`,
//! `androidx/*`, `android/support/*`). The rewriter substitutes those
//! references with their shim counterparts everywhere a class unit can
//! carry one: super name, interfaces, field and method descriptors, and
//! constant pool entries. The mapping is a fixed table; nested class
//! names map through their outer name with the `$` suffix preserved.
//! Names outside the mapped prefixes pass through untouched, which also
//! makes the rewrite idempotent.

use crate::host::{ConstEntry, HostClass, HostField, HostMethod};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// The shim namespace prefix.
pub const SHIM_PREFIX: &str = "com/droidrunner/shim";

const MAPPED_PREFIXES: [&str; 3] = ["android/", "androidx/", "android/support/"];

lazy_static! {
    static ref FRAMEWORK_MAP: HashMap<&'static str, String> = {
        let entries: &[(&str, &str)] = &[
            // app / content
            ("android/app/Activity", "activity/Activity"),
            ("android/app/Application", "app/Application"),
            ("android/content/Context", "content/Context"),
            ("android/content/Intent", "content/Intent"),
            ("android/content/res/Resources", "res/Resources"),
            ("android/os/Bundle", "os/Bundle"),
            ("android/os/Handler", "os/Handler"),
            ("android/os/Looper", "os/Looper"),
            ("android/util/Log", "util/Log"),
            ("android/util/AttributeSet", "util/AttributeSet"),
            // view
            ("android/view/View", "view/View"),
            ("android/view/ViewGroup", "view/ViewGroup"),
            ("android/view/Window", "view/Window"),
            ("android/view/MotionEvent", "view/MotionEvent"),
            ("android/view/LayoutInflater", "view/LayoutInflater"),
            // widget
            ("android/widget/TextView", "widget/TextView"),
            ("android/widget/Button", "widget/Button"),
            ("android/widget/EditText", "widget/EditText"),
            ("android/widget/ImageView", "widget/ImageView"),
            ("android/widget/FrameLayout", "widget/FrameLayout"),
            ("android/widget/LinearLayout", "widget/LinearLayout"),
            ("android/widget/RelativeLayout", "widget/RelativeLayout"),
            ("android/widget/ScrollView", "widget/ScrollView"),
            ("android/widget/ListView", "widget/ListView"),
            ("android/widget/Toast", "widget/Toast"),
            // fragments (androidx and the legacy support names)
            ("androidx/fragment/app/Fragment", "app/Fragment"),
            ("androidx/fragment/app/FragmentActivity", "app/FragmentActivity"),
            ("androidx/fragment/app/FragmentManager", "app/FragmentManager"),
            (
                "androidx/fragment/app/FragmentTransaction",
                "app/FragmentTransaction",
            ),
            ("android/support/v4/app/Fragment", "app/Fragment"),
            ("android/support/v4/app/FragmentActivity", "app/FragmentActivity"),
            ("android/support/v4/app/FragmentManager", "app/FragmentManager"),
            (
                "android/support/v4/app/FragmentTransaction",
                "app/FragmentTransaction",
            ),
            // appcompat collapses onto the fragment activity shim
            ("androidx/appcompat/app/AppCompatActivity", "app/FragmentActivity"),
            ("android/support/v7/app/AppCompatActivity", "app/FragmentActivity"),
            ("androidx/appcompat/widget/AppCompatTextView", "widget/TextView"),
            ("androidx/appcompat/widget/AppCompatButton", "widget/Button"),
            // recycler / pager
            ("androidx/recyclerview/widget/RecyclerView", "widget/RecyclerView"),
            (
                "androidx/recyclerview/widget/LinearLayoutManager",
                "widget/RecyclerView$LinearLayoutManager",
            ),
            ("android/support/v7/widget/RecyclerView", "widget/RecyclerView"),
            (
                "android/support/v7/widget/LinearLayoutManager",
                "widget/RecyclerView$LinearLayoutManager",
            ),
            ("androidx/viewpager/widget/ViewPager", "widget/ViewPager"),
            ("androidx/viewpager/widget/PagerAdapter", "widget/PagerAdapter"),
            ("android/support/v4/view/ViewPager", "widget/ViewPager"),
            ("android/support/v4/view/PagerAdapter", "widget/PagerAdapter"),
        ];
        entries
            .iter()
            .map(|(from, to)| (*from, format!("{SHIM_PREFIX}/{to}")))
            .collect()
    };
}

/// Maps a framework internal name to its shim counterpart. Names outside
/// the `android/`, `androidx/` and `android/support/` prefixes are
/// returned unchanged, as are framework names with no table entry.
#[must_use]
pub fn map_internal_name(name: &str) -> String {
    if !MAPPED_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return name.to_string();
    }

    // Nested classes map through their outer class.
    let (outer, nested) = match name.find('$') {
        Some(pos) => (&name[..pos], Some(&name[pos..])),
        None => (name, None),
    };

    match FRAMEWORK_MAP.get(outer) {
        Some(mapped) => match nested {
            Some(suffix) => format!("{mapped}{suffix}"),
            None => mapped.clone(),
        },
        None => name.to_string(),
    }
}

/// Rewrites every class reference inside a type or method descriptor.
#[must_use]
pub fn map_descriptor(descriptor: &str) -> String {
    let mut out = String::with_capacity(descriptor.len());
    let mut rest = descriptor;
    while let Some(pos) = rest.find('L') {
        let Some(end) = rest[pos..].find(';') else {
            break;
        };
        out.push_str(&rest[..pos + 1]);
        out.push_str(&map_internal_name(&rest[pos + 1..pos + end]));
        out.push(';');
        rest = &rest[pos + end + 1..];
    }
    out.push_str(rest);
    out
}

/// Rewrites a whole class unit. The input is consumed; the result shares
/// no state with it.
#[must_use]
pub fn rewrite_class(class: HostClass) -> HostClass {
    let pool = class.pool.map_entries(|entry| match entry {
        ConstEntry::Str(s) => ConstEntry::Str(s.clone()),
        ConstEntry::ClassRef(name) => ConstEntry::ClassRef(map_type_ref(name)),
        ConstEntry::FieldRef {
            owner,
            name,
            descriptor,
        } => ConstEntry::FieldRef {
            owner: map_type_ref(owner),
            name: name.clone(),
            descriptor: map_descriptor(descriptor),
        },
        ConstEntry::MethodRef {
            owner,
            name,
            descriptor,
            interface,
        } => ConstEntry::MethodRef {
            owner: map_type_ref(owner),
            name: name.clone(),
            descriptor: map_descriptor(descriptor),
            interface: *interface,
        },
        ConstEntry::ArrayData { element_width, data } => ConstEntry::ArrayData {
            element_width: *element_width,
            data: data.clone(),
        },
    });

    HostClass {
        name: map_internal_name(&class.name),
        super_name: class.super_name.as_deref().map(map_internal_name),
        interfaces: class
            .interfaces
            .iter()
            .map(|i| map_internal_name(i))
            .collect(),
        access: class.access,
        fields: class
            .fields
            .into_iter()
            .map(|f| HostField {
                descriptor: map_descriptor(&f.descriptor),
                ..f
            })
            .collect(),
        methods: class
            .methods
            .into_iter()
            .map(|m| HostMethod {
                descriptor: map_descriptor(&m.descriptor),
                ..m
            })
            .collect(),
        pool,
    }
}

// Class references may be plain internal names or array descriptors.
fn map_type_ref(name: &str) -> String {
    if name.starts_with('[') || (name.starts_with('L') && name.ends_with(';')) {
        map_descriptor(name)
    } else {
        map_internal_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ConstPool;

    #[test]
    fn canonical_mappings() {
        assert_eq!(
            map_internal_name("android/app/Activity"),
            "com/droidrunner/shim/activity/Activity"
        );
        assert_eq!(
            map_internal_name("android/view/View"),
            "com/droidrunner/shim/view/View"
        );
        assert_eq!(
            map_internal_name("androidx/fragment/app/Fragment"),
            "com/droidrunner/shim/app/Fragment"
        );
        assert_eq!(
            map_internal_name("androidx/appcompat/app/AppCompatActivity"),
            "com/droidrunner/shim/app/FragmentActivity"
        );
        assert_eq!(
            map_internal_name("androidx/recyclerview/widget/LinearLayoutManager"),
            "com/droidrunner/shim/widget/RecyclerView$LinearLayoutManager"
        );
    }

    #[test]
    fn names_outside_prefixes_pass_through() {
        assert_eq!(map_internal_name("com/example/Foo"), "com/example/Foo");
        assert_eq!(map_internal_name("java/lang/String"), "java/lang/String");
        assert_eq!(
            map_internal_name("androids/not/Framework"),
            "androids/not/Framework"
        );
    }

    #[test]
    fn nested_suffix_is_preserved() {
        assert_eq!(
            map_internal_name("androidx/recyclerview/widget/RecyclerView$Adapter"),
            "com/droidrunner/shim/widget/RecyclerView$Adapter"
        );
        assert_eq!(
            map_internal_name("android/view/View$OnClickListener"),
            "com/droidrunner/shim/view/View$OnClickListener"
        );
    }

    #[test]
    fn mapping_is_idempotent() {
        for name in [
            "android/app/Activity",
            "androidx/recyclerview/widget/LinearLayoutManager",
            "com/example/Foo",
            "android/widget/TextView$SavedState",
        ] {
            let once = map_internal_name(name);
            let twice = map_internal_name(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn descriptors_rewrite_embedded_classes() {
        assert_eq!(
            map_descriptor("(Landroid/view/View;I)Landroid/app/Activity;"),
            "(Lcom/droidrunner/shim/view/View;I)Lcom/droidrunner/shim/activity/Activity;"
        );
        assert_eq!(
            map_descriptor("[Landroid/widget/TextView;"),
            "[Lcom/droidrunner/shim/widget/TextView;"
        );
        assert_eq!(map_descriptor("(IJ)V"), "(IJ)V");
    }

    #[test]
    fn rewrite_class_touches_every_surface() {
        let mut pool = ConstPool::new();
        let method_cp = pool.intern(ConstEntry::MethodRef {
            owner: "android/app/Activity".to_string(),
            name: "setContentView".to_string(),
            descriptor: "(I)V".to_string(),
            interface: false,
        });

        let class = HostClass {
            name: "com/example/Main".to_string(),
            super_name: Some("androidx/appcompat/app/AppCompatActivity".to_string()),
            interfaces: vec!["android/view/View$OnClickListener".to_string()],
            access: 0x1,
            fields: vec![HostField {
                name: "label".to_string(),
                descriptor: "Landroid/widget/TextView;".to_string(),
                access: 0x2,
            }],
            methods: vec![HostMethod {
                name: "onClick".to_string(),
                descriptor: "(Landroid/view/View;)V".to_string(),
                access: 0x1,
                body: None,
            }],
            pool,
        };

        let rewritten = rewrite_class(class);
        assert_eq!(rewritten.name, "com/example/Main");
        assert_eq!(
            rewritten.super_name.as_deref(),
            Some("com/droidrunner/shim/app/FragmentActivity")
        );
        assert_eq!(
            rewritten.interfaces,
            vec!["com/droidrunner/shim/view/View$OnClickListener".to_string()]
        );
        assert_eq!(
            rewritten.fields[0].descriptor,
            "Lcom/droidrunner/shim/widget/TextView;"
        );
        assert_eq!(
            rewritten.methods[0].descriptor,
            "(Lcom/droidrunner/shim/view/View;)V"
        );
        match rewritten.pool.get(method_cp).unwrap() {
            ConstEntry::MethodRef { owner, .. } => {
                assert_eq!(owner, "com/droidrunner/shim/activity/Activity");
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn rewrite_class_is_idempotent() {
        let class = HostClass {
            name: "com/example/Main".to_string(),
            super_name: Some("android/app/Activity".to_string()),
            interfaces: vec![],
            access: 0x1,
            fields: vec![],
            methods: vec![],
            pool: ConstPool::new(),
        };
        let once = rewrite_class(class);
        let twice = rewrite_class(HostClass {
            name: once.name.clone(),
            super_name: once.super_name.clone(),
            interfaces: once.interfaces.clone(),
            access: once.access,
            fields: vec![],
            methods: vec![],
            pool: ConstPool::new(),
        });
        assert_eq!(once.super_name, twice.super_name);
    }
}
