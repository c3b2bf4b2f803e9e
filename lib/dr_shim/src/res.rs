//! The resource façade seen by the shim.
//!
//! The shim never touches binary formats: it consumes the pure
//! [`ResourceResolver`] interface, and the loader injects the concrete
//! implementation after construction. Layout documents cross the
//! boundary as pre-decoded [`LayoutNode`] trees, which the inflater
//! turns into views.

use crate::errors::{ShimError, ShimResult};
use crate::view::{add_child, LayoutParams, Orientation, ViewRef, Visibility};
use crate::widget;

/// Typed attribute values of a layout node.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i32),
    Bool(bool),
    Dim(f32),
    /// A reference to another resource by id.
    Ref(u32),
}

#[derive(Debug, Clone)]
pub struct LayoutAttr {
    pub name: String,
    pub value: AttrValue,
}

/// One element of a decoded layout document.
#[derive(Debug, Clone, Default)]
pub struct LayoutNode {
    /// The element name, e.g. `LinearLayout` or a fully qualified class.
    pub element: String,
    pub attributes: Vec<LayoutAttr>,
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}

/// Resolution of resources by id, injected by the loader.
pub trait ResourceResolver {
    fn string(&self, id: u32) -> ShimResult<String>;
    fn boolean(&self, id: u32) -> ShimResult<bool>;
    fn integer(&self, id: u32) -> ShimResult<i32>;
    fn dimension(&self, id: u32) -> ShimResult<f32>;
    fn color(&self, id: u32) -> ShimResult<u32>;
    fn layout(&self, id: u32) -> ShimResult<LayoutNode>;
}

/// A resolver with no resources behind it; every lookup misses.
pub struct EmptyResources;

impl ResourceResolver for EmptyResources {
    fn string(&self, id: u32) -> ShimResult<String> {
        Err(ShimError::ResourceMissing(format!("string {id:#010x}")))
    }

    fn boolean(&self, id: u32) -> ShimResult<bool> {
        Err(ShimError::ResourceMissing(format!("bool {id:#010x}")))
    }

    fn integer(&self, id: u32) -> ShimResult<i32> {
        Err(ShimError::ResourceMissing(format!("integer {id:#010x}")))
    }

    fn dimension(&self, id: u32) -> ShimResult<f32> {
        Err(ShimError::ResourceMissing(format!("dimen {id:#010x}")))
    }

    fn color(&self, id: u32) -> ShimResult<u32> {
        Err(ShimError::ResourceMissing(format!("color {id:#010x}")))
    }

    fn layout(&self, id: u32) -> ShimResult<LayoutNode> {
        Err(ShimError::ResourceMissing(format!("layout {id:#010x}")))
    }
}

/// Inflates a layout tree into a view tree.
pub fn inflate(node: &LayoutNode, resources: &dyn ResourceResolver) -> ShimResult<ViewRef> {
    let view = match widget_name(&node.element) {
        "LinearLayout" => {
            let orientation = match node.attr("orientation") {
                Some(AttrValue::Str(s)) if s == "horizontal" => Orientation::Horizontal,
                Some(AttrValue::Int(0)) => Orientation::Horizontal,
                _ => Orientation::Vertical,
            };
            widget::linear_layout(orientation)
        }
        "FrameLayout" | "ViewGroup" => widget::frame_layout(),
        "TextView" => widget::text_view(&text_of(node, resources)?),
        "Button" => widget::button(&text_of(node, resources)?),
        "View" => widget::frame_layout(),
        other => {
            // Unknown (often fully-qualified custom) elements inflate as
            // plain containers so the surrounding layout keeps working.
            log::debug!("inflating unknown element {other} as a frame");
            widget::frame_layout()
        }
    };

    apply_attributes(&view, node, resources)?;

    for child_node in &node.children {
        let child = inflate(child_node, resources)?;
        add_child(&view, &child);
    }
    Ok(view)
}

fn widget_name(element: &str) -> &str {
    element
        .rsplit(['.', '/'])
        .next()
        .unwrap_or(element)
}

fn text_of(node: &LayoutNode, resources: &dyn ResourceResolver) -> ShimResult<String> {
    match node.attr("text") {
        Some(AttrValue::Str(s)) => Ok(s.clone()),
        Some(AttrValue::Ref(id)) => resources.string(*id),
        Some(other) => Err(ShimError::Inflate(format!(
            "text attribute has unusable value {other:?}"
        ))),
        None => Ok(String::new()),
    }
}

fn apply_attributes(
    view: &ViewRef,
    node: &LayoutNode,
    resources: &dyn ResourceResolver,
) -> ShimResult<()> {
    let mut v = view.borrow_mut();

    if let Some(AttrValue::Int(id)) = node.attr("id") {
        v.set_id(*id);
    }

    let mut params = v.layout_params();
    if let Some(width) = dimension_attr(node, "layout_width", resources)? {
        params.width = width;
    }
    if let Some(height) = dimension_attr(node, "layout_height", resources)? {
        params.height = height;
    }
    v.set_layout_params(params);

    match node.attr("visibility") {
        Some(AttrValue::Str(s)) if s == "gone" => v.set_visibility(Visibility::Gone),
        Some(AttrValue::Str(s)) if s == "invisible" => v.set_visibility(Visibility::Invisible),
        Some(AttrValue::Int(1)) => v.set_visibility(Visibility::Invisible),
        Some(AttrValue::Int(2)) => v.set_visibility(Visibility::Gone),
        _ => {}
    }

    if let Some(AttrValue::Bool(clickable)) = node.attr("clickable") {
        v.set_clickable(*clickable);
    }

    match node.attr("background") {
        Some(AttrValue::Int(color)) => v.set_background_color(*color as u32),
        Some(AttrValue::Ref(id)) => v.set_background_color(resources.color(*id)?),
        _ => {}
    }

    Ok(())
}

fn dimension_attr(
    node: &LayoutNode,
    name: &str,
    resources: &dyn ResourceResolver,
) -> ShimResult<Option<i32>> {
    let value = match node.attr(name) {
        None => None,
        Some(AttrValue::Str(s)) if s == "match_parent" || s == "fill_parent" => {
            Some(LayoutParams::MATCH_PARENT)
        }
        Some(AttrValue::Str(s)) if s == "wrap_content" => Some(LayoutParams::WRAP_CONTENT),
        Some(AttrValue::Int(px)) => Some(*px),
        Some(AttrValue::Dim(px)) => Some(px.round() as i32),
        Some(AttrValue::Ref(id)) => Some(resources.dimension(*id)?.round() as i32),
        Some(other) => {
            return Err(ShimError::Inflate(format!(
                "{name} has unusable value {other:?}"
            )))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{find_view_by_id, measure, layout, MeasureSpec, SpecMode};

    fn attr(name: &str, value: AttrValue) -> LayoutAttr {
        LayoutAttr {
            name: name.to_string(),
            value,
        }
    }

    fn node(element: &str, attributes: Vec<LayoutAttr>, children: Vec<LayoutNode>) -> LayoutNode {
        LayoutNode {
            element: element.to_string(),
            attributes,
            children,
        }
    }

    #[test]
    fn inflates_a_nested_layout() {
        let tree = node(
            "LinearLayout",
            vec![
                attr("layout_width", AttrValue::Str("match_parent".to_string())),
                attr("layout_height", AttrValue::Str("match_parent".to_string())),
            ],
            vec![
                node(
                    "TextView",
                    vec![
                        attr("id", AttrValue::Int(10)),
                        attr("text", AttrValue::Str("hello".to_string())),
                    ],
                    vec![],
                ),
                node(
                    "Button",
                    vec![
                        attr("id", AttrValue::Int(11)),
                        attr("text", AttrValue::Str("go".to_string())),
                    ],
                    vec![],
                ),
            ],
        );

        let root = inflate(&tree, &EmptyResources).unwrap();
        measure(
            &root,
            MeasureSpec::make(480, SpecMode::Exactly),
            MeasureSpec::make(800, SpecMode::Exactly),
        );
        layout(&root, 0, 0, 480, 800);

        let text = find_view_by_id(&root, 10).unwrap();
        assert_eq!(text.borrow().text(), Some("hello"));

        let button = find_view_by_id(&root, 11).unwrap();
        assert!(button.borrow().is_clickable());
        // The button sits below the text view in a vertical strip.
        assert!(button.borrow().frame().1 > 0);
    }

    #[test]
    fn string_references_resolve_through_the_facade() {
        struct OneString;

        impl ResourceResolver for OneString {
            fn string(&self, id: u32) -> ShimResult<String> {
                if id == 0x7f01_0000 {
                    Ok("resolved".to_string())
                } else {
                    Err(ShimError::ResourceMissing(format!("{id:#x}")))
                }
            }
            fn boolean(&self, _: u32) -> ShimResult<bool> {
                unimplemented!()
            }
            fn integer(&self, _: u32) -> ShimResult<i32> {
                unimplemented!()
            }
            fn dimension(&self, _: u32) -> ShimResult<f32> {
                unimplemented!()
            }
            fn color(&self, _: u32) -> ShimResult<u32> {
                unimplemented!()
            }
            fn layout(&self, _: u32) -> ShimResult<LayoutNode> {
                unimplemented!()
            }
        }

        let tree = node(
            "TextView",
            vec![attr("text", AttrValue::Ref(0x7f01_0000))],
            vec![],
        );
        let view = inflate(&tree, &OneString).unwrap();
        assert_eq!(view.borrow().text(), Some("resolved"));
    }

    #[test]
    fn missing_resource_surfaces() {
        let tree = node(
            "TextView",
            vec![attr("text", AttrValue::Ref(0x7f01_0099))],
            vec![],
        );
        assert!(matches!(
            inflate(&tree, &EmptyResources),
            Err(ShimError::ResourceMissing(_))
        ));
    }

    #[test]
    fn gone_visibility_applies() {
        let tree = node(
            "View",
            vec![attr("visibility", AttrValue::Str("gone".to_string()))],
            vec![],
        );
        let view = inflate(&tree, &EmptyResources).unwrap();
        assert_eq!(view.borrow().visibility(), Visibility::Gone);
    }
}
