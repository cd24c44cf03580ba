//! Immutable element descriptions produced by application code.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::component::{Component, ComponentType};
use crate::props::{
    is_event_name, Event, Listener, PropValue, Props, StyleMap, CHILDREN, NODE_VALUE, STYLE,
};

/// Type tag of an element.
#[derive(Clone)]
pub enum ElementType {
    /// Primitive host node kind, e.g. `"div"`.
    Host(Arc<str>),
    /// Leaf text node.
    Text,
    Component(ComponentType),
}

impl ElementType {
    /// Host and text elements materialize as host nodes; components do not.
    pub fn is_host(&self) -> bool {
        !matches!(self, ElementType::Component(_))
    }

    pub fn label(&self) -> &str {
        match self {
            ElementType::Host(tag) => tag,
            ElementType::Text => "#text",
            ElementType::Component(component) => component.name(),
        }
    }
}

impl PartialEq for ElementType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ElementType::Host(a), ElementType::Host(b)) => a == b,
            (ElementType::Text, ElementType::Text) => true,
            (ElementType::Component(a), ElementType::Component(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ElementType {}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An immutable `{ type, props }` pair.
///
/// Cloning an element is cheap and keeps the identity of its property map,
/// which is what the reconciler compares when deciding whether a subtree
/// can be skipped.
#[derive(Clone)]
pub struct Element {
    ty: ElementType,
    props: Rc<Props>,
}

impl Element {
    pub fn host(tag: impl Into<Arc<str>>) -> ElementBuilder {
        ElementBuilder::new(ElementType::Host(tag.into()))
    }

    pub fn component<C: Component>() -> ElementBuilder {
        ElementBuilder::new(ElementType::Component(ComponentType::of::<C>()))
    }

    pub fn text(value: impl Into<Arc<str>>) -> Element {
        let mut attributes = IndexMap::new();
        attributes.insert(Arc::from(NODE_VALUE), PropValue::Str(value.into()));
        Element {
            ty: ElementType::Text,
            props: Rc::new(Props::from_parts(attributes, Vec::new())),
        }
    }

    pub fn ty(&self) -> &ElementType {
        &self.ty
    }

    pub fn props(&self) -> &Rc<Props> {
        &self.props
    }

    pub fn children(&self) -> &[Element] {
        self.props.children()
    }

    /// Returns whether both elements share the same property map allocation.
    pub fn same_props(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.props, &other.props)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("type", &self.ty)
            .field("props", &self.props)
            .finish()
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::text(value)
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::text(value)
    }
}

impl From<Arc<str>> for Element {
    fn from(value: Arc<str>) -> Self {
        Element::text(value)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Element::text(value.to_string())
    }
}

/// Malformed element description, reported when the element is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    InvalidTag { tag: String },
    EmptyPropName,
    ReservedProp { name: String },
    ListenerName { name: String },
    ExpectedListener { name: String, found: &'static str },
    ExpectedStyle { found: &'static str },
}

impl fmt::Display for ElementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementError::InvalidTag { tag } => write!(f, "invalid host tag {tag:?}"),
            ElementError::EmptyPropName => write!(f, "property name must not be empty"),
            ElementError::ReservedProp { name } => {
                write!(f, "property {name:?} is reserved")
            }
            ElementError::ListenerName { name } => {
                write!(f, "listener stored under {name:?}; listener names start with \"on\"")
            }
            ElementError::ExpectedListener { name, found } => {
                write!(f, "property {name:?} expects a listener, found {found}")
            }
            ElementError::ExpectedStyle { found } => {
                write!(f, "property \"style\" expects a style map, found {found}")
            }
        }
    }
}

impl std::error::Error for ElementError {}

/// Builder for host and component elements.
///
/// Validation is deferred to [`ElementBuilder::build`].
#[must_use]
pub struct ElementBuilder {
    ty: ElementType,
    attributes: IndexMap<Arc<str>, PropValue>,
    children: Vec<Element>,
}

impl ElementBuilder {
    fn new(ty: ElementType) -> Self {
        Self {
            ty,
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<Arc<str>>, value: impl Into<PropValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attaches a listener for `event`, stored under `on{event}`.
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        let name: Arc<str> = Arc::from(format!("on{event}"));
        self.attributes
            .insert(name, PropValue::Listener(Listener::new(handler)));
        self
    }

    pub fn style(mut self, key: impl Into<Arc<str>>, value: impl Into<Arc<str>>) -> Self {
        let entry = self
            .attributes
            .entry(Arc::from(STYLE))
            .or_insert_with(|| PropValue::Style(Rc::new(StyleMap::new())));
        if let PropValue::Style(style) = entry {
            Rc::make_mut(style).insert(key.into(), value.into());
        }
        self
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Adds `child` when present; absent children are skipped.
    pub fn maybe_child<C: Into<Element>>(self, child: Option<C>) -> Self {
        match child {
            Some(child) => self.child(child),
            None => self,
        }
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<Element, ElementError> {
        if let ElementType::Host(tag) = &self.ty {
            if tag.is_empty() || tag.chars().any(char::is_whitespace) {
                return Err(ElementError::InvalidTag {
                    tag: tag.to_string(),
                });
            }
        }
        for (name, value) in &self.attributes {
            validate_prop(name, value)?;
        }
        Ok(Element {
            ty: self.ty,
            props: Rc::new(Props::from_parts(self.attributes, self.children)),
        })
    }
}

fn validate_prop(name: &str, value: &PropValue) -> Result<(), ElementError> {
    if name.is_empty() {
        return Err(ElementError::EmptyPropName);
    }
    if name == CHILDREN {
        return Err(ElementError::ReservedProp {
            name: name.to_string(),
        });
    }
    match value {
        PropValue::Listener(_) if !is_event_name(name) => Err(ElementError::ListenerName {
            name: name.to_string(),
        }),
        PropValue::Listener(_) => Ok(()),
        PropValue::Style(_) if name == STYLE => Ok(()),
        other if name == STYLE => Err(ElementError::ExpectedStyle {
            found: other.kind_name(),
        }),
        other if is_event_name(name) => Err(ElementError::ExpectedListener {
            name: name.to_string(),
            found: other.kind_name(),
        }),
        _ => Ok(()),
    }
}
