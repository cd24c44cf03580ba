//! Property maps carried by elements and the delta a host adapter applies
//! when a node's properties change.
//!
//! Three kinds of entries live side by side in a [`Props`] map:
//!
//! * listeners, stored under keys starting with `on` (`onclick`),
//! * the inline style map, stored under [`STYLE`],
//! * plain attributes, everything else.
//!
//! Children are kept apart from the attribute map, so the reserved
//! [`CHILDREN`] key never reaches a host node.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::element::Element;

/// Reserved key naming the children sequence.
pub const CHILDREN: &str = "children";
/// Key holding the inline style map.
pub const STYLE: &str = "style";
/// Attribute carrying the content of a text node.
pub const NODE_VALUE: &str = "nodeValue";

pub type StyleMap = IndexMap<Arc<str>, Arc<str>>;

/// Returns whether a property name denotes an event listener.
pub fn is_event_name(name: &str) -> bool {
    name.starts_with("on")
}

/// Event type a listener property subscribes to: `onClick` -> `click`.
pub fn event_type(name: &str) -> String {
    name.get(2..).unwrap_or_default().to_ascii_lowercase()
}

fn is_attribute_name(name: &str) -> bool {
    !is_event_name(name) && name != CHILDREN && name != STYLE
}

/// Event delivered to a listener by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    kind: Arc<str>,
}

impl Event {
    pub fn new(kind: impl Into<Arc<str>>) -> Self {
        Self { kind: kind.into() }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// Shared event callback. Two listeners are the same only if they are the
/// same allocation.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new(callback: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Listener) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Value stored under a property or state key.
#[derive(Clone)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Style(Rc<StyleMap>),
    Listener(Listener),
    /// Opaque application data, compared by identity.
    Data(Rc<dyn Any>),
}

impl PropValue {
    pub fn data<T: Any>(value: T) -> Self {
        PropValue::Data(Rc::new(value))
    }

    /// Returns `true` when a host would see no difference between the two
    /// values: scalars compare by value, listeners and data by identity.
    pub fn same(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Style(a), PropValue::Style(b)) => Rc::ptr_eq(a, b) || a == b,
            (PropValue::Listener(a), PropValue::Listener(b)) => a.ptr_eq(b),
            (PropValue::Data(a), PropValue::Data(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Float(value) => Some(*value),
            PropValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_style(&self) -> Option<&StyleMap> {
        match self {
            PropValue::Style(style) => Some(style),
            _ => None,
        }
    }

    pub fn as_listener(&self) -> Option<&Listener> {
        match self {
            PropValue::Listener(listener) => Some(listener),
            _ => None,
        }
    }

    pub fn downcast_data<T: Any>(&self) -> Option<&T> {
        match self {
            PropValue::Data(data) => data.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            PropValue::Bool(_) => "bool",
            PropValue::Int(_) => "int",
            PropValue::Float(_) => "float",
            PropValue::Str(_) => "string",
            PropValue::Style(_) => "style",
            PropValue::Listener(_) => "listener",
            PropValue::Data(_) => "data",
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Str(value) => f.write_str(value),
            PropValue::Style(style) => {
                for (index, (key, value)) in style.iter().enumerate() {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{key}: {value};")?;
                }
                Ok(())
            }
            PropValue::Listener(_) => f.write_str("<listener>"),
            PropValue::Data(_) => f.write_str("<data>"),
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(value) => write!(f, "{value:?}"),
            PropValue::Listener(listener) => write!(f, "{listener:?}"),
            other => write!(f, "{other}"),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(Arc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(Arc::from(value))
    }
}

impl From<Arc<str>> for PropValue {
    fn from(value: Arc<str>) -> Self {
        PropValue::Str(value)
    }
}

impl From<StyleMap> for PropValue {
    fn from(value: StyleMap) -> Self {
        PropValue::Style(Rc::new(value))
    }
}

impl From<Listener> for PropValue {
    fn from(value: Listener) -> Self {
        PropValue::Listener(value)
    }
}

/// Immutable property mapping of an element, children included.
#[derive(Clone, Default)]
pub struct Props {
    attributes: IndexMap<Arc<str>, PropValue>,
    children: Vec<Element>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        attributes: IndexMap<Arc<str>, PropValue>,
        children: Vec<Element>,
    ) -> Self {
        Self {
            attributes,
            children,
        }
    }

    pub fn with_children(children: Vec<Element>) -> Self {
        Self {
            attributes: IndexMap::new(),
            children,
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropValue::as_int)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropValue::as_bool)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn style(&self) -> Option<&StyleMap> {
        self.get(STYLE).and_then(PropValue::as_style)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_ref(), value))
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("attributes", &self.attributes)
            .field("children", &self.children.len())
            .finish()
    }
}

/// One host-side mutation needed to move a node from one property map to
/// another.
#[derive(Clone, Debug)]
pub enum PropertyOp {
    RemoveListener { event: String, listener: Listener },
    RemoveAttribute { name: Arc<str> },
    SetAttribute { name: Arc<str>, value: PropValue },
    SetStyle { key: Arc<str>, value: Arc<str> },
    RemoveStyle { key: Arc<str> },
    AddListener { event: String, listener: Listener },
}

/// Ordered list of [`PropertyOp`]s between two property maps.
///
/// Stale listeners go first and new listeners last, so a host never holds
/// two generations of the same handler at once.
#[derive(Clone, Debug, Default)]
pub struct PropertyDelta {
    ops: Vec<PropertyOp>,
}

impl PropertyDelta {
    pub fn between(previous: &Props, next: &Props) -> Self {
        let mut ops = Vec::new();
        let changed = |name: &str, value: &PropValue, other: &Props| {
            other.get(name).map_or(true, |other| !value.same(other))
        };

        for (name, value) in previous.iter().filter(|(name, _)| is_event_name(name)) {
            if let Some(listener) = value.as_listener() {
                if changed(name, value, next) {
                    ops.push(PropertyOp::RemoveListener {
                        event: event_type(name),
                        listener: listener.clone(),
                    });
                }
            }
        }

        for (name, _) in previous.attributes.iter() {
            if is_attribute_name(name) && !next.contains(name) {
                ops.push(PropertyOp::RemoveAttribute {
                    name: Arc::clone(name),
                });
            }
        }

        for (name, value) in next.attributes.iter() {
            if is_attribute_name(name) && changed(name.as_ref(), value, previous) {
                ops.push(PropertyOp::SetAttribute {
                    name: Arc::clone(name),
                    value: value.clone(),
                });
            }
        }

        let empty = StyleMap::new();
        let previous_style = previous.style().unwrap_or(&empty);
        let next_style = next.style().unwrap_or(&empty);
        for (key, value) in next_style.iter() {
            if previous_style.get(key) != Some(value) {
                ops.push(PropertyOp::SetStyle {
                    key: Arc::clone(key),
                    value: Arc::clone(value),
                });
            }
        }
        for key in previous_style.keys() {
            if !next_style.contains_key(key) {
                ops.push(PropertyOp::RemoveStyle {
                    key: Arc::clone(key),
                });
            }
        }

        for (name, value) in next.iter().filter(|(name, _)| is_event_name(name)) {
            if let Some(listener) = value.as_listener() {
                if changed(name, value, previous) {
                    ops.push(PropertyOp::AddListener {
                        event: event_type(name),
                        listener: listener.clone(),
                    });
                }
            }
        }

        Self { ops }
    }

    pub fn ops(&self) -> &[PropertyOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

impl IntoIterator for PropertyDelta {
    type Item = PropertyOp;
    type IntoIter = std::vec::IntoIter<PropertyOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}
