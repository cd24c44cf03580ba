//! Stateful components and the handles they use to request updates.

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::element::{Element, ElementError};
use crate::props::{PropValue, Props};
use crate::runtime::{RuntimeHandle, UpdateRequest};
use crate::work_tree::{FiberId, RootId};

slotmap::new_key_type! {
    /// Key of a mounted component instance.
    pub struct InstanceId;
}

/// Component state: a flat map merged shallowly by partial updates.
#[derive(Clone, Default)]
pub struct State {
    fields: IndexMap<Arc<str>, PropValue>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<Arc<str>>, value: impl Into<PropValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<Arc<str>>, value: impl Into<PropValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.fields.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(PropValue::as_int)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(PropValue::as_bool)
    }

    /// Overwrites the keys present in `partial`, keeping all others.
    pub fn merge(&mut self, partial: &State) {
        for (key, value) in &partial.fields {
            self.fields.insert(Arc::clone(key), value.clone());
        }
    }

    pub fn merged(&self, partial: &State) -> State {
        let mut next = self.clone();
        next.merge(partial);
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.fields.iter().map(|(key, value)| (key.as_ref(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for State
where
    K: Into<Arc<str>>,
    V: Into<PropValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut state = State::new();
        for (key, value) in iter {
            state.set(key, value);
        }
        state
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

/// A stateful unit of UI that renders to child elements.
///
/// An instance is created once when its element first mounts and lives
/// until the element is removed. Between renders the reconciler keeps the
/// committed props and state; `render` sees the values about to be
/// committed through the [`RenderContext`].
pub trait Component: 'static {
    fn create(props: &Props) -> Self
    where
        Self: Sized;

    fn initial_state(_props: &Props) -> State
    where
        Self: Sized,
    {
        State::new()
    }

    fn render(&mut self, cx: &RenderContext<'_>) -> Result<Vec<Element>, RenderError>;
}

type Constructor = fn(&Props) -> (Box<dyn Component>, State);

fn construct<C: Component>(props: &Props) -> (Box<dyn Component>, State) {
    let state = C::initial_state(props);
    (Box::new(C::create(props)), state)
}

/// Identity of a component type, usable as an element type tag.
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
    construct: Constructor,
}

impl ComponentType {
    pub fn of<C: Component>() -> Self {
        let full = std::any::type_name::<C>();
        let name = full.rsplit("::").next().unwrap_or(full);
        Self {
            id: TypeId::of::<C>(),
            name,
            construct: construct::<C>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn instantiate(&self, props: &Props) -> (Box<dyn Component>, State) {
        (self.construct)(props)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// What a component sees while rendering.
pub struct RenderContext<'a> {
    props: &'a Props,
    state: &'a State,
    updater: StateUpdater,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(props: &'a Props, state: &'a State, updater: StateUpdater) -> Self {
        Self {
            props,
            state,
            updater,
        }
    }

    pub fn props(&self) -> &Props {
        self.props
    }

    pub fn state(&self) -> &State {
        self.state
    }

    pub fn children(&self) -> &[Element] {
        self.props.children()
    }

    /// Handle for scheduling state updates from event listeners.
    pub fn updater(&self) -> StateUpdater {
        self.updater.clone()
    }
}

/// Schedules partial state updates for one component instance.
#[derive(Clone)]
pub struct StateUpdater {
    instance: InstanceId,
    runtime: RuntimeHandle,
}

impl StateUpdater {
    pub(crate) fn new(instance: InstanceId, runtime: RuntimeHandle) -> Self {
        Self { instance, runtime }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Queues `partial` to be merged into the instance state and asks the
    /// scheduler for a work callback. Returns `false` when the runtime is
    /// gone.
    pub fn request_state_update(&self, partial: State) -> bool {
        self.runtime.enqueue(UpdateRequest::Component {
            instance: self.instance,
            partial_state: partial,
        })
    }
}

impl fmt::Debug for StateUpdater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateUpdater")
            .field("instance", &self.instance)
            .field("alive", &self.runtime.is_alive())
            .finish()
    }
}

/// Failure raised by a component's `render`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RenderError {}

impl From<ElementError> for RenderError {
    fn from(err: ElementError) -> Self {
        RenderError::new(err.to_string())
    }
}

/// Long-lived component instance. Props and state hold the committed
/// values; in-flight renders never write here.
pub(crate) struct Instance {
    pub(crate) component: Box<dyn Component>,
    pub(crate) ty: ComponentType,
    pub(crate) props: Rc<Props>,
    pub(crate) state: State,
    /// Committed node of this instance, `None` until first commit.
    pub(crate) fiber: Option<FiberId>,
    pub(crate) root: RootId,
}
