use fiber_core::collections::map::FastMap;
use fiber_core::{HostAdapter, HostError, HostOperation, Props};

#[derive(Clone, Copy, Debug)]
struct Fault {
    operation: HostOperation,
    successes_left: usize,
}

/// Host adapter wrapper that fails one chosen operation on demand.
#[derive(Debug)]
pub struct FaultyHost<H> {
    inner: H,
    fault: Option<Fault>,
    calls: FastMap<HostOperation, usize>,
}

impl<H: HostAdapter> FaultyHost<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            fault: None,
            calls: FastMap::default(),
        }
    }

    /// Lets `successes` calls of `operation` through, then fails the next
    /// one. The fault disarms itself after firing.
    pub fn fail_after(&mut self, operation: HostOperation, successes: usize) {
        self.fault = Some(Fault {
            operation,
            successes_left: successes,
        });
    }

    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    pub fn is_armed(&self) -> bool {
        self.fault.is_some()
    }

    /// Calls of `operation` that reached the wrapped host.
    pub fn calls(&self, operation: HostOperation) -> usize {
        self.calls.get(&operation).copied().unwrap_or(0)
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    pub fn into_inner(self) -> H {
        self.inner
    }

    fn check(&mut self, operation: HostOperation) -> Result<(), HostError> {
        if let Some(fault) = self.fault.as_mut() {
            if fault.operation == operation {
                if fault.successes_left == 0 {
                    self.fault = None;
                    return Err(HostError::Rejected {
                        operation,
                        reason: "injected fault".to_string(),
                    });
                }
                fault.successes_left -= 1;
            }
        }
        *self.calls.entry(operation).or_insert(0) += 1;
        Ok(())
    }
}

impl<H: HostAdapter> HostAdapter for FaultyHost<H> {
    type Handle = H::Handle;

    fn create_node(&mut self, tag: &str) -> Result<Self::Handle, HostError> {
        self.check(HostOperation::CreateNode)?;
        self.inner.create_node(tag)
    }

    fn create_text_node(&mut self, text: &str) -> Result<Self::Handle, HostError> {
        self.check(HostOperation::CreateTextNode)?;
        self.inner.create_text_node(text)
    }

    fn apply_properties(
        &mut self,
        node: &Self::Handle,
        previous: &Props,
        next: &Props,
    ) -> Result<(), HostError> {
        self.check(HostOperation::ApplyProperties)?;
        self.inner.apply_properties(node, previous, next)
    }

    fn append_child(&mut self, parent: &Self::Handle, child: &Self::Handle) -> Result<(), HostError> {
        self.check(HostOperation::AppendChild)?;
        self.inner.append_child(parent, child)
    }

    fn replace_child(
        &mut self,
        parent: &Self::Handle,
        new_child: &Self::Handle,
        old_child: &Self::Handle,
    ) -> Result<(), HostError> {
        self.check(HostOperation::ReplaceChild)?;
        self.inner.replace_child(parent, new_child, old_child)
    }

    fn remove_child(&mut self, parent: &Self::Handle, child: &Self::Handle) -> Result<(), HostError> {
        self.check(HostOperation::RemoveChild)?;
        self.inner.remove_child(parent, child)
    }
}
