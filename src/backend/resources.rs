// Resource stack
//
// Owns every handle the bootstrap creates. Handles are pushed right after
// creation and released newest-first, so dependents always go before the
// objects they were created from.

use super::api::{GraphicsApi, Resource};

/// Position in the stack that a partial release rewinds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackMark(usize);

#[derive(Debug, Default)]
pub struct ResourceStack {
    entries: Vec<Resource>,
}

impl ResourceStack {
    pub fn push(&mut self, resource: Resource) {
        log::trace!("Registered {:?}", resource);
        self.entries.push(resource);
    }

    pub fn mark(&self) -> StackMark {
        StackMark(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_device(&self) -> bool {
        self.entries
            .iter()
            .any(|resource| matches!(resource, Resource::Device(_)))
    }

    /// Destroy everything registered after `mark`, newest first
    pub fn release_to<A: GraphicsApi>(&mut self, api: &mut A, mark: StackMark) {
        while self.entries.len() > mark.0 {
            let Some(resource) = self.entries.pop() else {
                break;
            };

            // In-flight work may still reference anything created from the device
            if matches!(resource, Resource::Device(_)) {
                if let Err(e) = api.device_wait_idle() {
                    log::warn!("Device wait idle failed before destroy: {:#}", e);
                }
            }

            log::debug!("Destroying {:?}", resource);
            api.destroy(resource);
        }
    }

    pub fn release_all<A: GraphicsApi>(&mut self, api: &mut A) {
        self.release_to(api, StackMark::default());
    }
}
