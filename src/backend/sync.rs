// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync
// Critical for correct and efficient multi-frame rendering

use anyhow::Result;
use ash::vk;

use super::api::{GraphicsApi, Resource};
use super::resources::ResourceStack;

/// Frame synchronization - one per frame in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new<A: GraphicsApi>(api: &mut A, resources: &mut ResourceStack) -> Result<Self> {
        let image_available = api.create_semaphore()?;
        resources.push(Resource::Semaphore(image_available));
        let render_finished = api.create_semaphore()?;
        resources.push(Resource::Semaphore(render_finished));
        // Start signaled so the first wait on each slot returns immediately
        let in_flight_fence = api.create_fence(true)?;
        resources.push(Resource::Fence(in_flight_fence));

        Ok(Self {
            image_available,
            render_finished,
            in_flight_fence,
        })
    }
}

/// The ring of frames in flight
#[derive(Debug, Default)]
pub struct FrameSlots {
    slots: Vec<FrameSync>,
    /// Frames submitted since the slots were created
    submitted: u64,
    /// Fence of the slot that last rendered each swapchain image
    image_fences: Vec<Option<vk::Fence>>,
}

impl FrameSlots {
    pub fn new<A: GraphicsApi>(
        api: &mut A,
        resources: &mut ResourceStack,
        frames_in_flight: usize,
        image_count: usize,
    ) -> Result<Self> {
        let slots = (0..frames_in_flight)
            .map(|_| FrameSync::new(api, resources))
            .collect::<Result<Vec<_>>>()?;

        log::info!("Created {} frame sync slots", slots.len());

        Ok(Self {
            slots,
            submitted: 0,
            image_fences: vec![None; image_count],
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub fn slot(&self, index: usize) -> Option<&FrameSync> {
        self.slots.get(index)
    }

    pub fn current_index(&self) -> usize {
        (self.submitted % self.slots.len().max(1) as u64) as usize
    }

    pub fn current(&self) -> Option<FrameSync> {
        self.slots.get(self.current_index()).copied()
    }

    #[cfg(test)]
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Hand `image_index` to `fence`, returning the fence of another slot
    /// whose submission may still be rendering that image
    pub fn claim_image(&mut self, image_index: usize, fence: vk::Fence) -> Option<vk::Fence> {
        let entry = self.image_fences.get_mut(image_index)?;
        let previous = entry.replace(fence);
        previous.filter(|&prev| prev != fence)
    }

    pub fn advance(&mut self) {
        self.submitted += 1;
    }
}
