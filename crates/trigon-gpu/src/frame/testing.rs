//! In-memory backend for exercising the frame core without a GPU.
//!
//! GPU work completes lazily: a submission finishes at the moment its fence is
//! waited on, or on `wait_idle`. Every operation ticks a logical clock, so
//! tests can compare when submissions started and finished. Misuse of the
//! synchronization objects is collected in `violations` instead of panicking.

use std::collections::{HashMap, HashSet, VecDeque};

use ash::vk;

use crate::error::{GpuError, Result};
use crate::frame::{AcquireOutcome, PresentBackend, PresentOutcome, SwapchainResources, SyncDevice};
use crate::surface::SurfaceCapabilities;
use crate::swapchain::SwapchainPlan;

pub const fn extent(width: u32, height: u32) -> vk::Extent2D {
    vk::Extent2D { width, height }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FakeSemaphore(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FakeFence(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeResources {
    pub id: u32,
    pub extent: vk::Extent2D,
    pub image_count: usize,
}

impl SwapchainResources for FakeResources {
    fn image_count(&self) -> usize {
        self.image_count
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub image_index: u32,
    pub fence: FakeFence,
    pub resources: u32,
    pub submitted_at: u64,
    pub completed_at: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct Created {
    pub id: u32,
    pub extent: vk::Extent2D,
    pub image_count: usize,
    pub at: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Destroyed {
    pub id: u32,
    pub at: u64,
}

#[derive(Debug, Default)]
struct FenceState {
    signaled: bool,
    pending: Option<usize>,
}

pub struct FakeBackend {
    clock: u64,
    next_handle: u32,
    fences: HashMap<FakeFence, FenceState>,
    /// Semaphores with a signal that nobody has waited on yet.
    semaphores: HashMap<FakeSemaphore, bool>,
    live: HashSet<u32>,
    acquire_queue: VecDeque<AcquireOutcome>,
    present_queue: VecDeque<PresentOutcome>,
    next_image: u32,

    pub capabilities: SurfaceCapabilities,
    pub submissions: Vec<Submission>,
    pub created: Vec<Created>,
    pub destroyed: Vec<Destroyed>,
    pub presents: usize,
    pub fence_waits: usize,
    pub max_in_flight: usize,
    pub violations: Vec<String>,
    pub fail_next_acquire: Option<vk::Result>,
    /// Fails before anything is queued, like a submit rejected up front.
    pub fail_next_submit: Option<vk::Result>,
    pub fail_next_present: Option<vk::Result>,
    /// Fail sync object creation once this many objects exist.
    pub fail_sync_creation_after: Option<usize>,
}

impl FakeBackend {
    /// A surface that lets the framebuffer size decide the extent and yields three images.
    pub fn new() -> Self {
        Self {
            clock: 0,
            next_handle: 1,
            fences: HashMap::new(),
            semaphores: HashMap::new(),
            live: HashSet::new(),
            acquire_queue: VecDeque::new(),
            present_queue: VecDeque::new(),
            next_image: 0,
            capabilities: SurfaceCapabilities {
                capabilities: vk::SurfaceCapabilitiesKHR {
                    min_image_count: 2,
                    max_image_count: 0,
                    current_extent: extent(u32::MAX, u32::MAX),
                    min_image_extent: extent(1, 1),
                    max_image_extent: extent(4096, 4096),
                    ..Default::default()
                },
                formats: vec![vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                }],
                present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            },
            submissions: Vec::new(),
            created: Vec::new(),
            destroyed: Vec::new(),
            presents: 0,
            fence_waits: 0,
            max_in_flight: 0,
            violations: Vec::new(),
            fail_next_acquire: None,
            fail_next_submit: None,
            fail_next_present: None,
            fail_sync_creation_after: None,
        }
    }

    /// Image indices to hand out, in order, before falling back to round robin.
    pub fn script_acquires(&mut self, indices: impl IntoIterator<Item = u32>) {
        self.acquire_queue
            .extend(indices.into_iter().map(|image_index| AcquireOutcome::Acquired {
                image_index,
                suboptimal: false,
            }));
    }

    pub fn queue_acquire(&mut self, outcome: AcquireOutcome) {
        self.acquire_queue.push_back(outcome);
    }

    pub fn queue_present(&mut self, outcome: PresentOutcome) {
        self.present_queue.push_back(outcome);
    }

    /// Submitted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.submissions
            .iter()
            .filter(|s| s.completed_at.is_none())
            .count()
    }

    pub fn is_signaled(&self, fence: FakeFence) -> bool {
        self.fences.get(&fence).is_some_and(|f| f.signaled)
    }

    pub fn live_sync_objects(&self) -> usize {
        self.fences.len() + self.semaphores.len()
    }

    pub fn live_resources(&self) -> usize {
        self.live.len()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn handle(&mut self) -> Result<u32> {
        if let Some(limit) = self.fail_sync_creation_after {
            if self.live_sync_objects() >= limit {
                return Err(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
        }
        self.next_handle += 1;
        Ok(self.next_handle)
    }

    fn complete(&mut self, submission: usize) {
        let at = self.tick();
        let entry = &mut self.submissions[submission];
        if entry.completed_at.is_none() {
            entry.completed_at = Some(at);
        }
        if let Some(fence) = self.fences.get_mut(&entry.fence) {
            fence.signaled = true;
            fence.pending = None;
        }
    }

    fn signal(&mut self, semaphore: FakeSemaphore, by: &str) {
        match self.semaphores.get_mut(&semaphore) {
            Some(signaled) if *signaled => self
                .violations
                .push(format!("{by} signals {semaphore:?} which is already signaled")),
            Some(signaled) => *signaled = true,
            None => self
                .violations
                .push(format!("{by} signals unknown {semaphore:?}")),
        }
    }

    fn consume(&mut self, semaphore: FakeSemaphore, by: &str) {
        match self.semaphores.get_mut(&semaphore) {
            Some(signaled) if *signaled => *signaled = false,
            _ => self
                .violations
                .push(format!("{by} waits on {semaphore:?} which has no pending signal")),
        }
    }

    fn check_resources(&mut self, resources: &FakeResources, by: &str) {
        if !self.live.contains(&resources.id) {
            self.violations
                .push(format!("{by} uses destroyed resources {}", resources.id));
        }
    }
}

impl SyncDevice for FakeBackend {
    type Semaphore = FakeSemaphore;
    type Fence = FakeFence;

    fn create_semaphore(&mut self) -> Result<FakeSemaphore> {
        let semaphore = FakeSemaphore(self.handle()?);
        self.semaphores.insert(semaphore, false);
        Ok(semaphore)
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FakeFence> {
        let fence = FakeFence(self.handle()?);
        self.fences.insert(
            fence,
            FenceState {
                signaled,
                pending: None,
            },
        );
        Ok(fence)
    }

    fn wait_for_fence(&mut self, fence: FakeFence) -> Result<()> {
        self.fence_waits += 1;
        self.tick();
        let Some(state) = self.fences.get(&fence) else {
            self.violations.push(format!("wait on unknown {fence:?}"));
            return Err(GpuError::InvalidState("unknown fence".into()));
        };

        match (state.signaled, state.pending) {
            (true, _) => Ok(()),
            (false, Some(submission)) => {
                self.complete(submission);
                Ok(())
            }
            (false, None) => {
                self.violations
                    .push(format!("wait on {fence:?} would never return"));
                Err(GpuError::InvalidState("deadlock".into()))
            }
        }
    }

    fn reset_fence(&mut self, fence: FakeFence) -> Result<()> {
        self.tick();
        match self.fences.get_mut(&fence) {
            Some(state) if state.pending.is_some() => {
                self.violations
                    .push(format!("reset of {fence:?} while its submission runs"));
            }
            Some(state) => state.signaled = false,
            None => self.violations.push(format!("reset of unknown {fence:?}")),
        }
        Ok(())
    }

    fn destroy_semaphore(&mut self, semaphore: FakeSemaphore) {
        if self.semaphores.remove(&semaphore) == Some(true) {
            self.violations
                .push(format!("{semaphore:?} destroyed with a pending signal"));
        }
    }

    fn destroy_fence(&mut self, fence: FakeFence) {
        if let Some(state) = self.fences.remove(&fence) {
            if state.pending.is_some() {
                self.violations
                    .push(format!("{fence:?} destroyed while in flight"));
            }
        }
    }
}

impl PresentBackend for FakeBackend {
    type Resources = FakeResources;

    fn surface_capabilities(&mut self) -> Result<SurfaceCapabilities> {
        Ok(self.capabilities.clone())
    }

    fn create_resources(&mut self, plan: &SwapchainPlan) -> Result<FakeResources> {
        let at = self.tick();
        self.next_handle += 1;
        let resources = FakeResources {
            id: self.next_handle,
            extent: plan.extent,
            image_count: plan.image_count as usize,
        };
        if resources.extent.width == 0 || resources.extent.height == 0 {
            self.violations
                .push(format!("resources created with zero extent at {at}"));
        }
        self.live.insert(resources.id);
        self.created.push(Created {
            id: resources.id,
            extent: resources.extent,
            image_count: resources.image_count,
            at,
        });
        Ok(resources)
    }

    fn destroy_resources(&mut self, resources: FakeResources) {
        let at = self.tick();
        if self
            .submissions
            .iter()
            .any(|s| s.resources == resources.id && s.completed_at.is_none())
        {
            self.violations
                .push(format!("resources {} destroyed while in use", resources.id));
        }
        self.live.remove(&resources.id);
        self.destroyed.push(Destroyed {
            id: resources.id,
            at,
        });
    }

    fn acquire_next_image(
        &mut self,
        resources: &FakeResources,
        signal: FakeSemaphore,
    ) -> Result<AcquireOutcome> {
        self.tick();
        self.check_resources(resources, "acquire");
        if let Some(error) = self.fail_next_acquire.take() {
            return Err(error.into());
        }

        let outcome = self.acquire_queue.pop_front().unwrap_or_else(|| {
            let image_index = self.next_image % resources.image_count as u32;
            self.next_image += 1;
            AcquireOutcome::Acquired {
                image_index,
                suboptimal: false,
            }
        });

        if let AcquireOutcome::Acquired { image_index, .. } = outcome {
            if image_index as usize >= resources.image_count {
                self.violations
                    .push(format!("scripted image {image_index} out of range"));
            }
            self.signal(signal, "acquire");
        }
        Ok(outcome)
    }

    fn submit(
        &mut self,
        resources: &FakeResources,
        image_index: u32,
        wait: FakeSemaphore,
        signal: FakeSemaphore,
        fence: FakeFence,
    ) -> Result<()> {
        let at = self.tick();
        self.check_resources(resources, "submit");
        if let Some(error) = self.fail_next_submit.take() {
            return Err(error.into());
        }
        self.consume(wait, "submit");
        self.signal(signal, "submit");

        let index = self.submissions.len();
        match self.fences.get_mut(&fence) {
            Some(state) if state.signaled || state.pending.is_some() => {
                self.violations
                    .push(format!("submit with {fence:?} not reset"));
            }
            Some(state) => state.pending = Some(index),
            None => self.violations.push(format!("submit with unknown {fence:?}")),
        }

        self.submissions.push(Submission {
            image_index,
            fence,
            resources: resources.id,
            submitted_at: at,
            completed_at: None,
        });
        self.max_in_flight = self.max_in_flight.max(self.in_flight());
        Ok(())
    }

    fn present(
        &mut self,
        resources: &FakeResources,
        _image_index: u32,
        wait: FakeSemaphore,
    ) -> Result<PresentOutcome> {
        self.tick();
        self.check_resources(resources, "present");
        if let Some(error) = self.fail_next_present.take() {
            return Err(error.into());
        }
        self.consume(wait, "present");
        self.presents += 1;
        Ok(self
            .present_queue
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn wait_idle(&mut self) -> Result<()> {
        let pending: Vec<usize> = self
            .submissions
            .iter()
            .enumerate()
            .filter(|(_, s)| s.completed_at.is_none())
            .map(|(i, _)| i)
            .collect();
        for submission in pending {
            self.complete(submission);
        }
        Ok(())
    }
}
