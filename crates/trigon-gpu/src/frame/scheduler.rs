//! Per-frame acquire → submit → present cycle.

use ash::vk;
use tracing::{debug, warn};

use crate::error::{GpuError, Result};
use crate::frame::{
    AcquireOutcome, FrameSlotPool, InFlightMap, Invalidation, LifecycleState, PresentBackend,
    PresentOutcome, RebuildOutcome, SwapchainGeneration, SwapchainLifecycle,
};

/// What happened during one call to [`FrameScheduler::render_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and queued for presentation.
    Presented { slot: usize, image_index: u32 },
    /// Nothing was submitted this cycle.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Acquire reported the surface out of date; a rebuild is pending.
    SurfaceStale,
    /// The framebuffer has zero area; the rebuild waits for the window to reappear.
    ZeroExtent,
}

/// Renders frames with up to N in flight and keeps the swapchain current.
///
/// Not reentrant: every operation takes `&mut self`.
pub struct FrameScheduler<B: PresentBackend> {
    slots: FrameSlotPool<B>,
    images_in_flight: InFlightMap<B::Fence>,
    lifecycle: SwapchainLifecycle<B::Resources>,
    frame_count: u64,
}

impl<B: PresentBackend> FrameScheduler<B> {
    /// Create the frame slots. The first swapchain generation is built by the
    /// first call to [`render_frame`](Self::render_frame).
    pub fn new(backend: &mut B, frames_in_flight: usize) -> Result<Self> {
        Ok(Self {
            slots: FrameSlotPool::new(backend, frames_in_flight)?,
            images_in_flight: InFlightMap::new(0),
            lifecycle: SwapchainLifecycle::new(),
            frame_count: 0,
        })
    }

    /// Record that the window size changed. The swapchain is rebuilt before
    /// the next frame is rendered.
    pub fn notify_resized(&mut self) {
        self.lifecycle.invalidate(Invalidation::Resized);
    }

    /// Run one frame cycle.
    ///
    /// Stale and suboptimal surfaces are handled internally. Every returned
    /// error is fatal.
    pub fn render_frame(&mut self, backend: &mut B, framebuffer: vk::Extent2D) -> Result<FrameOutcome> {
        if !self.lifecycle.is_live() {
            let outcome = self.lifecycle.rebuild(
                backend,
                &self.slots,
                &mut self.images_in_flight,
                framebuffer,
            )?;
            if outcome == RebuildOutcome::Deferred {
                return Ok(FrameOutcome::Skipped(SkipReason::ZeroExtent));
            }
        }

        let resources = match self.lifecycle.generation() {
            Some(generation) if !generation.is_retired() => generation.resources(),
            _ => {
                return Err(GpuError::InvalidState(
                    "no live swapchain generation to render to".into(),
                ))
            }
        };
        let slot_index = self.slots.current_index();
        let slot = *self.slots.current();

        // The slot's previous submission must finish before its objects are reused.
        backend.wait_for_fence(slot.in_flight)?;

        let (image_index, acquired_suboptimal) =
            match backend.acquire_next_image(resources, slot.image_acquired)? {
                AcquireOutcome::Acquired {
                    image_index,
                    suboptimal,
                } => (image_index, suboptimal),
                AcquireOutcome::OutOfDate => {
                    self.lifecycle.invalidate(Invalidation::AcquireOutOfDate);
                    debug!("Skipping frame {}: surface out of date", self.frame_count);
                    return Ok(FrameOutcome::Skipped(SkipReason::SurfaceStale));
                }
            };

        // Another slot may still be rendering into this image.
        if let Some(fence) = self.images_in_flight.fence(image_index as usize) {
            backend.wait_for_fence(fence)?;
        }

        // Reset only once submission is certain, so a skipped frame never
        // leaves an unsignaled fence behind.
        backend.reset_fence(slot.in_flight)?;
        if let Err(e) = backend.submit(
            resources,
            image_index,
            slot.image_acquired,
            slot.render_finished,
            slot.in_flight,
        ) {
            // The reset fence would never signal; shutdown must still be able to drain.
            match self.slots.replace_current_fence(backend) {
                Ok(stale) => self.images_in_flight.forget(stale),
                Err(replace_err) => {
                    warn!("Failed to replace fence of slot {slot_index}: {replace_err}");
                }
            }
            return Err(e);
        }
        self.images_in_flight
            .record(image_index as usize, slot.in_flight);

        let presented = backend.present(resources, image_index, slot.render_finished)?;
        match presented {
            PresentOutcome::OutOfDate => self.lifecycle.invalidate(Invalidation::PresentOutOfDate),
            PresentOutcome::Suboptimal => self.lifecycle.invalidate(Invalidation::Suboptimal),
            PresentOutcome::Presented if acquired_suboptimal => {
                self.lifecycle.invalidate(Invalidation::Suboptimal);
            }
            PresentOutcome::Presented => {}
        }

        self.slots.advance();
        self.frame_count += 1;

        Ok(FrameOutcome::Presented {
            slot: slot_index,
            image_index,
        })
    }

    /// Wait for all work, then destroy the swapchain generation and the frame slots.
    pub fn shutdown(mut self, backend: &mut B) -> Result<()> {
        self.lifecycle.shutdown(backend, &self.slots)?;
        self.slots.destroy(backend);
        Ok(())
    }

    /// Frames presented so far.
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Index of the slot the next frame will use.
    pub const fn current_slot(&self) -> usize {
        self.slots.current_index()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub const fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub const fn generation(&self) -> Option<&SwapchainGeneration<B::Resources>> {
        self.lifecycle.generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::testing::{extent, FakeBackend, Submission};
    use crate::frame::SwapchainResources;

    const SIZE: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    fn scheduler(backend: &mut FakeBackend, frames_in_flight: usize) -> FrameScheduler<FakeBackend> {
        FrameScheduler::new(backend, frames_in_flight).unwrap()
    }

    fn assert_clean(backend: &FakeBackend) {
        assert!(backend.violations.is_empty(), "{:?}", backend.violations);
    }

    #[test]
    fn first_frame_builds_swapchain() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);
        assert_eq!(scheduler.state(), LifecycleState::Invalidated);

        let outcome = scheduler.render_frame(&mut backend, SIZE).unwrap();
        assert_eq!(
            outcome,
            FrameOutcome::Presented {
                slot: 0,
                image_index: 0
            }
        );
        assert_eq!(scheduler.state(), LifecycleState::Live);
        assert_eq!(backend.created.len(), 1);
        assert_eq!(backend.created[0].extent, SIZE);
        assert_clean(&backend);
    }

    #[test]
    fn slot_index_is_frame_index_mod_n() {
        for n in 1..=4 {
            let mut backend = FakeBackend::new();
            let mut scheduler = scheduler(&mut backend, n);

            for i in 0..20 {
                assert_eq!(scheduler.current_slot(), i % n);
                match scheduler.render_frame(&mut backend, SIZE).unwrap() {
                    FrameOutcome::Presented { slot, .. } => assert_eq!(slot, i % n),
                    FrameOutcome::Skipped(reason) => panic!("unexpected skip: {reason:?}"),
                }
            }
            assert_eq!(scheduler.frame_count(), 20);
            assert_clean(&backend);
        }
    }

    #[test]
    fn never_more_than_n_frames_in_flight() {
        for n in 1..=3 {
            let mut backend = FakeBackend::new();
            backend.capabilities.capabilities.min_image_count = 3;
            // Scrambled acquire order over four images.
            backend.script_acquires([3, 1, 1, 0, 2, 2, 3, 0, 1, 3, 2, 0, 0, 1]);
            let mut scheduler = scheduler(&mut backend, n);

            for _ in 0..14 {
                scheduler.render_frame(&mut backend, SIZE).unwrap();
                assert!(backend.in_flight() <= n);
            }
            assert!(backend.max_in_flight <= n);
            assert_eq!(backend.max_in_flight, n.min(14));
            assert_clean(&backend);
        }
    }

    #[test]
    fn reused_image_waits_for_previous_submission() {
        let mut backend = FakeBackend::new();
        // Both slots get image 0 back to back; slot 1's own fence is idle,
        // only the in-flight map stops it from overlapping slot 0.
        backend.script_acquires([0, 0, 1, 1, 1, 2, 0]);
        let mut scheduler = scheduler(&mut backend, 2);

        for _ in 0..7 {
            scheduler.render_frame(&mut backend, SIZE).unwrap();
        }

        let submissions: &[Submission] = &backend.submissions;
        for (i, later) in submissions.iter().enumerate() {
            for earlier in &submissions[..i] {
                if earlier.image_index == later.image_index {
                    let completed = earlier
                        .completed_at
                        .expect("earlier submission must complete before reuse");
                    assert!(
                        completed < later.submitted_at,
                        "image {} reused at {} before completion at {}",
                        later.image_index,
                        later.submitted_at,
                        completed
                    );
                }
            }
        }
        assert_clean(&backend);
    }

    #[test]
    fn stale_acquire_skips_and_rebuilds_next_frame() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);
        scheduler.render_frame(&mut backend, SIZE).unwrap();

        backend.queue_acquire(AcquireOutcome::OutOfDate);
        let outcome = scheduler.render_frame(&mut backend, SIZE).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::SurfaceStale));
        assert_eq!(scheduler.state(), LifecycleState::Invalidated);
        // The slot is not consumed by a skipped frame.
        assert_eq!(scheduler.current_slot(), 1);
        assert_eq!(backend.submissions.len(), 1);

        let outcome = scheduler
            .render_frame(&mut backend, extent(1024, 768))
            .unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { slot: 1, .. }));
        assert_eq!(backend.created.len(), 2);
        assert_eq!(scheduler.generation().unwrap().epoch(), 1);
        assert_clean(&backend);
    }

    #[test]
    fn present_out_of_date_or_suboptimal_triggers_rebuild() {
        for outcome in [PresentOutcome::OutOfDate, PresentOutcome::Suboptimal] {
            let mut backend = FakeBackend::new();
            let mut scheduler = scheduler(&mut backend, 2);

            backend.queue_present(outcome);
            scheduler.render_frame(&mut backend, SIZE).unwrap();
            // The frame itself still counts and the slot advances.
            assert_eq!(scheduler.current_slot(), 1);
            assert_eq!(scheduler.state(), LifecycleState::Invalidated);

            scheduler.render_frame(&mut backend, SIZE).unwrap();
            assert_eq!(backend.created.len(), 2);
            assert_eq!(scheduler.state(), LifecycleState::Live);
            assert_clean(&backend);
        }
    }

    #[test]
    fn suboptimal_acquire_presents_then_rebuilds() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);

        backend.queue_acquire(AcquireOutcome::Acquired {
            image_index: 0,
            suboptimal: true,
        });
        let outcome = scheduler.render_frame(&mut backend, SIZE).unwrap();
        assert!(matches!(outcome, FrameOutcome::Presented { .. }));
        assert_eq!(backend.presents, 1);
        assert_eq!(scheduler.state(), LifecycleState::Invalidated);

        scheduler.render_frame(&mut backend, SIZE).unwrap();
        assert_eq!(backend.created.len(), 2);
        assert_clean(&backend);
    }

    #[test]
    fn rebuild_waits_for_outstanding_frames() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);
        scheduler.render_frame(&mut backend, SIZE).unwrap();
        scheduler.render_frame(&mut backend, SIZE).unwrap();
        assert_eq!(backend.in_flight(), 2);

        scheduler.notify_resized();
        scheduler
            .render_frame(&mut backend, extent(1280, 720))
            .unwrap();

        let destroyed_at = backend.destroyed[0].at;
        for submission in &backend.submissions[..2] {
            let completed = submission.completed_at.unwrap();
            assert!(completed < destroyed_at);
        }
        assert_clean(&backend);
    }

    #[test]
    fn minimized_window_stalls_until_visible() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);
        scheduler.render_frame(&mut backend, SIZE).unwrap();

        scheduler.notify_resized();
        for _ in 0..5 {
            let outcome = scheduler.render_frame(&mut backend, extent(0, 0)).unwrap();
            assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::ZeroExtent));
        }
        assert_eq!(backend.created.len(), 1);
        assert_eq!(backend.submissions.len(), 1);

        scheduler.render_frame(&mut backend, SIZE).unwrap();
        assert_eq!(backend.created.len(), 2);
        assert_eq!(backend.submissions.len(), 2);
        assert_clean(&backend);
    }

    #[test]
    fn starting_minimized_builds_nothing() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);

        let outcome = scheduler.render_frame(&mut backend, extent(0, 0)).unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped(SkipReason::ZeroExtent));
        assert!(backend.created.is_empty());
        assert!(scheduler.generation().is_none());
    }

    #[test]
    fn image_count_change_resets_in_flight_map() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);
        for _ in 0..4 {
            scheduler.render_frame(&mut backend, SIZE).unwrap();
        }

        backend.capabilities.capabilities.min_image_count = 1;
        scheduler.notify_resized();
        for _ in 0..4 {
            scheduler.render_frame(&mut backend, SIZE).unwrap();
        }
        assert_eq!(scheduler.generation().unwrap().resources().image_count(), 2);
        assert_clean(&backend);
    }

    #[test]
    fn fatal_acquire_error_propagates() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);
        scheduler.render_frame(&mut backend, SIZE).unwrap();

        backend.fail_next_acquire = Some(vk::Result::ERROR_DEVICE_LOST);
        let err = scheduler.render_frame(&mut backend, SIZE).unwrap_err();
        assert!(matches!(err, GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST)));
        assert_eq!(backend.submissions.len(), 1);
    }

    #[test]
    fn fatal_present_error_propagates() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);

        backend.fail_next_present = Some(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        let err = scheduler.render_frame(&mut backend, SIZE).unwrap_err();
        assert!(matches!(
            err,
            GpuError::Vulkan(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        ));
        assert_eq!(backend.presents, 0);
    }

    #[test]
    fn failed_submit_still_shuts_down() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);
        scheduler.render_frame(&mut backend, SIZE).unwrap();

        backend.fail_next_submit = Some(vk::Result::ERROR_DEVICE_LOST);
        let err = scheduler.render_frame(&mut backend, SIZE).unwrap_err();
        assert!(matches!(err, GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST)));
        assert_eq!(backend.submissions.len(), 1);
        // The failed frame's image is not left pointing at a dead fence.
        assert!(scheduler.images_in_flight.fence(1).is_none());

        scheduler.shutdown(&mut backend).unwrap();
        assert_eq!(backend.live_resources(), 0);
        assert!(
            !backend
                .violations
                .iter()
                .any(|v| v.contains("never return") || v.contains("unknown")),
            "{:?}",
            backend.violations
        );
    }

    #[test]
    fn rebuild_keeps_frame_slots() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);
        scheduler.render_frame(&mut backend, SIZE).unwrap();

        let slots: Vec<_> = scheduler.slots.iter().copied().collect();
        let sync_objects = backend.live_sync_objects();

        scheduler.notify_resized();
        scheduler
            .render_frame(&mut backend, extent(1024, 768))
            .unwrap();
        assert_eq!(backend.created.len(), 2);
        assert_eq!(scheduler.slots.iter().copied().collect::<Vec<_>>(), slots);
        assert_eq!(backend.live_sync_objects(), sync_objects);

        // A rebuild that fails partway leaves the slots alone as well.
        backend.capabilities.formats.clear();
        scheduler.notify_resized();
        assert!(scheduler.render_frame(&mut backend, SIZE).is_err());
        assert_eq!(backend.created.len(), 2);
        assert_eq!(scheduler.slots.iter().copied().collect::<Vec<_>>(), slots);
        assert_eq!(backend.live_sync_objects(), sync_objects);
        assert_clean(&backend);
    }

    #[test]
    fn shutdown_releases_everything() {
        let mut backend = FakeBackend::new();
        let mut scheduler = scheduler(&mut backend, 2);
        for _ in 0..3 {
            scheduler.render_frame(&mut backend, SIZE).unwrap();
        }

        scheduler.shutdown(&mut backend).unwrap();
        assert_eq!(backend.in_flight(), 0);
        assert_eq!(backend.live_resources(), 0);
        assert_eq!(backend.live_sync_objects(), 0);
        assert_clean(&backend);
    }
}
