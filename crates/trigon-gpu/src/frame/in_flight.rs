//! Image-to-fence bookkeeping for swapchain images shared between frame slots.

/// Maps each swapchain image to the fence of the slot that last rendered into it.
///
/// There can be more images than slots, so two frames in flight may target the
/// same image. Waiting on the recorded fence before reuse prevents that hazard.
#[derive(Debug, Clone)]
pub struct InFlightMap<F> {
    fences: Vec<Option<F>>,
}

impl<F: Copy> InFlightMap<F> {
    /// A map with no fence recorded for any of `image_count` images.
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![None; image_count],
        }
    }

    /// Fence guarding the last submission that targeted `image_index`, if any.
    pub fn fence(&self, image_index: usize) -> Option<F> {
        self.fences.get(image_index).copied().flatten()
    }

    /// Record that `fence` now guards `image_index`.
    pub fn record(&mut self, image_index: usize, fence: F) {
        if image_index >= self.fences.len() {
            self.fences.resize(image_index + 1, None);
        }
        self.fences[image_index] = Some(fence);
    }

    /// Drop every entry guarded by `fence`.
    pub fn forget(&mut self, fence: F)
    where
        F: PartialEq,
    {
        for entry in &mut self.fences {
            if *entry == Some(fence) {
                *entry = None;
            }
        }
    }

    /// Forget all fences and resize for a new swapchain generation.
    pub fn reset(&mut self, image_count: usize) {
        self.fences.clear();
        self.fences.resize(image_count, None);
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}
