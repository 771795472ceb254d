use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct FeaturePoint {
    pub p2d: glam::Vec2,
    pub p3d: glam::Vec3,
}

/// ChArUco corners found in one image, keyed by corner id.
#[derive(Debug, Clone)]
pub struct FrameFeature {
    pub frame_idx: usize,
    pub img_w_h: (u32, u32),
    pub features: HashMap<u32, FeaturePoint>,
}

impl FrameFeature {
    pub fn sorted_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.features.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
