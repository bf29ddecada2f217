//! Output resolution ladder and the fixed encode preset of each rung.

/// Ladder buckets, highest first. Also the dispatch and manifest order.
pub const BUCKETS: [u32; 3] = [720, 540, 360];

/// Every plan contains this bucket, upscaling smaller sources.
pub const FLOOR: u32 = 360;

/// Ordered set of target heights for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionPlan(Vec<u32>);

impl RenditionPlan {
    pub fn heights(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, height: u32) -> bool {
        self.0.contains(&height)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

pub struct RenditionLadder;

impl RenditionLadder {
    pub fn plan(source_height: u32) -> RenditionPlan {
        let mut heights: Vec<u32> = BUCKETS
            .iter()
            .copied()
            .filter(|bucket| source_height >= *bucket)
            .collect();
        if source_height < FLOOR {
            heights.push(FLOOR);
        }
        RenditionPlan(heights)
    }
}

/// Rate control for one ladder bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodePreset {
    pub height: u32,
    pub video_bitrate: &'static str,
    pub max_rate: &'static str,
    pub buffer_size: &'static str,
}

impl EncodePreset {
    /// Heights between buckets use the preset of the bucket below them.
    pub fn for_height(height: u32) -> Self {
        match height {
            h if h >= 720 => Self {
                height,
                video_bitrate: "1500k",
                max_rate: "1500k",
                buffer_size: "1000k",
            },
            h if h >= 540 => Self {
                height,
                video_bitrate: "800k",
                max_rate: "800k",
                buffer_size: "500k",
            },
            _ => Self {
                height,
                video_bitrate: "400k",
                max_rate: "400k",
                buffer_size: "400k",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_ladder_for_hd_sources() {
        assert_eq!(RenditionLadder::plan(1080).heights(), &[720, 540, 360]);
        assert_eq!(RenditionLadder::plan(720).heights(), &[720, 540, 360]);
    }

    #[test]
    fn partial_ladders() {
        assert_eq!(RenditionLadder::plan(719).heights(), &[540, 360]);
        assert_eq!(RenditionLadder::plan(540).heights(), &[540, 360]);
        assert_eq!(RenditionLadder::plan(480).heights(), &[360]);
        assert_eq!(RenditionLadder::plan(360).heights(), &[360]);
    }

    #[test]
    fn small_sources_are_upscaled_to_the_floor() {
        assert_eq!(RenditionLadder::plan(240).heights(), &[360]);
        assert_eq!(RenditionLadder::plan(0).heights(), &[360]);
    }

    #[test]
    fn every_plan_is_descending_and_contains_the_floor_once() {
        for height in (0..=2160).step_by(10) {
            let plan = RenditionLadder::plan(height);
            assert!(!plan.is_empty());
            assert_eq!(plan.iter().filter(|h| *h == FLOOR).count(), 1, "height {}", height);
            assert!(plan.heights().windows(2).all(|w| w[0] > w[1]));
            for bucket in BUCKETS {
                if bucket <= height {
                    assert!(plan.contains(bucket), "height {} missing {}", height, bucket);
                }
            }
        }
    }

    #[test]
    fn presets_are_discrete() {
        assert_eq!(EncodePreset::for_height(720).video_bitrate, "1500k");
        assert_eq!(EncodePreset::for_height(540).buffer_size, "500k");
        assert_eq!(EncodePreset::for_height(360).max_rate, "400k");
        assert_eq!(EncodePreset::for_height(600).video_bitrate, "800k");
    }
}
