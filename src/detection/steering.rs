// src/detection/steering.rs
use super::lane_estimator::LaneEstimate;
use super::types::{EdgePosition, RowLevel, ScanBand, ScanRows, Side, SteeringLimits};

/// Per-side steering contributions after the row hierarchy. `None` means
/// "no opinion", never centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SideContributions {
    pub near: Option<i32>,
    pub mid: Option<i32>,
    pub far: Option<i32>,
}

/// Maps a lane-edge column to a servo command with two linear segments
/// meeting at the row's reference column, so each side of the reference
/// gets its own slope.
pub struct SteeringMapper {
    limits: SteeringLimits,
}

impl SteeringMapper {
    pub fn new(limits: SteeringLimits) -> Self {
        Self { limits }
    }

    pub fn map(&self, position: EdgePosition, band: &ScanBand) -> Option<i32> {
        let x = position.value()?;
        let center = self.limits.center();
        let mean = band.mean as f64;

        let mapped = if x < mean {
            linear_map(x, band.start as f64, mean, self.limits.left, center)
        } else {
            linear_map(x, mean, band.end as f64, center, self.limits.right)
        };
        Some(mapped)
    }

    /// Near row first; mid only when near produced a value; far only when
    /// mid did. Only `near` feeds the fused output.
    pub fn contributions(
        &self,
        estimate: &LaneEstimate,
        rows: &ScanRows,
        side: Side,
    ) -> SideContributions {
        let mut out = SideContributions::default();
        let map_level =
            |level: RowLevel| self.map(estimate.position(side, level), rows.row(level).band(side));

        out.near = map_level(RowLevel::Near);
        if out.near.is_none() {
            return out;
        }
        out.mid = map_level(RowLevel::Mid);
        if out.mid.is_none() {
            return out;
        }
        out.far = map_level(RowLevel::Far);
        out
    }
}

/// Linear interpolation of `input` from `[in_min, in_max]` onto
/// `[out_min, out_max]`, truncated toward zero.
fn linear_map(input: f64, in_min: f64, in_max: f64, out_min: i32, out_max: i32) -> i32 {
    let slope = (out_max - out_min) as f64 / (in_max - in_min);
    (out_min as f64 + slope * (input - in_min)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::edge_sampler::RowSample;
    use crate::types::Config;

    fn limits() -> SteeringLimits {
        SteeringLimits { left: 220, right: 380 }
    }

    fn rows() -> ScanRows {
        ScanRows::from_config(&Config::default().scan_rows)
    }

    fn sample(position: EdgePosition) -> RowSample {
        RowSample {
            position,
            hits: Vec::new(),
        }
    }

    fn estimate_with(left: [EdgePosition; 3], right: [EdgePosition; 3]) -> LaneEstimate {
        LaneEstimate {
            left_near: sample(left[0]),
            right_near: sample(right[0]),
            left_mid: sample(left[1]),
            right_mid: sample(right[1]),
            left_far: sample(left[2]),
            right_far: sample(right[2]),
        }
    }

    #[test]
    fn mean_maps_to_center_on_every_row() {
        let mapper = SteeringMapper::new(limits());
        for row in rows().iter() {
            for side in [Side::Left, Side::Right] {
                let band = row.band(side);
                assert_eq!(
                    mapper.map(EdgePosition::At(band.mean as f64), band),
                    Some(300),
                    "row {:?} side {:?}",
                    row.level,
                    side
                );
            }
        }
    }

    #[test]
    fn band_ends_map_to_limits() {
        let mapper = SteeringMapper::new(limits());
        let band = rows().near.left;
        assert_eq!(mapper.map(EdgePosition::At(band.start as f64), &band), Some(220));
        assert_eq!(mapper.map(EdgePosition::At(band.end as f64), &band), Some(380));
    }

    #[test]
    fn segments_have_independent_slopes() {
        let mapper = SteeringMapper::new(limits());
        // Near-left band is [72, 452] around 172: 100 px on the outside,
        // 280 px towards the centre.
        let band = rows().near.left;
        assert_eq!(mapper.map(EdgePosition::At(122.0), &band), Some(260));
        assert_eq!(mapper.map(EdgePosition::At(312.0), &band), Some(340));
    }

    #[test]
    fn mapping_is_monotonic_on_each_segment() {
        let mapper = SteeringMapper::new(limits());
        for row in rows().iter() {
            for side in [Side::Left, Side::Right] {
                let band = row.band(side);
                let mut previous = i32::MIN;
                let mut x = band.start as f64;
                while x <= band.end as f64 {
                    let value = mapper.map(EdgePosition::At(x), band).unwrap();
                    assert!(value >= previous, "not monotonic at x={}", x);
                    previous = value;
                    x += 0.5;
                }
            }
        }
    }

    #[test]
    fn absent_contributes_no_opinion() {
        let mapper = SteeringMapper::new(limits());
        assert_eq!(mapper.map(EdgePosition::Absent, &rows().near.left), None);
    }

    #[test]
    fn hierarchy_stops_at_first_missing_row() {
        let mapper = SteeringMapper::new(limits());
        let rows = rows();
        let estimate = estimate_with(
            [EdgePosition::At(172.0), EdgePosition::Absent, EdgePosition::At(481.0)],
            [EdgePosition::Absent, EdgePosition::At(963.0), EdgePosition::At(794.0)],
        );

        let left = mapper.contributions(&estimate, &rows, Side::Left);
        assert_eq!(left.near, Some(300));
        assert_eq!(left.mid, None);
        assert_eq!(left.far, None, "far row must not be consulted past a gap");

        let right = mapper.contributions(&estimate, &rows, Side::Right);
        assert_eq!(right, SideContributions::default());
    }

    #[test]
    fn hierarchy_fills_all_rows_when_present() {
        let mapper = SteeringMapper::new(limits());
        let rows = rows();
        let estimate = estimate_with(
            [EdgePosition::At(172.0), EdgePosition::At(304.0), EdgePosition::At(481.0)],
            [EdgePosition::Absent; 3],
        );
        let left = mapper.contributions(&estimate, &rows, Side::Left);
        assert_eq!(left.near, Some(300));
        assert_eq!(left.mid, Some(300));
        assert_eq!(left.far, Some(300));
    }
}
