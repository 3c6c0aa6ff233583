//! Aggregate trajectory statistics: duration, extents, and takeoff /
//! landing time proposals.
//!
//! Everything here walks the segment stream once through the standard
//! player, lifting each segment's polynomials back to the unit interval
//! so the degree-limited root and extremum search applies.

use crate::error::Result;
use crate::point::{BoundingBox, Point3};
use crate::poly::Poly;
use crate::show::trajectory::Trajectory;

/// Total show duration.
pub const COMPONENT_DURATION: u8 = 1 << 0;
/// Start/end positions and their horizontal distance.
pub const COMPONENT_START_END: u8 = 1 << 1;
/// Axis-aligned bounding box of the whole flight.
pub const COMPONENT_EXTENTS: u8 = 1 << 2;
/// Earliest climb-out altitude crossing and the takeoff proposal.
pub const COMPONENT_TAKEOFF: u8 = 1 << 3;
pub const COMPONENT_ALL: u8 =
    COMPONENT_DURATION | COMPONENT_START_END | COMPONENT_EXTENTS | COMPONENT_TAKEOFF;

/// Configuration for [`StatsCalculator`]. Distances are millimeters,
/// speeds mm/s, accelerations mm/s².
#[derive(Debug, Clone, Copy)]
pub struct StatsConfig {
    pub components: u8,
    pub takeoff_speed_mm_s: f32,
    pub takeoff_acceleration_mm_s2: f32,
    /// Ascent that counts as having taken off.
    pub min_ascent_mm: f32,
    /// Horizontal excursion from the start point beyond which the
    /// climb-out search stops. Non-positive disables the check.
    pub verticality_threshold_mm: f32,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            components: COMPONENT_ALL,
            takeoff_speed_mm_s: 2000.0,
            takeoff_acceleration_mm_s2: 4000.0,
            min_ascent_mm: 2500.0,
            verticality_threshold_mm: 2000.0,
        }
    }
}

/// Results of a statistics pass. Components that were not requested (or
/// not detectable) hold their default / `None` values.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TrajectoryStats {
    pub duration_ms: u32,
    pub start: Point3,
    pub end: Point3,
    pub start_to_end_distance_mm: f32,
    pub bounding_box: BoundingBox,
    /// Absolute time the drone first climbs `min_ascent` above its start.
    pub earliest_above_ms: Option<u32>,
    /// Proposed takeoff command time: the crossing minus the travel time
    /// for the configured speed and acceleration. May be negative.
    pub takeoff_time_sec: Option<f32>,
}

/// Single-pass statistics extractor.
#[derive(Debug, Clone, Default)]
pub struct StatsCalculator {
    config: StatsConfig,
}

impl StatsCalculator {
    pub fn new(config: StatsConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, traj: &Trajectory) -> Result<TrajectoryStats> {
        let cfg = &self.config;
        let want = |c: u8| cfg.components & c != 0;

        let start = traj.start_point().position();
        let mut stats = TrajectoryStats {
            start,
            end: start,
            ..TrajectoryStats::default()
        };
        if want(COMPONENT_EXTENTS) {
            stats.bounding_box.expand(&start);
        }
        let climb_threshold = start.z + cfg.min_ascent_mm;
        let mut climb_search_open = want(COMPONENT_TAKEOFF);

        let mut player = traj.player()?;
        loop {
            let Some(window) = player.current_segment().cloned() else {
                break;
            };
            stats.duration_ms = stats.duration_ms.saturating_add(window.duration_ms);
            stats.end = window.data.end.position();

            if want(COMPONENT_EXTENTS) {
                let duration_sec = window.duration_sec();
                let (x_lo, x_hi) = window.data.poly.x.extrema_on(duration_sec)?;
                let (y_lo, y_hi) = window.data.poly.y.extrema_on(duration_sec)?;
                let (z_lo, z_hi) = window.data.poly.z.extrema_on(duration_sec)?;
                stats.bounding_box.x.expand_range(x_lo, x_hi);
                stats.bounding_box.y.expand_range(y_lo, y_hi);
                stats.bounding_box.z.expand_range(z_lo, z_hi);
            }

            if climb_search_open && stats.earliest_above_ms.is_none() {
                if cfg.verticality_threshold_mm > 0.0
                    && window
                        .data
                        .start
                        .position()
                        .horizontal_distance_to(&start)
                        > cfg.verticality_threshold_mm
                {
                    // The drone is traveling; any climb-out already happened.
                    climb_search_open = false;
                } else {
                    let duration_sec = window.duration_sec();
                    let z_unit = unit_poly(&window.data.poly.z, duration_sec);
                    if let Some(u) = z_unit.first_touch(climb_threshold)? {
                        let at = window.start_ms
                            + (f64::from(u) * f64::from(window.duration_ms)).round() as u32;
                        stats.earliest_above_ms = Some(at);
                    }
                }
            }

            if !player.build_next_segment()? {
                break;
            }
        }

        if want(COMPONENT_START_END) {
            stats.start_to_end_distance_mm = stats.start.horizontal_distance_to(&stats.end);
        }
        if let Some(ms) = stats.earliest_above_ms {
            let travel = travel_time_sec(
                cfg.min_ascent_mm,
                cfg.takeoff_speed_mm_s,
                cfg.takeoff_acceleration_mm_s2,
            );
            stats.takeoff_time_sec = Some(ms as f32 / 1000.0 - travel);
        }
        Ok(stats)
    }
}

/// Time to cover `distance` starting at rest, accelerating at `accel` up
/// to `speed`, then cruising. Non-positive (or non-finite) acceleration
/// degenerates to constant-speed travel.
pub fn travel_time_sec(distance_mm: f32, speed_mm_s: f32, accel_mm_s2: f32) -> f32 {
    if distance_mm <= 0.0 || speed_mm_s <= 0.0 {
        return 0.0;
    }
    if accel_mm_s2 <= 0.0 || !accel_mm_s2.is_finite() {
        return distance_mm / speed_mm_s;
    }
    let accel_distance = speed_mm_s * speed_mm_s / (2.0 * accel_mm_s2);
    if distance_mm <= accel_distance {
        (2.0 * distance_mm / accel_mm_s2).sqrt()
    } else {
        speed_mm_s / accel_mm_s2 + (distance_mm - accel_distance) / speed_mm_s
    }
}

/// Earliest time (seconds) to issue a takeoff command so the drone is at
/// `altitude_mm` above its start when the trajectory first gets there,
/// climbing at `speed_mm_s`. Infinite when the inputs are non-positive or
/// the trajectory never reaches that altitude; may be negative otherwise.
pub fn propose_takeoff_time_sec(
    traj: &Trajectory,
    altitude_mm: f32,
    speed_mm_s: f32,
) -> Result<f32> {
    if altitude_mm <= 0.0 || speed_mm_s <= 0.0 {
        return Ok(f32::INFINITY);
    }
    let threshold = traj.start_point().z + altitude_mm;
    let Some(crossing_sec) = first_crossing_sec(traj, threshold)? else {
        return Ok(f32::INFINITY);
    };
    Ok(crossing_sec - altitude_mm / speed_mm_s)
}

/// Mirror image of [`propose_takeoff_time_sec`]: the latest time the
/// trajectory is still `altitude_mm` above its end point, plus the
/// descent time at `speed_mm_s`.
pub fn propose_landing_time_sec(
    traj: &Trajectory,
    altitude_mm: f32,
    speed_mm_s: f32,
) -> Result<f32> {
    if altitude_mm <= 0.0 || speed_mm_s <= 0.0 {
        return Ok(f32::INFINITY);
    }
    let mut end_z = traj.start_point().z;
    let mut player = traj.player()?;
    loop {
        let Some(window) = player.current_segment().cloned() else {
            break;
        };
        end_z = window.data.end.z;
        if !player.build_next_segment()? {
            break;
        }
    }
    let Some(crossing_sec) = last_crossing_sec(traj, end_z + altitude_mm)? else {
        return Ok(f32::INFINITY);
    };
    Ok(crossing_sec + altitude_mm / speed_mm_s)
}

fn first_crossing_sec(traj: &Trajectory, threshold_mm: f32) -> Result<Option<f32>> {
    let mut player = traj.player()?;
    loop {
        let Some(window) = player.current_segment().cloned() else {
            break;
        };
        let duration_sec = window.duration_sec();
        let z_unit = unit_poly(&window.data.poly.z, duration_sec);
        if let Some(u) = z_unit.first_touch(threshold_mm)? {
            return Ok(Some(window.start_ms as f32 / 1000.0 + u * duration_sec));
        }
        if !player.build_next_segment()? {
            break;
        }
    }
    Ok(None)
}

fn last_crossing_sec(traj: &Trajectory, threshold_mm: f32) -> Result<Option<f32>> {
    let mut latest = None;
    let mut player = traj.player()?;
    loop {
        let Some(window) = player.current_segment().cloned() else {
            break;
        };
        let duration_sec = window.duration_sec();
        let z_unit = unit_poly(&window.data.poly.z, duration_sec);
        if let Some(u) = z_unit.last_touch(threshold_mm)? {
            latest = Some(window.start_ms as f32 / 1000.0 + u * duration_sec);
        }
        if !player.build_next_segment()? {
            break;
        }
    }
    Ok(latest)
}

/// Lift a segment polynomial (domain `[0, duration]`) back onto `[0, 1]`.
fn unit_poly(poly: &Poly, duration_sec: f32) -> Poly {
    let mut unit = *poly;
    if duration_sec > 0.0 {
        unit.stretch(1.0 / duration_sec);
    }
    unit
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::show::trajectory::TrajectoryBuilder;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 0.05, "expected {b}, got {a}");
    }

    /// Climb 10 m at 1 m/s, cruise away, come back, descend.
    fn round_trip() -> Trajectory {
        let mut b = TrajectoryBuilder::new(0, 0, 0, 0);
        b.line_to(0, 0, 10_000, 10_000)
            .unwrap()
            .line_to(20_000, 0, 10_000, 10_000)
            .unwrap()
            .line_to(20_000, 15_000, 10_000, 10_000)
            .unwrap()
            .line_to(20_000, 15_000, 0, 10_000)
            .unwrap();
        b.finish().unwrap()
    }

    #[test]
    fn travel_time_profiles() {
        // Constant speed when acceleration is disabled.
        assert_close(travel_time_sec(2000.0, 1000.0, 0.0), 2.0);
        // Pure acceleration phase: d = a t^2 / 2.
        assert_close(travel_time_sec(500.0, 10_000.0, 1000.0), 1.0);
        // Accelerate 0.5 s over 250 mm, cruise the remaining 750 mm.
        assert_close(travel_time_sec(1000.0, 1000.0, 2000.0), 1.25);
        // Degenerate inputs.
        assert_eq!(travel_time_sec(0.0, 1000.0, 100.0), 0.0);
        assert_eq!(travel_time_sec(-5.0, 1000.0, 100.0), 0.0);
    }

    #[test]
    fn duration_and_endpoints() {
        let stats = StatsCalculator::default().run(&round_trip()).unwrap();
        assert_eq!(stats.duration_ms, 40_000);
        assert_eq!(stats.start, Point3::ZERO);
        assert_eq!(stats.end, Point3::new(20_000.0, 15_000.0, 0.0));
        assert_close(stats.start_to_end_distance_mm, 25_000.0);
    }

    #[test]
    fn bounding_box_covers_flight() {
        let stats = StatsCalculator::default().run(&round_trip()).unwrap();
        let bb = stats.bounding_box;
        assert_eq!((bb.x.lo, bb.x.hi), (0.0, 20_000.0));
        assert_eq!((bb.y.lo, bb.y.hi), (0.0, 15_000.0));
        assert_eq!((bb.z.lo, bb.z.hi), (0.0, 10_000.0));
    }

    #[test]
    fn takeoff_components() {
        let config = StatsConfig {
            min_ascent_mm: 2500.0,
            takeoff_speed_mm_s: 2500.0,
            takeoff_acceleration_mm_s2: 0.0,
            ..StatsConfig::default()
        };
        let stats = StatsCalculator::new(config).run(&round_trip()).unwrap();
        // Climbing 1 m/s: 2.5 m up at t = 2.5 s.
        assert_eq!(stats.earliest_above_ms, Some(2500));
        // Command time backs off by the 1 s travel time.
        assert_close(stats.takeoff_time_sec.unwrap(), 1.5);
    }

    #[test]
    fn takeoff_search_respects_verticality() {
        // Horizontal dash first, then a climb far from the start.
        let mut b = TrajectoryBuilder::new(0, 0, 0, 0);
        b.line_to(30_000, 0, 0, 10_000)
            .unwrap()
            .line_to(30_000, 0, 10_000, 10_000)
            .unwrap();
        let traj = b.finish().unwrap();
        let stats = StatsCalculator::default().run(&traj).unwrap();
        assert_eq!(stats.earliest_above_ms, None);
        assert_eq!(stats.takeoff_time_sec, None);
    }

    #[test]
    fn empty_trajectory_stats() {
        let traj = TrajectoryBuilder::new(1000, 2000, 0, 0).finish().unwrap();
        let stats = StatsCalculator::default().run(&traj).unwrap();
        assert_eq!(stats.duration_ms, 0);
        assert_eq!(stats.start, stats.end);
        assert_eq!(stats.earliest_above_ms, None);
    }

    #[test]
    fn component_mask_limits_work() {
        let config = StatsConfig {
            components: COMPONENT_DURATION,
            ..StatsConfig::default()
        };
        let stats = StatsCalculator::new(config).run(&round_trip()).unwrap();
        assert_eq!(stats.duration_ms, 40_000);
        assert!(stats.bounding_box.is_empty());
        assert_eq!(stats.start_to_end_distance_mm, 0.0);
        assert_eq!(stats.takeoff_time_sec, None);
    }

    #[test]
    fn takeoff_proposals() {
        // Ascend 1 m/s for 10 s (then cruise), per the climb fixture.
        let traj = round_trip();
        assert_close(
            propose_takeoff_time_sec(&traj, 2000.0, 2000.0).unwrap(),
            1.0,
        );
        assert_close(
            propose_takeoff_time_sec(&traj, 2000.0, 500.0).unwrap(),
            -2.0,
        );
        assert_close(
            propose_takeoff_time_sec(&traj, 2000.0, 4000.0).unwrap(),
            1.5,
        );
        assert_eq!(
            propose_takeoff_time_sec(&traj, 200_000.0, 2000.0).unwrap(),
            f32::INFINITY
        );
        assert_eq!(
            propose_takeoff_time_sec(&traj, -1.0, 2000.0).unwrap(),
            f32::INFINITY
        );
        assert_eq!(
            propose_takeoff_time_sec(&traj, 2000.0, 0.0).unwrap(),
            f32::INFINITY
        );
    }

    #[test]
    fn landing_proposal_mirrors_takeoff() {
        // Descent runs 30 s .. 40 s at 1 m/s; 2 m above the end at 38 s.
        let traj = round_trip();
        assert_close(
            propose_landing_time_sec(&traj, 2000.0, 2000.0).unwrap(),
            39.0,
        );
        assert_eq!(
            propose_landing_time_sec(&traj, 200_000.0, 2000.0).unwrap(),
            f32::INFINITY
        );
    }
}
