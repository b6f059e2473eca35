//! Occupancy confidence from the age of the last motion.

use crate::model::Timestamp;

/// Decay rate past the five-minute mark; an hour after motion reads 0.5.
pub const DECAY_RATE: f64 = 0.00021;
const FULL_CONFIDENCE_FOR: f64 = 60.0;
const HIGH_CONFIDENCE_FOR: f64 = 300.0;
const FLOOR: f64 = 0.1;

/// Probability in `[0, 1]` that an area with `occupancy` people is
/// really occupied at `now`.
///
/// Empty areas read 0. An occupied area with no recorded motion reads 1.
/// Otherwise confidence is 1.0 for the first minute, 0.9 until five
/// minutes, then decays exponentially toward 0.1, rounded to two places.
pub fn occupancy_probability(occupancy: u32, last_motion: Option<Timestamp>, now: Timestamp) -> f64 {
    if occupancy == 0 {
        return 0.0;
    }
    let Some(last_motion) = last_motion else {
        return 1.0;
    };
    let elapsed = now - last_motion;
    if elapsed < FULL_CONFIDENCE_FOR {
        return 1.0;
    }
    if elapsed < HIGH_CONFIDENCE_FOR {
        return 0.9;
    }
    let decayed = FLOOR + 0.8 * (-DECAY_RATE * (elapsed - HIGH_CONFIDENCE_FOR)).exp();
    (decayed * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn band_edges() {
        assert!(close(occupancy_probability(0, Some(0.0), 10.0), 0.0));
        assert!(close(occupancy_probability(2, None, 1e9), 1.0));
        assert!(close(occupancy_probability(1, Some(100.0), 159.9), 1.0));
        assert!(close(occupancy_probability(1, Some(100.0), 160.0), 0.9));
        assert!(close(occupancy_probability(1, Some(100.0), 399.9), 0.9));
        assert!(close(occupancy_probability(1, Some(100.0), 400.0), 0.9));
    }

    #[test]
    fn an_hour_reads_about_half() {
        assert!(close(occupancy_probability(1, Some(0.0), 3600.0), 0.5));
    }

    #[test]
    fn decays_monotonically_to_the_floor() {
        let mut previous = 1.0;
        for step in 0..2000 {
            let now = f64::from(step) * 60.0;
            let p = occupancy_probability(1, Some(0.0), now);
            assert!(p <= previous, "probability rose at {now}");
            assert!((0.1..=1.0).contains(&p));
            previous = p;
        }
        assert!(close(previous, 0.1));
    }
}
