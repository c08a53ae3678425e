//! Fan curve calculations for temperature-based speed control.
//!
//! Two representations are kept for every fan: a point table that is linearly
//! interpolated, and a cubic Bezier curve that is inverted numerically. Which
//! one drives the hardware is selected by a controller-wide [`CurveMode`].

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Maximum bisection steps for Bezier curve lookup.
pub const MAX_ITERATIONS: usize = 10_000;

/// Accepted distance between the curve's x(t) and the requested temperature.
pub const EPSILON: f32 = 1e-3;

/// Lowest and highest values accepted for speeds and Bezier coordinates.
pub const MIN_VALUE: f32 = 0.0;
pub const MAX_VALUE: f32 = 100.0;

/// Point in 2D space for fan curve calculations.
///
/// `x` is a temperature in degrees Celsius and `y` a speed percentage.
///
/// # Example
///
/// ```
/// use tt_fanctl::fan_curve::Point;
///
/// let point = Point { x: 45.0, y: 60.0 }; // 45°C -> 60% fan speed
/// let from_tuple: Point = (45.0, 60.0).into();
/// assert_eq!(point, from_tuple);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl From<(f32, f32)> for Point {
    fn from(value: (f32, f32)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

/// Which curve representation drives fan speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurveMode {
    #[default]
    Point,
    Bezier,
}

/// Sorted temperature/speed table with linear interpolation between entries.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCurve {
    temps: Vec<f32>,
    speeds: Vec<f32>,
}

impl Default for PointCurve {
    /// 21 points from 0°C to 100°C in 5°C steps, constant 50%.
    fn default() -> Self {
        Self {
            temps: (0..=100).step_by(5).map(|t| t as f32).collect(),
            speeds: vec![50.0; 21],
        }
    }
}

impl PointCurve {
    /// Builds a validated point table.
    ///
    /// # Errors
    ///
    /// Returns an error if the lists differ in length, are empty, temperatures
    /// are not strictly ascending, or a speed lies outside 0-100.
    pub fn new(temps: Vec<f32>, speeds: Vec<f32>) -> Result<Self> {
        validate_point_table(&temps, &speeds)?;
        Ok(Self { temps, speeds })
    }

    /// Replaces both lists at once. The curve is left untouched on error.
    pub fn update_data(&mut self, temps: Vec<f32>, speeds: Vec<f32>) -> Result<()> {
        validate_point_table(&temps, &speeds)?;
        self.temps = temps;
        self.speeds = speeds;
        Ok(())
    }

    pub fn temps(&self) -> &[f32] {
        &self.temps
    }

    pub fn speeds(&self) -> &[f32] {
        &self.speeds
    }

    /// Looks up the speed for `temp`.
    ///
    /// Below the first entry the first speed is returned, above the last entry
    /// the last speed is returned.
    pub fn speed_for_temperature(&self, temp: f32) -> f32 {
        match self.temps.iter().position(|&t| t >= temp) {
            Some(0) => self.speeds[0],
            Some(n) => {
                let (t0, t1) = (self.temps[n - 1], self.temps[n]);
                let (s0, s1) = (self.speeds[n - 1], self.speeds[n]);
                s0 + (s1 - s0) / (t1 - t0) * (temp - t0)
            }
            None => self.speeds.last().copied().unwrap_or(MIN_VALUE),
        }
    }
}

/// Cubic Bezier curve defined by two endpoints and two handles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierCurve {
    points: [Point; 4],
}

impl Default for BezierCurve {
    fn default() -> Self {
        Self {
            points: [
                (0.0, 0.0).into(),
                (40.0, 60.0).into(),
                (60.0, 40.0).into(),
                (100.0, 100.0).into(),
            ],
        }
    }
}

impl BezierCurve {
    /// Builds a curve after checking every coordinate lies in 0-100.
    pub fn new(points: [Point; 4]) -> Result<Self> {
        validate_control_points(&points)?;
        Ok(Self { points })
    }

    /// Builds a curve from a slice, which must hold exactly four points.
    pub fn from_slice(points: &[Point]) -> Result<Self> {
        let Ok(points) = <[Point; 4]>::try_from(points) else {
            bail!(
                "Bezier curve needs exactly 4 control points, got {}",
                points.len()
            );
        };
        Self::new(points)
    }

    pub fn update_points(&mut self, points: [Point; 4]) -> Result<()> {
        validate_control_points(&points)?;
        self.points = points;
        Ok(())
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.points
    }

    /// Evaluates the curve at parameter `t` in `[0, 1]`.
    pub fn at(&self, t: f32) -> Point {
        let pts = &self.points;
        let u = 1.0 - t;
        let tt = t * t;
        let uu = u * u;
        let uuu = uu * u;
        let ttt = tt * t;

        let x = uuu * pts[0].x + 3.0 * uu * t * pts[1].x + 3.0 * u * tt * pts[2].x + ttt * pts[3].x;
        let y = uuu * pts[0].y + 3.0 * uu * t * pts[1].y + 3.0 * u * tt * pts[2].y + ttt * pts[3].y;

        (x, y).into()
    }

    /// Finds the speed for `temp` by bisecting on `t`.
    ///
    /// Assumes x(t) increases over `[0, 1]`. When the iteration budget runs
    /// out the y of the last midpoint is returned.
    pub fn speed_for_temperature(&self, temp: f32) -> f32 {
        let mut t_low = 0.0_f32;
        let mut t_high = 1.0_f32;
        let mut last = self.at(0.5);

        for _ in 0..MAX_ITERATIONS {
            let t_mid = (t_low + t_high) * 0.5;
            last = self.at(t_mid);

            if (last.x - temp).abs() < EPSILON {
                return last.y;
            }
            if last.x < temp {
                t_low = t_mid;
            } else {
                t_high = t_mid;
            }
        }

        last.y
    }
}

/// Replacement data for one of a fan's curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CurveData {
    Point { temps: Vec<f32>, speeds: Vec<f32> },
    Bezier { points: [Point; 4] },
}

impl CurveData {
    pub fn mode(&self) -> CurveMode {
        match self {
            CurveData::Point { .. } => CurveMode::Point,
            CurveData::Bezier { .. } => CurveMode::Bezier,
        }
    }
}

/// Computes a speed from whichever curve `mode` selects.
pub fn speed_for_temperature(
    mode: CurveMode,
    points: &PointCurve,
    bezier: &BezierCurve,
    temp: f32,
) -> f32 {
    match mode {
        CurveMode::Point => points.speed_for_temperature(temp),
        CurveMode::Bezier => bezier.speed_for_temperature(temp),
    }
}

/// Converts a curve result into the byte sent to the controller.
pub fn to_duty(speed: f32) -> u8 {
    if speed.is_nan() {
        return 0;
    }
    speed.round().clamp(MIN_VALUE, MAX_VALUE) as u8
}

pub fn validate_point_table(temps: &[f32], speeds: &[f32]) -> Result<()> {
    if temps.len() != speeds.len() {
        bail!(
            "Point curve has mismatched temperatures ({}) and speeds ({})",
            temps.len(),
            speeds.len()
        );
    }
    if temps.is_empty() {
        bail!("Point curve cannot be empty");
    }
    if temps.iter().any(|t| !t.is_finite()) {
        bail!("Point curve temperatures must be finite");
    }
    if let Some(idx) = temps.windows(2).position(|w| w[1] <= w[0]) {
        bail!(
            "Point curve temperatures must be strictly ascending (point {})",
            idx + 1
        );
    }
    if let Some(speed) = speeds.iter().find(|s| !(MIN_VALUE..=MAX_VALUE).contains(*s)) {
        bail!("Point curve speed {speed} outside 0-100");
    }
    Ok(())
}

pub fn validate_control_points(points: &[Point]) -> Result<()> {
    if points.len() != 4 {
        bail!(
            "Bezier curve needs exactly 4 control points, got {}",
            points.len()
        );
    }
    let range = MIN_VALUE..=MAX_VALUE;
    if let Some(p) = points
        .iter()
        .find(|p| !range.contains(&p.x) || !range.contains(&p.y))
    {
        bail!("Bezier control point ({}, {}) outside 0-100", p.x, p.y);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn default_point_curve_is_flat_fifty() {
        let curve = PointCurve::default();
        assert_eq!(curve.temps().len(), 21);
        assert_eq!(curve.speed_for_temperature(0.0), 50.0);
        assert_eq!(curve.speed_for_temperature(73.0), 50.0);
    }

    #[test]
    fn point_curve_interpolates_between_entries() {
        let curve = PointCurve::new(vec![0.0, 20.0, 40.0], vec![50.0, 60.0, 70.0]).unwrap();
        assert_eq!(curve.speed_for_temperature(10.0), 55.0);
        assert_eq!(curve.speed_for_temperature(30.0), 65.0);
        assert_eq!(curve.speed_for_temperature(20.0), 60.0);
    }

    #[test]
    fn point_curve_clamps_outside_range() {
        let curve = PointCurve::new(vec![30.0, 60.0], vec![20.0, 80.0]).unwrap();
        assert_eq!(curve.speed_for_temperature(-10.0), 20.0);
        assert_eq!(curve.speed_for_temperature(30.0), 20.0);
        assert_eq!(curve.speed_for_temperature(95.0), 80.0);
    }

    #[test]
    fn point_curve_rejects_bad_tables() {
        assert!(PointCurve::new(vec![0.0, 10.0], vec![10.0]).is_err());
        assert!(PointCurve::new(vec![], vec![]).is_err());
        assert!(PointCurve::new(vec![0.0, 10.0, 10.0], vec![1.0, 2.0, 3.0]).is_err());
        assert!(PointCurve::new(vec![20.0, 10.0], vec![1.0, 2.0]).is_err());
        assert!(PointCurve::new(vec![0.0, 10.0], vec![1.0, 120.0]).is_err());
    }

    #[test]
    fn update_data_keeps_old_table_on_error() {
        let mut curve = PointCurve::default();
        let err = curve.update_data(vec![0.0, 0.0], vec![10.0, 20.0]);
        assert!(err.is_err());
        assert_eq!(curve, PointCurve::default());

        curve
            .update_data(vec![10.0, 90.0], vec![0.0, 100.0])
            .unwrap();
        assert_eq!(curve.speed_for_temperature(50.0), 50.0);
    }

    #[test]
    fn default_bezier_starts_at_zero() {
        let curve = BezierCurve::default();
        assert!(curve.speed_for_temperature(0.0).abs() < 0.01);
        assert!((curve.speed_for_temperature(100.0) - 100.0).abs() < 0.01);
    }

    #[test]
    fn bezier_endpoints_are_exact() {
        let curve = BezierCurve::default();
        assert_eq!(curve.at(0.0), Point { x: 0.0, y: 0.0 });
        assert_eq!(curve.at(1.0), Point { x: 100.0, y: 100.0 });
    }

    #[test]
    fn bezier_from_slice_requires_four_points() {
        let three = [Point { x: 0.0, y: 0.0 }; 3];
        let err = BezierCurve::from_slice(&three).unwrap_err();
        assert!(err.to_string().contains("exactly 4"));
        assert!(BezierCurve::from_slice(&[Point { x: 0.0, y: 0.0 }; 4]).is_ok());
    }

    #[test]
    fn bezier_rejects_out_of_range_points() {
        let points = [
            (0.0, 0.0).into(),
            (40.0, 160.0).into(),
            (60.0, 40.0).into(),
            (100.0, 100.0).into(),
        ];
        assert!(BezierCurve::new(points).is_err());
    }

    #[test]
    fn mode_selects_curve() {
        let points = PointCurve::default();
        let bezier = BezierCurve::default();
        assert_eq!(
            speed_for_temperature(CurveMode::Point, &points, &bezier, 0.0),
            50.0
        );
        assert!(speed_for_temperature(CurveMode::Bezier, &points, &bezier, 0.0) < 0.01);
    }

    #[test]
    fn duty_rounds_and_clamps() {
        assert_eq!(to_duty(55.4), 55);
        assert_eq!(to_duty(55.5), 56);
        assert_eq!(to_duty(-3.0), 0);
        assert_eq!(to_duty(180.0), 100);
        assert_eq!(to_duty(f32::NAN), 0);
    }

    #[test]
    fn curve_mode_serde_names() {
        let mode: CurveMode = serde_json::from_str("\"bezier\"").unwrap();
        assert_eq!(mode, CurveMode::Bezier);
    }

    proptest! {
        #[test]
        fn point_curve_stays_within_speed_range(
            steps in prop::collection::vec((0.5f32..20.0f32, 0.0f32..=100.0f32), 2..12),
            temp in -20.0f32..250.0f32,
        ) {
            let mut t = 0.0;
            let (temps, speeds): (Vec<f32>, Vec<f32>) = steps
                .into_iter()
                .map(|(dt, s)| {
                    t += dt;
                    (t, s)
                })
                .unzip();
            let lo = speeds.iter().copied().fold(f32::INFINITY, f32::min);
            let hi = speeds.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let curve = PointCurve::new(temps, speeds).unwrap();
            let speed = curve.speed_for_temperature(temp);
            prop_assert!(speed >= lo - 1e-3 && speed <= hi + 1e-3);
        }

        #[test]
        fn linear_bezier_tracks_identity(temp in 0.0f32..=100.0f32) {
            let curve = BezierCurve::new([
                (0.0, 0.0).into(),
                (100.0 / 3.0, 100.0 / 3.0).into(),
                (200.0 / 3.0, 200.0 / 3.0).into(),
                (100.0, 100.0).into(),
            ]).unwrap();
            prop_assert!((curve.speed_for_temperature(temp) - temp).abs() < 0.05);
        }

        #[test]
        fn bezier_stays_within_control_hull(temp in 0.0f32..=100.0f32) {
            let speed = BezierCurve::default().speed_for_temperature(temp);
            prop_assert!((0.0..=100.0).contains(&speed));
        }
    }
}
