//! Power-basis polynomials of degree at most 7, and the 4-D bundle the
//! trajectory player evaluates.
//!
//! Coefficients are single precision; `p(t) = c[0] + c[1]*t + ...`.
//! Root finding and extremum search only cover what the segment formats
//! can produce (degree <= 3); higher degrees report an error.

use crate::error::{Result, ShowError};
use crate::point::Point4;

/// Maximum number of coefficients (degree 7).
pub const MAX_COEFFS: usize = 8;

const FACTORIAL: [f64; 8] = [1.0, 1.0, 2.0, 6.0, 24.0, 120.0, 720.0, 5040.0];

/// A real polynomial with up to eight coefficients.
///
/// `len == 0` denotes the zero polynomial. Slots at `len` and above are
/// held at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poly {
    coeffs: [f32; MAX_COEFFS],
    len: usize,
}

impl Poly {
    /// The zero polynomial.
    pub fn zero() -> Self {
        Self {
            coeffs: [0.0; MAX_COEFFS],
            len: 0,
        }
    }

    /// A constant polynomial.
    pub fn constant(value: f32) -> Self {
        let mut coeffs = [0.0; MAX_COEFFS];
        coeffs[0] = value;
        Self { coeffs, len: 1 }
    }

    /// Build from explicit power-basis coefficients (at most eight).
    pub fn from_coeffs(coeffs: &[f32]) -> Result<Self> {
        if coeffs.len() > MAX_COEFFS {
            return Err(ShowError::InvalidArgument("more than 8 coefficients"));
        }
        let mut out = Self::zero();
        out.coeffs[..coeffs.len()].copy_from_slice(coeffs);
        out.len = coeffs.len();
        Ok(out)
    }

    /// Linear interpolation from `a` at time 0 to `b` at time `duration`.
    ///
    /// A zero duration degenerates to a constant at the midpoint.
    pub fn linear(duration: f32, a: f32, b: f32) -> Self {
        if duration <= 0.0 {
            return Self::constant((a + b) / 2.0);
        }
        let mut coeffs = [0.0; MAX_COEFFS];
        coeffs[0] = a;
        coeffs[1] = (b - a) / duration;
        Self { coeffs, len: 2 }
    }

    /// Build from Bézier control points over `[0, duration]`.
    ///
    /// Converts the Bernstein basis to the power basis with
    /// `c_j = (n!/(n-j)!) * sum_{i=0..j} (-1)^(j-i) * P_i / (i!*(j-i)!)`
    /// and then stretches the unit-interval result to the duration.
    pub fn bezier(duration: f32, points: &[f32]) -> Result<Self> {
        if points.is_empty() || points.len() > MAX_COEFFS {
            return Err(ShowError::InvalidArgument(
                "bezier needs 1 to 8 control points",
            ));
        }
        if duration <= 0.0 {
            let mid = (points[0] + points[points.len() - 1]) / 2.0;
            return Ok(Self::constant(mid));
        }

        let n = points.len() - 1;
        let mut out = Self::zero();
        out.len = points.len();
        for j in 0..=n {
            let mut sum = 0.0f64;
            for (i, &p) in points.iter().take(j + 1).enumerate() {
                let sign = if (j - i) % 2 == 0 { 1.0 } else { -1.0 };
                sum += sign * f64::from(p) / (FACTORIAL[i] * FACTORIAL[j - i]);
            }
            let falling = FACTORIAL[n] / FACTORIAL[n - j];
            out.coeffs[j] = (falling * sum) as f32;
        }
        out.stretch(duration);
        Ok(out)
    }

    /// Number of stored coefficients.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Degree as stored (`max(0, len - 1)`).
    pub fn degree(&self) -> usize {
        self.len.saturating_sub(1)
    }

    pub fn coeffs(&self) -> &[f32] {
        &self.coeffs[..self.len]
    }

    /// Evaluate with Horner's rule.
    pub fn eval(&self, t: f32) -> f32 {
        let mut acc = 0.0f32;
        for &c in self.coeffs[..self.len].iter().rev() {
            acc = acc * t + c;
        }
        acc
    }

    /// Double-precision evaluation for range-sensitive callers.
    pub fn eval_f64(&self, t: f64) -> f64 {
        let mut acc = 0.0f64;
        for &c in self.coeffs[..self.len].iter().rev() {
            acc = acc * t + f64::from(c);
        }
        acc
    }

    /// Differentiate in place. Degree 0 (and the zero polynomial) becomes
    /// the zero polynomial.
    pub fn differentiate(&mut self) {
        if self.len <= 1 {
            *self = Self::zero();
            return;
        }
        for i in 1..self.len {
            self.coeffs[i - 1] = self.coeffs[i] * i as f32;
        }
        self.coeffs[self.len - 1] = 0.0;
        self.len -= 1;
    }

    /// Return the derivative, leaving `self` untouched.
    pub fn derivative(&self) -> Self {
        let mut d = *self;
        d.differentiate();
        d
    }

    /// Multiply every coefficient by `factor`.
    pub fn scale(&mut self, factor: f32) {
        for c in &mut self.coeffs[..self.len] {
            *c *= factor;
        }
    }

    /// Stretch the time axis: afterwards `p(t)` equals the old `p(t / factor)`.
    pub fn stretch(&mut self, factor: f32) {
        let inv = 1.0 / f64::from(factor);
        let mut power = 1.0f64;
        for c in &mut self.coeffs[..self.len] {
            *c = (f64::from(*c) * power) as f32;
            power *= inv;
        }
    }

    /// Real roots, for effective degree at most 3.
    ///
    /// Trailing zero coefficients are ignored, so a cubic slot holding a
    /// parabola solves as a quadratic. Roots come back sorted ascending.
    pub fn real_roots(&self) -> Result<Roots> {
        let n = self.effective_len();
        let mut roots = Roots::default();
        match n {
            0 | 1 => {}
            2 => {
                let c0 = f64::from(self.coeffs[0]);
                let c1 = f64::from(self.coeffs[1]);
                roots.push((-c0 / c1) as f32);
            }
            3 => {
                let a = f64::from(self.coeffs[2]);
                let b = f64::from(self.coeffs[1]);
                let c = f64::from(self.coeffs[0]);
                let disc = b * b - 4.0 * a * c;
                if disc > 0.0 {
                    let sq = disc.sqrt();
                    roots.push(((-b - sq) / (2.0 * a)) as f32);
                    roots.push(((-b + sq) / (2.0 * a)) as f32);
                } else if disc == 0.0 {
                    roots.push((-b / (2.0 * a)) as f32);
                }
            }
            4 => {
                let a = f64::from(self.coeffs[3]);
                let b = f64::from(self.coeffs[2]);
                let c = f64::from(self.coeffs[1]);
                let d = f64::from(self.coeffs[0]);
                solve_cubic(a, b, c, d, &mut roots);
            }
            _ => return Err(ShowError::UnsupportedDegree { degree: n - 1 }),
        }
        roots.sort();
        Ok(roots)
    }

    /// Minimum and maximum over `[0, 1]`, for effective degree at most 3.
    pub fn extrema_on_unit(&self) -> Result<(f32, f32)> {
        self.extrema_on(1.0)
    }

    /// Minimum and maximum over `[0, end]`, for effective degree at most 3.
    pub fn extrema_on(&self, end: f32) -> Result<(f32, f32)> {
        let n = self.effective_len();
        if n > 4 {
            return Err(ShowError::UnsupportedDegree { degree: n - 1 });
        }
        let stationary = self.derivative().real_roots()?;
        let mut min = self.eval(0.0);
        let mut max = min;
        let candidates = [end]
            .into_iter()
            .chain(stationary.as_slice().iter().copied())
            .filter(|t| (0.0..=end).contains(t));
        for t in candidates {
            let v = self.eval(t);
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        Ok((min, max))
    }

    /// Earliest `t` in `[0, 1]` where the polynomial reaches `threshold`,
    /// if it does.
    pub fn first_touch(&self, threshold: f32) -> Result<Option<f32>> {
        self.touch(threshold, false)
    }

    /// Latest `t` in `[0, 1]` where the polynomial reaches `threshold`.
    pub fn last_touch(&self, threshold: f32) -> Result<Option<f32>> {
        self.touch(threshold, true)
    }

    fn touch(&self, threshold: f32, latest: bool) -> Result<Option<f32>> {
        let mut shifted = *self;
        if shifted.len == 0 {
            shifted = Self::constant(0.0);
        }
        shifted.coeffs[0] -= threshold;
        if shifted.effective_len() <= 1 {
            // Constant: either touching everywhere or never.
            return Ok(if shifted.coeffs[0] == 0.0 {
                Some(if latest { 1.0 } else { 0.0 })
            } else {
                None
            });
        }
        const EPS: f32 = 1e-6;
        let roots = shifted.real_roots()?;
        let hit = roots
            .as_slice()
            .iter()
            .copied()
            .filter(|&t| (-EPS..=1.0 + EPS).contains(&t))
            .map(|t| t.clamp(0.0, 1.0));
        Ok(if latest {
            hit.reduce(f32::max)
        } else {
            hit.reduce(f32::min)
        })
    }

    /// Coefficient count with trailing zeros stripped.
    fn effective_len(&self) -> usize {
        let mut n = self.len;
        while n > 0 && self.coeffs[n - 1] == 0.0 {
            n -= 1;
        }
        n
    }
}

impl Default for Poly {
    fn default() -> Self {
        Self::zero()
    }
}

/// Up to three real roots, ascending.
#[derive(Debug, Clone, Copy, Default)]
pub struct Roots {
    vals: [f32; 3],
    len: usize,
}

impl Roots {
    fn push(&mut self, value: f32) {
        if self.len < self.vals.len() {
            self.vals[self.len] = value;
            self.len += 1;
        }
    }

    fn sort(&mut self) {
        self.vals[..self.len].sort_by(f32::total_cmp);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.vals[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Real roots of `a*x^3 + b*x^2 + c*x + d` with `a != 0`.
///
/// Depressed-cubic substitution `x = t - b/(3a)`, then the trigonometric
/// branch for three real roots and Cardano for one.
fn solve_cubic(a: f64, b: f64, c: f64, d: f64, roots: &mut Roots) {
    let shift = -b / (3.0 * a);
    let p = (3.0 * a * c - b * b) / (3.0 * a * a);
    let q = (2.0 * b * b * b - 9.0 * a * b * c + 27.0 * a * a * d) / (27.0 * a * a * a);

    const EPS: f64 = 1e-12;
    if p.abs() < EPS && q.abs() < EPS {
        roots.push(shift as f32);
        return;
    }

    let disc = (q / 2.0) * (q / 2.0) + (p / 3.0) * (p / 3.0) * (p / 3.0);
    if disc > EPS {
        let sq = disc.sqrt();
        let t = (-q / 2.0 + sq).cbrt() + (-q / 2.0 - sq).cbrt();
        roots.push((t + shift) as f32);
    } else if disc.abs() <= EPS {
        // Double root plus a simple one.
        roots.push((3.0 * q / p + shift) as f32);
        roots.push((-3.0 * q / (2.0 * p) + shift) as f32);
    } else {
        let r = 2.0 * (-p / 3.0).sqrt();
        let phi = (3.0 * q / (p * r)).clamp(-1.0, 1.0).acos() / 3.0;
        for k in 0..3 {
            let t = r * (phi - 2.0 * std::f64::consts::PI * f64::from(k) / 3.0).cos();
            roots.push((t + shift) as f32);
        }
    }
}

// ---------------------------------------------------------------------------
// 4-D bundle
// ---------------------------------------------------------------------------

/// Four independent polynomials: position axes in millimeters and yaw in
/// degrees, all over the same time interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Poly4 {
    pub x: Poly,
    pub y: Poly,
    pub z: Poly,
    pub yaw: Poly,
}

impl Poly4 {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn new(x: Poly, y: Poly, z: Poly, yaw: Poly) -> Self {
        Self { x, y, z, yaw }
    }

    /// A constant bundle pinned at one sample.
    pub fn constant(at: Point4) -> Self {
        Self {
            x: Poly::constant(at.x),
            y: Poly::constant(at.y),
            z: Poly::constant(at.z),
            yaw: Poly::constant(at.yaw),
        }
    }

    pub fn eval(&self, t: f32) -> Point4 {
        Point4 {
            x: self.x.eval(t),
            y: self.y.eval(t),
            z: self.z.eval(t),
            yaw: self.yaw.eval(t),
        }
    }

    pub fn differentiate(&mut self) {
        self.x.differentiate();
        self.y.differentiate();
        self.z.differentiate();
        self.yaw.differentiate();
    }

    pub fn derivative(&self) -> Self {
        let mut d = *self;
        d.differentiate();
        d
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-3, "expected {b}, got {a}");
    }

    #[test]
    fn zero_polynomial() {
        let p = Poly::zero();
        assert_eq!(p.len(), 0);
        assert_eq!(p.eval(42.0), 0.0);
        assert_eq!(p.degree(), 0);
    }

    #[test]
    fn horner_eval() {
        // 2 + 3t + t^2
        let p = Poly::from_coeffs(&[2.0, 3.0, 1.0]).unwrap();
        assert_eq!(p.eval(0.0), 2.0);
        assert_eq!(p.eval(1.0), 6.0);
        assert_eq!(p.eval(2.0), 12.0);
        assert_eq!(p.eval_f64(2.0), 12.0);
    }

    #[test]
    fn linear_hits_endpoints() {
        let p = Poly::linear(4.0, 10.0, 30.0);
        assert_eq!(p.eval(0.0), 10.0);
        assert_eq!(p.eval(4.0), 30.0);
        assert_eq!(p.eval(2.0), 20.0);
    }

    #[test]
    fn linear_zero_duration_is_midpoint() {
        let p = Poly::linear(0.0, 10.0, 30.0);
        assert_eq!(p.len(), 1);
        assert_eq!(p.eval(0.0), 20.0);
    }

    #[test]
    fn derivative_of_constant_is_zero() {
        let mut p = Poly::constant(7.0);
        p.differentiate();
        assert_eq!(p, Poly::zero());
    }

    #[test]
    fn derivative_shifts_down() {
        // 1 + 2t + 3t^2 -> 2 + 6t
        let p = Poly::from_coeffs(&[1.0, 2.0, 3.0]).unwrap().derivative();
        assert_eq!(p.coeffs(), &[2.0, 6.0]);
    }

    #[test]
    fn stretch_rescales_time() {
        let p = Poly::from_coeffs(&[1.0, 2.0, 3.0]).unwrap();
        let mut q = p;
        q.stretch(5.0);
        for t in [0.0f32, 1.0, 2.5, 5.0, 7.5] {
            assert_close(q.eval(t), p.eval(t / 5.0));
        }
    }

    #[test]
    fn scale_multiplies_values() {
        let mut p = Poly::from_coeffs(&[1.0, -2.0]).unwrap();
        p.scale(3.0);
        assert_eq!(p.eval(1.0), -3.0);
    }

    #[test]
    fn bezier_endpoints_match_control_points() {
        let pts = [0.0f32, 10.0, -5.0, 20.0];
        let p = Poly::bezier(2.0, &pts).unwrap();
        assert_close(p.eval(0.0), 0.0);
        assert_close(p.eval(2.0), 20.0);
    }

    #[test]
    fn bezier_linear_case() {
        let p = Poly::bezier(10.0, &[0.0, 100.0]).unwrap();
        assert_close(p.eval(5.0), 50.0);
    }

    #[test]
    fn bezier_cubic_midpoint() {
        // Symmetric cubic: midpoint is the average weighted 1:3:3:1.
        let p = Poly::bezier(1.0, &[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert_close(p.eval(0.5), 0.5);
    }

    #[test]
    fn bezier_zero_duration() {
        let p = Poly::bezier(0.0, &[2.0, 100.0, 4.0]).unwrap();
        assert_eq!(p.eval(0.0), 3.0);
    }

    #[test]
    fn roots_of_degree_zero() {
        assert!(Poly::constant(5.0).real_roots().unwrap().is_empty());
        assert!(Poly::zero().real_roots().unwrap().is_empty());
    }

    #[test]
    fn roots_linear() {
        let p = Poly::from_coeffs(&[-6.0, 2.0]).unwrap();
        assert_eq!(p.real_roots().unwrap().as_slice(), &[3.0]);
    }

    #[test]
    fn roots_quadratic() {
        // (t - 1)(t - 3) = 3 - 4t + t^2
        let p = Poly::from_coeffs(&[3.0, -4.0, 1.0]).unwrap();
        let roots = p.real_roots().unwrap();
        assert_eq!(roots.as_slice(), &[1.0, 3.0]);

        // t^2 + 1 has no real roots
        let p = Poly::from_coeffs(&[1.0, 0.0, 1.0]).unwrap();
        assert!(p.real_roots().unwrap().is_empty());
    }

    #[test]
    fn roots_cubic_three_real() {
        // (t - 1)(t - 2)(t - 4) = -8 + 14t - 7t^2 + t^3
        let p = Poly::from_coeffs(&[-8.0, 14.0, -7.0, 1.0]).unwrap();
        let roots = p.real_roots().unwrap();
        assert_eq!(roots.len(), 3);
        assert_close(roots.as_slice()[0], 1.0);
        assert_close(roots.as_slice()[1], 2.0);
        assert_close(roots.as_slice()[2], 4.0);
    }

    #[test]
    fn roots_cubic_one_real() {
        // t^3 - 1 = 0 -> t = 1
        let p = Poly::from_coeffs(&[-1.0, 0.0, 0.0, 1.0]).unwrap();
        let roots = p.real_roots().unwrap();
        assert_eq!(roots.len(), 1);
        assert_close(roots.as_slice()[0], 1.0);
    }

    #[test]
    fn roots_cubic_with_leading_zero_solves_lower_degree() {
        // Stored as 4 coefficients but actually linear.
        let p = Poly::from_coeffs(&[-2.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!(p.real_roots().unwrap().as_slice(), &[2.0]);
    }

    #[test]
    fn roots_degree_four_unsupported() {
        let p = Poly::from_coeffs(&[0.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(matches!(
            p.real_roots(),
            Err(ShowError::UnsupportedDegree { degree: 4 })
        ));
    }

    #[test]
    fn extrema_of_parabola() {
        // (t - 0.5)^2 = 0.25 - t + t^2: min 0 at 0.5, max 0.25 at ends
        let p = Poly::from_coeffs(&[0.25, -1.0, 1.0]).unwrap();
        let (min, max) = p.extrema_on_unit().unwrap();
        assert_close(min, 0.0);
        assert_close(max, 0.25);
    }

    #[test]
    fn extrema_monotone() {
        let p = Poly::linear(1.0, -3.0, 5.0);
        let (min, max) = p.extrema_on_unit().unwrap();
        assert_eq!((min, max), (-3.0, 5.0));
    }

    #[test]
    fn first_touch_finds_earliest() {
        // Rises 0 -> 10 linearly; touches 5 at t = 0.5
        let p = Poly::linear(1.0, 0.0, 10.0);
        assert_close(p.first_touch(5.0).unwrap().unwrap(), 0.5);
        assert!(p.first_touch(20.0).unwrap().is_none());
    }

    #[test]
    fn touch_on_constant() {
        let p = Poly::constant(3.0);
        assert_eq!(p.first_touch(3.0).unwrap(), Some(0.0));
        assert_eq!(p.last_touch(3.0).unwrap(), Some(1.0));
        assert_eq!(p.first_touch(4.0).unwrap(), None);
    }

    #[test]
    fn last_touch_finds_latest() {
        // Parabola crossing 0.25 at t = 0 and t = 1 exactly.
        let p = Poly::from_coeffs(&[0.25, -1.0, 1.0]).unwrap();
        assert_close(p.last_touch(0.25).unwrap().unwrap(), 1.0);
        assert_close(p.first_touch(0.25).unwrap().unwrap(), 0.0);
    }

    #[test]
    fn poly4_eval_and_derivative() {
        let p4 = Poly4::new(
            Poly::linear(2.0, 0.0, 10.0),
            Poly::constant(5.0),
            Poly::linear(2.0, 0.0, -4.0),
            Poly::constant(90.0),
        );
        let at = p4.eval(1.0);
        assert_eq!(at.x, 5.0);
        assert_eq!(at.y, 5.0);
        assert_eq!(at.z, -2.0);
        assert_eq!(at.yaw, 90.0);

        let v = p4.derivative().eval(1.0);
        assert_eq!(v.x, 5.0);
        assert_eq!(v.y, 0.0);
        assert_eq!(v.z, -2.0);
        assert_eq!(v.yaw, 0.0);
    }
}
