//! Butterworth high-pass design and causal direct-form evaluation.
//!
//! The velocity signal carries integration drift; a high-pass IIR filter
//! removes it. Coefficients are designed once at startup and shared
//! read-only across sessions.
//!
//! Design algorithm (matches `scipy.signal.butter(order, wn, 'high')`):
//! 1. Normalize: `wn = cutoff / (sample_rate / 2)`
//! 2. Prewarp the cutoff for the bilinear transform
//! 3. Analog low-pass prototype poles on the unit circle (left half-plane)
//! 4. Low-pass → high-pass transform (poles to `warped / p`, zeros at 0)
//! 5. Bilinear transform to the z-plane
//! 6. Expand pole/zero products into real polynomial coefficients
//!
//! Evaluation is the standard difference equation
//! `y[t] = Σ b[j]·x[t-j] − Σ a[j]·y[t-j]`, computed as dot products of the
//! reversed coefficient vectors against the trailing sample windows the
//! session rings hold.

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::error::PipelineError;

/// Digital IIR transfer-function coefficients, `a` monic.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl FilterCoefficients {
    pub fn order(&self) -> usize {
        self.b.len() - 1
    }

    /// The denominator must be monic; a violation is a configuration error,
    /// fatal at startup and never checked per-sample.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let a0 = *self.a.first().unwrap_or(&0.0);
        if (a0 - 1.0).abs() > 1e-9 {
            return Err(PipelineError::FilterPrecondition { a0 });
        }
        if self.a.len() != self.b.len() || self.b.is_empty() {
            return Err(PipelineError::InvalidFilterDesign {
                reason: format!(
                    "coefficient lengths mismatch: b={}, a={}",
                    self.b.len(),
                    self.a.len()
                ),
            });
        }
        Ok(())
    }

    /// One output step from the trailing windows, both oldest-to-newest:
    /// `x_trailing` holds the last `order + 1` inputs (current included),
    /// `y_trailing` the last `order` outputs. Short windows pair with the
    /// most recent coefficients, so seeded-zero histories evaluate cleanly.
    pub fn evaluate<I, J>(&self, x_trailing: I, y_trailing: J) -> f64
    where
        I: ExactSizeIterator<Item = f64>,
        J: ExactSizeIterator<Item = f64>,
    {
        let order = self.order();

        let x_len = x_trailing.len();
        let mut acc = 0.0;
        for (i, x) in x_trailing.enumerate() {
            // Oldest entry pairs with the highest-lag coefficient.
            let lag = x_len - 1 - i;
            if lag <= order {
                acc += self.b[lag] * x;
            }
        }

        let y_len = y_trailing.len();
        for (i, y) in y_trailing.enumerate() {
            let lag = y_len - i;
            if lag <= order {
                acc -= self.a[lag] * y;
            }
        }

        acc
    }
}

/// Design a digital Butterworth high-pass filter.
pub fn butterworth_highpass(
    order: usize,
    cutoff_hz: f64,
    sample_rate_hz: f64,
) -> Result<FilterCoefficients, PipelineError> {
    if order == 0 {
        return Err(PipelineError::InvalidFilterDesign {
            reason: "order must be at least 1".to_string(),
        });
    }
    let nyquist = sample_rate_hz / 2.0;
    if !(cutoff_hz > 0.0 && cutoff_hz < nyquist) {
        return Err(PipelineError::InvalidFilterDesign {
            reason: format!(
                "cutoff {} Hz outside (0, {}) at {} Hz sampling",
                cutoff_hz, nyquist, sample_rate_hz
            ),
        });
    }

    let wn = cutoff_hz / nyquist;
    // Internal sampling frequency 2.0; prewarp the normalized cutoff.
    let fs = 2.0;
    let warped = 2.0 * fs * (PI * wn / fs).tan();

    // Analog low-pass prototype: poles at -exp(i*pi*m / 2N), m = -N+1..N-1.
    let n = order as f64;
    let prototype: Vec<Complex64> = (0..order)
        .map(|k| {
            let m = 2.0 * k as f64 - n + 1.0;
            -(Complex64::i() * PI * m / (2.0 * n)).exp()
        })
        .collect();

    // Low-pass -> high-pass: poles move to warped/p, N zeros land at s = 0.
    let poles_hp: Vec<Complex64> = prototype
        .iter()
        .map(|&p| Complex64::new(warped, 0.0) / p)
        .collect();
    let gain_hp = (Complex64::new(1.0, 0.0)
        / prototype.iter().map(|&p| -p).product::<Complex64>())
    .re;

    // Bilinear transform at fs2 = 2*fs; the s-plane zeros at 0 map to z = 1.
    let fs2 = Complex64::new(2.0 * fs, 0.0);
    let poles_z: Vec<Complex64> = poles_hp.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    let zeros_z: Vec<Complex64> = vec![Complex64::new(1.0, 0.0); order];
    let gain_z = gain_hp
        * (fs2.powu(order as u32)
            / poles_hp
                .iter()
                .map(|&p| fs2 - p)
                .product::<Complex64>())
        .re;

    let b: Vec<f64> = poly(&zeros_z).iter().map(|c| gain_z * c.re).collect();
    let a: Vec<f64> = poly(&poles_z).iter().map(|c| c.re).collect();

    let coeffs = FilterCoefficients { b, a };
    coeffs.validate()?;
    Ok(coeffs)
}

/// Expand `(x - r0)(x - r1)...` into monic polynomial coefficients.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &root in roots {
        coeffs.push(Complex64::new(0.0, 0.0));
        for i in (1..coeffs.len()).rev() {
            let lower = coeffs[i - 1];
            coeffs[i] -= root * lower;
        }
    }
    coeffs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nyquist_gain(coeffs: &FilterCoefficients) -> f64 {
        let num: f64 = coeffs
            .b
            .iter()
            .enumerate()
            .map(|(j, &c)| c * if j % 2 == 0 { 1.0 } else { -1.0 })
            .sum();
        let den: f64 = coeffs
            .a
            .iter()
            .enumerate()
            .map(|(j, &c)| c * if j % 2 == 0 { 1.0 } else { -1.0 })
            .sum();
        num / den
    }

    #[test]
    fn test_first_order_closed_form() {
        // For order 1 the design has a closed form:
        // c = tan(pi*wn/2); b = [1, -1]/(1+c); a = [1, (c-1)/(c+1)]
        let coeffs = butterworth_highpass(1, 10.0, 100.0).unwrap();
        let c = (PI * 0.1 / 2.0).tan();
        assert!((coeffs.b[0] - 1.0 / (1.0 + c)).abs() < 1e-12);
        assert!((coeffs.b[1] + 1.0 / (1.0 + c)).abs() < 1e-12);
        assert!((coeffs.a[0] - 1.0).abs() < 1e-12);
        assert!((coeffs.a[1] - (c - 1.0) / (c + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_second_order_matches_reference_design() {
        // scipy.signal.butter(2, 0.1, 'high')
        let coeffs = butterworth_highpass(2, 5.0, 100.0).unwrap();
        let expected_b = [0.80059240, -1.60118481, 0.80059240];
        let expected_a = [1.0, -1.56101808, 0.64135154];
        for (got, want) in coeffs.b.iter().zip(expected_b.iter()) {
            assert!((got - want).abs() < 1e-6, "b: {} vs {}", got, want);
        }
        for (got, want) in coeffs.a.iter().zip(expected_a.iter()) {
            assert!((got - want).abs() < 1e-6, "a: {} vs {}", got, want);
        }
    }

    #[test]
    fn test_dc_rejection_and_nyquist_gain() {
        for order in 1..=5 {
            for cutoff in [0.5, 2.0, 10.0, 25.0] {
                let coeffs = butterworth_highpass(order, cutoff, 100.0).unwrap();
                let dc: f64 = coeffs.b.iter().sum();
                assert!(dc.abs() < 1e-9, "order {} cutoff {}: dc {}", order, cutoff, dc);
                let gain = nyquist_gain(&coeffs);
                assert!(
                    (gain - 1.0).abs() < 1e-9,
                    "order {} cutoff {}: nyquist gain {}",
                    order,
                    cutoff,
                    gain
                );
            }
        }
    }

    #[test]
    fn test_zero_history_stays_zero() {
        for order in 1..=4 {
            let coeffs = butterworth_highpass(order, 1.0, 100.0).unwrap();
            let x = vec![0.0; order + 1];
            let y = vec![0.0; order];
            let out = coeffs.evaluate(x.into_iter(), y.into_iter());
            assert_eq!(out, 0.0);
        }
    }

    #[test]
    fn test_evaluate_matches_difference_equation() {
        let coeffs = butterworth_highpass(2, 5.0, 100.0).unwrap();
        // x[t-2..t] = [1, 2, 3], y[t-2..t-1] = [0.5, 0.25]
        let got = coeffs.evaluate([1.0, 2.0, 3.0].into_iter(), [0.5, 0.25].into_iter());
        let want = coeffs.b[0] * 3.0 + coeffs.b[1] * 2.0 + coeffs.b[2] * 1.0
            - coeffs.a[1] * 0.25
            - coeffs.a[2] * 0.5;
        assert!((got - want).abs() < 1e-12);
    }

    #[test]
    fn test_design_parameter_validation() {
        assert!(butterworth_highpass(0, 1.0, 100.0).is_err());
        assert!(butterworth_highpass(2, 0.0, 100.0).is_err());
        assert!(butterworth_highpass(2, 50.0, 100.0).is_err());
        assert!(butterworth_highpass(2, 60.0, 100.0).is_err());
    }

    #[test]
    fn test_validate_rejects_non_monic() {
        let coeffs = FilterCoefficients {
            b: vec![1.0, -1.0],
            a: vec![0.5, 0.1],
        };
        assert!(matches!(
            coeffs.validate(),
            Err(PipelineError::FilterPrecondition { .. })
        ));
    }
}
