// Filter cascade: an arbitrary-order filter realized as a serial chain of biquads.

use num_complex::Complex32;

use super::biquad::{butterworth_q, Biquad};

const NORMALIZATION_EPS: f32 = 1e-8;

/// Reference point at which a cascade's global gain is normalized to unity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Normalization {
    /// z = 1 (DC) — used for low-pass and notch.
    Dc,
    /// z = -1 (Nyquist) — used for high-pass.
    Fs,
    /// z = e^{j w0} — used for band-pass.
    Fc,
}

/// An ordered cascade of biquads realizing one low-pass/high-pass/band-pass/notch filter.
#[derive(Debug, Clone)]
pub struct FilterCascade {
    w0: f32,
    q: f32,
    sections: Vec<Biquad>,
}

impl FilterCascade {
    /// Low-pass of even `order` (2..=254) at angular frequency `w0`, nominal quality `q`.
    pub fn lowpass(w0: f32, order: usize, q: f32) -> Self {
        let sections = butterworth_sections(w0, order, q, Biquad::lowpass);
        let mut cascade = Self { w0, q, sections };
        cascade.normalize(Normalization::Dc);
        cascade
    }

    /// High-pass of even `order` (2..=254) at angular frequency `w0`, nominal quality `q`.
    pub fn highpass(w0: f32, order: usize, q: f32) -> Self {
        let sections = butterworth_sections(w0, order, q, Biquad::highpass);
        let mut cascade = Self { w0, q, sections };
        cascade.normalize(Normalization::Fs);
        cascade
    }

    /// Band-pass at `w0` with bandwidth `bw` octaves; single biquad, Q carries no meaning.
    pub fn bandpass(w0: f32, bw: f32) -> Self {
        let sections = vec![Biquad::bandpass(w0, bw)];
        let mut cascade = Self { w0, q: 0.0, sections };
        cascade.normalize(Normalization::Fc);
        cascade
    }

    /// Notch at `w0` with bandwidth `bw` octaves; single biquad, Q carries no meaning.
    pub fn notch(w0: f32, bw: f32) -> Self {
        let sections = vec![Biquad::notch(w0, bw)];
        let mut cascade = Self { w0, q: 0.0, sections };
        cascade.normalize(Normalization::Dc);
        cascade
    }

    pub fn w0(&self) -> f32 {
        self.w0
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn order(&self) -> usize {
        self.sections.len() * 2
    }

    /// Folds a scalar gain into the first section's feedforward coefficients so the
    /// cascade's magnitude response at the chosen reference frequency is 1.
    fn normalize(&mut self, mode: Normalization) {
        let mut filter_gain = 1.0f32;

        for section in &self.sections {
            let [a0, a1, a2, b0, b1, b2] = section.coeffs();
            let section_gain = match mode {
                Normalization::Dc => {
                    let num = b0 + b1 + b2;
                    let den = a0 + a1 + a2;
                    num / (den + NORMALIZATION_EPS)
                }
                Normalization::Fs => {
                    let num = b0 - b1 + b2;
                    let den = a0 - a1 + a2;
                    num / (den + NORMALIZATION_EPS)
                }
                Normalization::Fc => {
                    let z = Complex32::new(0.0, -self.w0).exp();
                    let z2 = Complex32::new(0.0, -2.0 * self.w0).exp();
                    let num = Complex32::new(b0, 0.0) + z * b1 + z2 * b2;
                    let den = Complex32::new(a0, 0.0) + z * a1 + z2 * a2;
                    (num / (den + Complex32::new(NORMALIZATION_EPS, 0.0))).norm()
                }
            };
            filter_gain *= section_gain;
        }

        let compensating_gain = 1.0 / filter_gain;
        if let Some(first) = self.sections.first_mut() {
            first.scale_b(compensating_gain);
        }
    }

    /// Threads `x` through every section in order.
    #[inline]
    pub fn eval(&mut self, x: f32) -> f32 {
        let mut z = x;
        for section in &mut self.sections {
            z = section.eval(z);
        }
        z
    }

    pub fn process_block(&mut self, input: &[f32], output: &mut Vec<f32>) {
        output.clear();
        output.reserve(input.len());
        for &x in input {
            output.push(self.eval(x));
        }
    }

    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// Six floats per section, concatenated in cascade order. The first section's
    /// b-row reflects the folded normalization; every other value is pre-normalization.
    pub fn coeffs(&self) -> Vec<f32> {
        self.sections.iter().flat_map(|s| s.coeffs()).collect()
    }
}

fn butterworth_sections(
    w0: f32,
    order: usize,
    q: f32,
    factory: fn(f32, f32) -> Biquad,
) -> Vec<Biquad> {
    debug_assert!(order >= 2 && order <= 254 && order % 2 == 0);

    if order == 2 {
        return vec![factory(w0, q)];
    }

    let n = order / 2;
    let mut sections: Vec<Biquad> = (0..n)
        .map(|k| factory(w0, butterworth_q(order, k)))
        .collect();

    // Highest-Q section first: it is the most resonant, so later sections
    // attenuate its peaking rather than the reverse.
    sections.sort_by(|a, b| b.q().partial_cmp(&a.q()).unwrap());
    sections
}
