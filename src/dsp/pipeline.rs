// Ordered, append-only chain of gain/filter elements.

use super::cascade::FilterCascade;

/// One stage of a [`Pipeline`]: a scalar gain or an owned filter cascade.
#[derive(Debug, Clone)]
enum PipelineElement {
    Gain(f32),
    Filter(FilterCascade),
}

impl PipelineElement {
    #[inline]
    fn eval(&mut self, x: f32) -> f32 {
        match self {
            PipelineElement::Gain(k) => *k * x,
            PipelineElement::Filter(cascade) => cascade.eval(x),
        }
    }

    fn coeffs(&self) -> Vec<f32> {
        match self {
            PipelineElement::Gain(k) => vec![1.0, 0.0, 0.0, *k, 0.0, 0.0],
            PipelineElement::Filter(cascade) => cascade.coeffs(),
        }
    }

    fn reset(&mut self) {
        if let PipelineElement::Filter(cascade) = self {
            cascade.reset();
        }
    }
}

/// An ordered, append-only sequence of processing elements composed serially.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    elements: Vec<PipelineElement>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_gain(&mut self, gain: f32) {
        self.elements.push(PipelineElement::Gain(gain));
    }

    pub fn add_filter(&mut self, cascade: FilterCascade) {
        self.elements.push(PipelineElement::Filter(cascade));
    }

    /// Threads `x` through every element, left to right.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let mut z = x;
        for element in &mut self.elements {
            z = element.eval(z);
        }
        z
    }

    /// Extends `output` with the per-sample result of processing `input`.
    pub fn process_block(&mut self, input: &[f32], output: &mut Vec<f32>) {
        output.reserve(input.len());
        for &x in input {
            output.push(self.process(x));
        }
    }

    /// Concatenated inspection coefficients: six floats per element, in order.
    pub fn coeffs(&self) -> Vec<f32> {
        self.elements.iter().flat_map(|e| e.coeffs()).collect()
    }

    pub fn reset(&mut self) {
        for element in &mut self.elements {
            element.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_equals_fold_of_element_evals() {
        let mut pipeline = Pipeline::new();
        pipeline.add_gain(2.0);
        pipeline.add_gain(0.5);

        assert_eq!(pipeline.process(3.0), 3.0);
    }

    #[test]
    fn coeffs_len_is_six_times_element_count() {
        let mut pipeline = Pipeline::new();
        pipeline.add_gain(1.0);
        pipeline.add_filter(FilterCascade::lowpass(0.1, 2, 0.707));
        pipeline.add_filter(FilterCascade::lowpass(0.1, 4, 0.707));

        assert_eq!(pipeline.coeffs().len(), 6 * pipeline.len());
    }

    #[test]
    fn gain_coeffs_match_spec_tuple() {
        let mut pipeline = Pipeline::new();
        pipeline.add_gain(0.25);
        assert_eq!(pipeline.coeffs(), vec![1.0, 0.0, 0.0, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn empty_pipeline_passes_samples_through_unprocessed_block() {
        let mut pipeline = Pipeline::new();
        let input = vec![1.0, 2.0, 3.0];
        let mut output = Vec::new();
        pipeline.process_block(&input, &mut output);
        assert_eq!(input, output);
    }
}
