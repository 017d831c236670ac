//! The generation request body sent to the inference server.

use crate::config::SamplingParameters;
use crate::prompts::instruct::{InstructFormat, Segment};

use serde::Serialize;

/// A fully assembled `/api/v1/generate` request.
///
/// Built once per cycle and never mutated. Field order follows the server's
/// documented schema.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    #[serde(skip)]
    segments: Vec<Segment>,
    max_context_length: u32,
    max_length: u32,
    prompt: String,
    quiet: bool,
    rep_pen: f64,
    rep_pen_range: u32,
    rep_pen_slope: f64,
    temperature: f64,
    tfs: f64,
    top_a: f64,
    top_k: u32,
    top_p: f64,
    typical: f64,
    dynamic_temperature: bool,
    dynatemp_low: f64,
    dynatemp_high: f64,
    dynatemp_range: f64,
    dynatemp_exponent: f64,
    stopping_strings: Vec<String>,
    stop: Vec<String>,
}

impl GenerationRequest {
    /// Render `segments` with `format` and attach every sampling parameter.
    pub fn new(segments: Vec<Segment>, format: InstructFormat, params: &SamplingParameters) -> Self {
        let prompt = format.render(&segments);
        Self {
            segments,
            max_context_length: params.max_context_length,
            max_length: params.max_length,
            prompt,
            quiet: params.quiet,
            rep_pen: params.rep_pen,
            rep_pen_range: params.rep_pen_range,
            rep_pen_slope: params.rep_pen_slope,
            temperature: params.temperature,
            tfs: params.tfs,
            top_a: params.top_a,
            top_k: params.top_k,
            top_p: params.top_p,
            typical: params.typical,
            dynamic_temperature: params.dynamic_temperature,
            dynatemp_low: params.dynatemp_low,
            dynatemp_high: params.dynatemp_high,
            dynatemp_range: params.dynatemp_range,
            dynatemp_exponent: params.dynatemp_exponent,
            stopping_strings: params.stop_sequences.clone(),
            stop: params.stop_sequences.clone(),
        }
    }

    /// The typed transcript the prompt was rendered from.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The rendered prompt string.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}
