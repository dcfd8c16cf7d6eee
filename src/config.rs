//! JSON descriptor parsing and validation: `udp-params` plus an ordered
//! `pipeline` array, each element normalized into radians/sample and
//! validated eagerly so every config error surfaces before startup.

use std::f32::consts::PI;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use serde::Deserialize;

use crate::engine::ConcealmentPolicy;
use crate::error::{ConfigError, Result};

const DEFAULT_Q: f32 = 0.707;

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(rename = "udp-params")]
    udp_params: RawUdpParams,
    pipeline: Vec<RawElement>,
}

#[derive(Debug, Deserialize)]
struct RawUdpParams {
    #[serde(rename = "server-port")]
    server_port: u16,
    #[serde(rename = "samp-freq")]
    samp_freq: f32,
    #[serde(rename = "client-addrv4")]
    client_addrv4: String,
    #[serde(rename = "concealment-policy")]
    concealment_policy: String,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    element_type: String,
    gain: Option<f32>,
    #[serde(rename = "cut-freq")]
    cut_freq: Option<f32>,
    order: Option<usize>,
    #[serde(rename = "Q")]
    q: Option<f32>,
    #[serde(rename = "BW")]
    bw: Option<f32>,
}

/// Validated UDP-level connection parameters.
#[derive(Debug, Clone)]
pub struct ConnInfo {
    pub server_port: u16,
    pub samp_freq: f32,
    pub client_addr: Ipv4Addr,
    pub concealment: ConcealmentPolicy,
}

/// One validated, frequency-converted pipeline element.
#[derive(Debug, Clone)]
pub enum PipelineElementSpec {
    Gain(f32),
    LowPass { w0: f32, order: usize, q: f32 },
    HighPass { w0: f32, order: usize, q: f32 },
    BandPass { w0: f32, bw: f32 },
    Notch { w0: f32, bw: f32 },
}

/// A fully validated descriptor: connection parameters plus the element list.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub conn: ConnInfo,
    pub elements: Vec<PipelineElementSpec>,
}

/// Reads and validates the descriptor at `path`.
pub fn load(path: &Path) -> Result<Descriptor> {
    let text = fs::read_to_string(path)
        .map_err(|err| ConfigError::Io(path.display().to_string(), err))?;
    parse(&text, &path.display().to_string())
}

fn parse(text: &str, source: &str) -> Result<Descriptor> {
    let raw: RawDescriptor = serde_json::from_str(text)
        .map_err(|err| ConfigError::Json(source.to_string(), err))?;

    let conn = validate_conn(raw.udp_params)?;

    let elements = raw
        .pipeline
        .into_iter()
        .enumerate()
        .map(|(index, element)| validate_element(index, element, conn.samp_freq))
        .collect::<Result<Vec<_>>>()?;

    Ok(Descriptor { conn, elements })
}

fn validate_conn(raw: RawUdpParams) -> Result<ConnInfo> {
    let client_addr = raw
        .client_addrv4
        .parse::<Ipv4Addr>()
        .map_err(|_| ConfigError::UdpParams(format!("{} is not a dotted-quad IPv4 address", raw.client_addrv4)))?;

    if raw.samp_freq <= 0.0 {
        return Err(ConfigError::UdpParams("samp-freq must be positive".into()));
    }

    let concealment = ConcealmentPolicy::parse(&raw.concealment_policy)?;

    Ok(ConnInfo {
        server_port: raw.server_port,
        samp_freq: raw.samp_freq,
        client_addr,
        concealment,
    })
}

fn validate_element(index: usize, raw: RawElement, samp_freq: f32) -> Result<PipelineElementSpec> {
    let element_type = raw.element_type.to_lowercase();

    let err = |reason: &str| ConfigError::Element {
        index,
        element_type: element_type.clone(),
        reason: reason.to_string(),
    };

    let to_w0 = |freq: f32| 2.0 * PI * freq / samp_freq;

    match element_type.as_str() {
        "gain" => {
            let gain = raw.gain.ok_or_else(|| err("missing required field 'gain'"))?;
            Ok(PipelineElementSpec::Gain(gain))
        }
        "low-pass" | "high-pass" => {
            let cut_freq = raw.cut_freq.ok_or_else(|| err("missing required field 'cut-freq'"))?;
            if cut_freq <= 0.0 {
                return Err(err("cut-freq must be positive"));
            }
            let order = raw.order.ok_or_else(|| err("missing required field 'order'"))?;
            if order < 2 || order > 254 || order % 2 != 0 {
                return Err(err("order must be even and in 2..=254"));
            }
            let q = raw.q.unwrap_or(DEFAULT_Q);
            if q <= 0.0 {
                return Err(err("Q must be positive"));
            }
            let w0 = to_w0(cut_freq);
            if element_type == "low-pass" {
                Ok(PipelineElementSpec::LowPass { w0, order, q })
            } else {
                Ok(PipelineElementSpec::HighPass { w0, order, q })
            }
        }
        "band-pass" | "notch" => {
            let cut_freq = raw.cut_freq.ok_or_else(|| err("missing required field 'cut-freq'"))?;
            if cut_freq <= 0.0 {
                return Err(err("cut-freq must be positive"));
            }
            let bw = raw.bw.ok_or_else(|| err("missing required field 'BW'"))?;
            if bw <= 0.0 {
                return Err(err("BW must be positive"));
            }
            let w0 = to_w0(cut_freq);
            if element_type == "band-pass" {
                Ok(PipelineElementSpec::BandPass { w0, bw })
            } else {
                Ok(PipelineElementSpec::Notch { w0, bw })
            }
        }
        other => Err(ConfigError::UnknownElementType(other.to_string())),
    }
}

/// Builds a fresh [`crate::dsp::Pipeline`] from validated element specs.
pub fn build_pipeline(elements: &[PipelineElementSpec]) -> crate::dsp::Pipeline {
    let mut pipeline = crate::dsp::Pipeline::new();
    for element in elements {
        match *element {
            PipelineElementSpec::Gain(k) => pipeline.add_gain(k),
            PipelineElementSpec::LowPass { w0, order, q } => {
                pipeline.add_filter(crate::dsp::FilterCascade::lowpass(w0, order, q))
            }
            PipelineElementSpec::HighPass { w0, order, q } => {
                pipeline.add_filter(crate::dsp::FilterCascade::highpass(w0, order, q))
            }
            PipelineElementSpec::BandPass { w0, bw } => {
                pipeline.add_filter(crate::dsp::FilterCascade::bandpass(w0, bw))
            }
            PipelineElementSpec::Notch { w0, bw } => {
                pipeline.add_filter(crate::dsp::FilterCascade::notch(w0, bw))
            }
        }
    }
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "udp-params": {
                "server-port": 9000,
                "samp-freq": 48000.0,
                "client-addrv4": "127.0.0.1",
                "concealment-policy": "FADE_LAST_GOOD"
            },
            "pipeline": [
                {"type": "Gain", "gain": 0.5},
                {"type": "LOW-PASS", "cut-freq": 1000.0, "order": 4},
                {"type": "band-pass", "cut-freq": 2000.0, "BW": 1.0}
            ]
        }"#
    }

    #[test]
    fn parses_a_well_formed_descriptor() {
        let descriptor = parse(sample_json(), "test").unwrap();
        assert_eq!(descriptor.conn.server_port, 9000);
        assert_eq!(descriptor.conn.concealment, ConcealmentPolicy::FadeLastGood);
        assert_eq!(descriptor.elements.len(), 3);
    }

    #[test]
    fn element_type_is_case_insensitive() {
        let descriptor = parse(sample_json(), "test").unwrap();
        assert!(matches!(descriptor.elements[1], PipelineElementSpec::LowPass { .. }));
    }

    #[test]
    fn low_pass_without_q_uses_default() {
        let descriptor = parse(sample_json(), "test").unwrap();
        match descriptor.elements[1] {
            PipelineElementSpec::LowPass { q, .. } => assert!((q - DEFAULT_Q).abs() < 1e-6),
            _ => panic!("expected low-pass"),
        }
    }

    #[test]
    fn odd_order_is_rejected() {
        let json = sample_json().replace("\"order\": 4", "\"order\": 5");
        assert!(parse(&json, "test").is_err());
    }

    #[test]
    fn unknown_element_type_is_rejected() {
        let json = sample_json().replace("\"Gain\"", "\"bogus\"");
        assert!(parse(&json, "test").is_err());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let json = sample_json().replace("\"gain\": 0.5,", "");
        assert!(parse(&json, "test").is_err());
    }

    #[test]
    fn bad_ip_is_rejected() {
        let json = sample_json().replace("127.0.0.1", "not-an-ip");
        assert!(parse(&json, "test").is_err());
    }
}
