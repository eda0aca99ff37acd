//! Capability decoding: the camera embeds proprietary attributes in its
//! session description (stream profiles, calibration, device identity) and
//! answers the capability query with a control-range listing. This module
//! turns both texts into typed records. Pure parsing, no I/O.

use crate::types::{
    ControlDescriptor, ControlKind, ControlRange, DeviceIdentity, DistortionModel, Extrinsics,
    Intrinsics, PixelFormat, StreamKind, StreamProfile,
};
use crate::{NetcamError, Result};
use std::collections::HashMap;

/// One extrinsics table entry decoded from a media section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrinsicsUpdate {
    /// Sensor key of the stream the record was attached to.
    pub source_key: i32,
    /// Target sensor index from the record itself.
    pub target: i32,
    pub extrinsics: Extrinsics,
}

/// Everything a session description yields.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDescription {
    pub identity: DeviceIdentity,
    pub profiles: Vec<StreamProfile>,
    pub extrinsics: Vec<ExtrinsicsUpdate>,
    pub compression_enabled: bool,
}

type Section = HashMap<String, String>;

/// Group `a=<name>:<value>` attribute lines under their `m=` media section.
/// Session-level attributes (before the first `m=`) are not ours to read.
fn split_media_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with("m=") {
            sections.push(Section::new());
        } else if let Some(attr) = line.strip_prefix("a=") {
            if let (Some(section), Some((name, value))) =
                (sections.last_mut(), attr.split_once(':'))
            {
                section.insert(name.to_string(), value.to_string());
            }
        }
    }
    sections
}

// Missing or unparsable attribute values default, never error: absence of
// optional metadata is an expected operating condition.

fn attr_str(section: &Section, name: &str) -> String {
    section.get(name).cloned().unwrap_or_default()
}

fn attr_i32(section: &Section, name: &str) -> i32 {
    section
        .get(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn attr_f32(section: &Section, name: &str) -> f32 {
    section
        .get(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0.0)
}

fn attr_bool(section: &Section, name: &str) -> bool {
    matches!(section.get(name).map(String::as_str), Some("1") | Some("true"))
}

/// Decode a session description into stream profiles, extrinsics updates,
/// and the device identity.
///
/// Fails with `MalformedDescription` only when the text has no media
/// sections at all; within a section, missing attributes default to zero or
/// empty. Identity fields are taken from the last section observed — every
/// section of one physical device carries identical values, and duplicates
/// are tolerated.
pub fn decode_description(text: &str) -> Result<DecodedDescription> {
    let sections = split_media_sections(text);
    if sections.is_empty() {
        return Err(NetcamError::MalformedDescription);
    }

    let mut profiles = Vec::with_capacity(sections.len());
    let mut extrinsics = Vec::new();
    let mut identity = DeviceIdentity::default();
    let mut compression_enabled = false;

    for section in &sections {
        let profile = StreamProfile {
            kind: StreamKind::from_code(attr_i32(section, "stream_type")),
            sensor_index: attr_i32(section, "stream_index"),
            format: PixelFormat::from_code(attr_i32(section, "format")),
            width: attr_i32(section, "width"),
            height: attr_i32(section, "height"),
            frame_rate: attr_i32(section, "fps"),
            bits_per_pixel: attr_i32(section, "bpp"),
            unique_id: attr_i32(section, "uid"),
            intrinsics: Intrinsics {
                width: attr_i32(section, "width"),
                height: attr_i32(section, "height"),
                ppx: attr_f32(section, "ppx"),
                ppy: attr_f32(section, "ppy"),
                fx: attr_f32(section, "fx"),
                fy: attr_f32(section, "fy"),
                model: DistortionModel::from_code(attr_i32(section, "model")),
                coeffs: [
                    attr_f32(section, "coeff_0"),
                    attr_f32(section, "coeff_1"),
                    attr_f32(section, "coeff_2"),
                    attr_f32(section, "coeff_3"),
                    attr_f32(section, "coeff_4"),
                ],
            },
        };

        let source_key = profile.sensor_key();
        for (target, e) in parse_extrinsics_blob(&attr_str(section, "extrinsics")) {
            extrinsics.push(ExtrinsicsUpdate {
                source_key,
                target,
                extrinsics: e,
            });
        }

        identity = DeviceIdentity {
            serial_number: attr_str(section, "cam_serial_num"),
            // The camera substitutes '^' for spaces on the wire; undo it.
            name: attr_str(section, "cam_name").replace('^', " "),
            usb_type: attr_str(section, "usb_type"),
        };
        compression_enabled = attr_bool(section, "compression");

        profiles.push(profile);
    }

    Ok(DecodedDescription {
        identity,
        profiles,
        extrinsics,
        compression_enabled,
    })
}

/// Parse an `&`-separated extrinsics blob into (target index, transform)
/// pairs. Record grammar:
///
/// ```text
/// <to_sensor_K>rotation:r0,...,r8translation:t0,t1,t2
/// ```
///
/// A record whose numeric fields do not fully parse yields the all-NaN
/// transform rather than being dropped, so callers can tell "no usable
/// calibration" from a zero transform. Only a record whose target index
/// itself is unreadable is skipped.
fn parse_extrinsics_blob(blob: &str) -> Vec<(i32, Extrinsics)> {
    let mut out = Vec::new();
    for record in blob.split('&') {
        if record.is_empty() {
            continue;
        }
        match parse_extrinsics_target(record) {
            Some((target, rest)) => out.push((target, parse_transform(rest))),
            None => log::warn!("extrinsics record without a target sensor: {record:?}"),
        }
    }
    out
}

fn parse_extrinsics_target(record: &str) -> Option<(i32, &str)> {
    let rest = record.strip_prefix("<to_sensor_")?;
    let (target, rest) = rest.split_once('>')?;
    Some((target.trim().parse().ok()?, rest))
}

fn parse_transform(rest: &str) -> Extrinsics {
    let parsed = (|| {
        let rest = rest.strip_prefix("rotation:")?;
        // r8 and the translation label abut on the wire.
        let (rotation_csv, translation_csv) = rest.split_once("translation:")?;

        let mut rotation = [0.0f32; 9];
        let mut fields = rotation_csv.split(',');
        for slot in &mut rotation {
            *slot = fields.next()?.trim().parse().ok()?;
        }
        if fields.next().is_some() {
            return None;
        }

        let mut translation = [0.0f32; 3];
        let mut fields = translation_csv.split(',');
        for slot in &mut translation {
            *slot = fields.next()?.trim().parse().ok()?;
        }

        Some(Extrinsics {
            rotation,
            translation,
        })
    })();

    parsed.unwrap_or_else(|| {
        log::warn!("malformed extrinsics record, storing unknown transform");
        Extrinsics::unknown()
    })
}

/// Decode the capability-query response into control descriptors.
///
/// Bracket groups hold one sensor each, numbered in document order; the
/// device addresses its first group as sensor 1 and every later group as
/// sensor 0. Within a group, records are `;`-separated
/// `<code>{min,max,default,step}`. Output order matches input order and
/// duplicates are preserved.
pub fn decode_controls(text: &str) -> Vec<ControlDescriptor> {
    let mut out = Vec::new();
    let mut rest = text;
    let mut group = 0;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let close = after.find(']').unwrap_or(after.len());
        let sensor_id = if group == 0 { 1 } else { 0 };
        for record in after[..close].split(';') {
            let record = record.trim();
            if record.is_empty() {
                continue;
            }
            out.push(parse_control_record(record, sensor_id));
        }
        group += 1;
        rest = &after[close..];
    }
    out
}

/// Scan one control record left to right. A record that fails the full
/// five-field scan still yields a descriptor: fields that did not scan stay
/// at zero.
fn parse_control_record(record: &str, sensor_id: i32) -> ControlDescriptor {
    let mut code = 0i32;
    let mut range = ControlRange::default();

    let complete = (|| {
        let (code_text, fields) = record.split_once('{')?;
        code = code_text.trim().parse().ok()?;
        let fields = fields.strip_suffix('}').unwrap_or(fields);
        let mut fields = fields.split(',');
        range.min = fields.next()?.trim().parse().ok()?;
        range.max = fields.next()?.trim().parse().ok()?;
        range.default = fields.next()?.trim().parse().ok()?;
        range.step = fields.next()?.trim().parse().ok()?;
        Some(())
    })()
    .is_some();

    if !complete {
        log::warn!("partial control record {record:?}, unscanned fields left zero");
    }

    ControlDescriptor {
        sensor_id,
        kind: ControlKind::from_code(code),
        range,
    }
}
