//! Parser for legacy text heap profiles.
//!
//! Reads back what the text renderer writes, verbose frames included, so saved
//! or fetched profiles can be checked and summarized.

use crate::utils::error::ParseError;
use log::debug;

const HEADER_PREFIX: &str = "heap profile: ";
const RATE_MARKER: &str = " @ heap/";

/// `<inuse_objects>: <inuse_bytes> [<alloc_objects>: <alloc_bytes>]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCounts {
    pub in_use_objects: i64,
    pub in_use_bytes: i64,
    pub alloc_objects: i64,
    pub alloc_bytes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileHeader {
    pub totals: SampleCounts,
    pub rate: u64,
}

/// One `#` line under a sample in verbose profiles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    pub address: usize,
    pub function: Option<String>,
    pub offset: Option<usize>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSample {
    pub counts: SampleCounts,
    pub addresses: Vec<usize>,
    pub frames: Vec<ParsedFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapProfile {
    pub header: ProfileHeader,
    pub samples: Vec<ProfileSample>,
}

impl HeapProfile {
    /// Sum of all sample counts
    pub fn sample_totals(&self) -> SampleCounts {
        self.samples
            .iter()
            .fold(SampleCounts::default(), |mut acc, sample| {
                acc.in_use_objects += sample.counts.in_use_objects;
                acc.in_use_bytes += sample.counts.in_use_bytes;
                acc.alloc_objects += sample.counts.alloc_objects;
                acc.alloc_bytes += sample.counts.alloc_bytes;
                acc
            })
    }

    /// Whether the header totals match the samples
    pub fn is_consistent(&self) -> bool {
        self.sample_totals() == self.header.totals
    }

    /// Whether any sample carries symbolized frames
    pub fn is_verbose(&self) -> bool {
        self.samples.iter().any(|s| !s.frames.is_empty())
    }
}

/// Parse a text heap profile
///
/// **Public** - main entry point for parsing
///
/// # Errors
/// * `ParseError::Empty` - No header line
/// * `ParseError::InvalidHeader` - First line is not a heap profile header
/// * `ParseError::InvalidSample` - A sample or frame line is malformed
pub fn parse_heap_profile(text: &str) -> Result<HeapProfile, ParseError> {
    let mut lines = text.lines().enumerate();

    let header = loop {
        match lines.next() {
            None => return Err(ParseError::Empty),
            Some((_, line)) if line.trim().is_empty() => continue,
            Some((_, line)) => break parse_header(line)?,
        }
    };

    let mut samples: Vec<ProfileSample> = Vec::new();
    for (index, line) in lines {
        let number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        if line.starts_with('#') {
            let frame = parse_frame(line).map_err(|reason| ParseError::InvalidSample {
                line: number,
                reason,
            })?;
            let Some(sample) = samples.last_mut() else {
                return Err(ParseError::InvalidSample {
                    line: number,
                    reason: "frame before any sample".to_string(),
                });
            };
            sample.frames.push(frame);
            continue;
        }

        let sample = parse_sample(line).map_err(|reason| ParseError::InvalidSample {
            line: number,
            reason,
        })?;
        samples.push(sample);
    }

    debug!("Parsed heap profile with {} samples", samples.len());
    Ok(HeapProfile { header, samples })
}

fn parse_header(line: &str) -> Result<ProfileHeader, ParseError> {
    let invalid = |reason: &str| ParseError::InvalidHeader(format!("{}: {:?}", reason, line));

    let body = line
        .strip_prefix(HEADER_PREFIX)
        .ok_or_else(|| invalid("missing 'heap profile:' prefix"))?;
    let (counts, rate) = body
        .split_once(RATE_MARKER)
        .ok_or_else(|| invalid("missing '@ heap/<rate>'"))?;

    let totals = parse_counts(counts).map_err(|reason| invalid(&reason))?;
    let rate = rate
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid("rate is not a number"))?;

    Ok(ProfileHeader { totals, rate })
}

fn parse_sample(line: &str) -> Result<ProfileSample, String> {
    let (counts, stack) = line
        .split_once(" @")
        .ok_or_else(|| format!("missing '@' in {:?}", line))?;

    let counts = parse_counts(counts)?;
    let addresses = stack
        .split_whitespace()
        .map(parse_address)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProfileSample {
        counts,
        addresses,
        frames: Vec::new(),
    })
}

/// `A: B [C: D]`
fn parse_counts(text: &str) -> Result<SampleCounts, String> {
    let (in_use, alloc) = text
        .trim()
        .split_once(" [")
        .ok_or_else(|| format!("missing '[' in {:?}", text))?;
    let alloc = alloc
        .strip_suffix(']')
        .ok_or_else(|| format!("missing ']' in {:?}", text))?;

    let (in_use_objects, in_use_bytes) = parse_pair(in_use)?;
    let (alloc_objects, alloc_bytes) = parse_pair(alloc)?;
    Ok(SampleCounts {
        in_use_objects,
        in_use_bytes,
        alloc_objects,
        alloc_bytes,
    })
}

fn parse_pair(text: &str) -> Result<(i64, i64), String> {
    let (objects, bytes) = text
        .split_once(':')
        .ok_or_else(|| format!("expected 'objects: bytes', got {:?}", text))?;
    let number = |s: &str| {
        s.trim()
            .parse::<i64>()
            .map_err(|_| format!("not a number: {:?}", s.trim()))
    };
    Ok((number(objects)?, number(bytes)?))
}

fn parse_address(text: &str) -> Result<usize, String> {
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| format!("address without 0x prefix: {:?}", text))?;
    usize::from_str_radix(digits, 16).map_err(|_| format!("bad address: {:?}", text))
}

/// `#\t<addr>[\t<function>+<offset>\t<file>:<line>]`
fn parse_frame(line: &str) -> Result<ParsedFrame, String> {
    let mut fields = line.split('\t').skip(1).filter(|f| !f.is_empty());

    let address = parse_address(
        fields
            .next()
            .ok_or_else(|| "frame line without address".to_string())?,
    )?;

    let (function, offset) = match fields.next() {
        None => (None, None),
        Some(symbol) => match symbol.rsplit_once('+') {
            Some((name, off)) => (Some(name.to_string()), Some(parse_address(off)?)),
            None => (Some(symbol.to_string()), None),
        },
    };

    Ok(ParsedFrame {
        address,
        function,
        offset,
        location: fields.next().map(str::to_string),
    })
}
