//! Reference container format used by the CLI and the tests.
//!
//! Container layout:
//!
//! ```text
//! magic        : 4 bytes, "BNDL"
//! version      : u32 LE, currently 1
//! total_size   : u64 LE, container byte length including this header
//! entry_count  : u32 LE
//! repeat entry_count times:
//!   path       : u32 LE byte length + UTF-8
//!   data_len   : u64 LE
//!   data       : data_len bytes
//! ```
//!
//! Serialized entries start with the magic "SRLZ", a u32 LE version, a
//! u32 LE external count and that many length-prefixed external names,
//! followed by an opaque payload.

use anyhow::{anyhow, Result};
use bytes::Bytes;
use nom::{
    bytes::complete::{tag, take},
    multi::count,
    number::complete::{le_u32, le_u64},
    IResult,
};

use crate::container::{Container, ContainerEntry, ContainerFormat, EntryInspector};

pub const CONTAINER_MAGIC: &[u8; 4] = b"BNDL";
pub const SERIALIZED_MAGIC: &[u8; 4] = b"SRLZ";

const CONTAINER_VERSION: u32 = 1;

// Parser for a u32-length-prefixed UTF-8 string
fn parse_string(input: &[u8]) -> IResult<&[u8], String> {
    let (input, length) = le_u32(input)?;
    let (input, data) = take(length)(input)?;
    let string = String::from_utf8_lossy(data).to_string();
    Ok((input, string))
}

// Parser for one container entry
fn parse_entry(input: &[u8]) -> IResult<&[u8], ContainerEntry> {
    let (input, path) = parse_string(input)?;
    let (input, data_len) = le_u64(input)?;
    let (input, data) = take(data_len as usize)(input)?;
    Ok((
        input,
        ContainerEntry {
            path,
            data: Bytes::copy_from_slice(data),
        },
    ))
}

// Parser for one container; consumed length must match the self-described size
fn parse_container(input: &[u8]) -> IResult<&[u8], Container> {
    let full_len = input.len();
    let (input, _) = tag(&CONTAINER_MAGIC[..])(input)?;
    let (input, version) = le_u32(input)?;
    if version != CONTAINER_VERSION {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (input, total_size) = le_u64(input)?;
    let (input, entry_count) = le_u32(input)?;
    let (input, entries) = count(parse_entry, entry_count as usize)(input)?;

    let consumed = (full_len - input.len()) as u64;
    if consumed != total_size {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }

    Ok((
        input,
        Container {
            entries,
            size: total_size,
        },
    ))
}

// Parser for the declared externals of a serialized entry
fn parse_externals(input: &[u8]) -> IResult<&[u8], Vec<String>> {
    let (input, _) = tag(&SERIALIZED_MAGIC[..])(input)?;
    let (input, _version) = le_u32(input)?;
    let (input, external_count) = le_u32(input)?;
    count(parse_string, external_count as usize)(input)
}

/// Reader for the reference container layout
pub struct RawBundleFormat;

impl ContainerFormat for RawBundleFormat {
    fn read(&self, input: &Bytes) -> Result<Container> {
        let (_, container) =
            parse_container(input).map_err(|_| anyhow!("Failed to parse container"))?;
        Ok(container)
    }
}

/// Sniffer and dependency extractor for reference serialized entries
pub struct RawEntryInspector;

impl EntryInspector for RawEntryInspector {
    fn is_serialized(&self, data: &[u8]) -> bool {
        data.starts_with(SERIALIZED_MAGIC)
    }

    fn external_dependencies(&self, data: &[u8]) -> Result<Vec<String>> {
        let (_, externals) =
            parse_externals(data).map_err(|_| anyhow!("Failed to parse serialized entry"))?;
        Ok(externals)
    }
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// Encode one container from `(block path, block bytes)` pairs
pub fn encode_container(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (path, data) in entries {
        put_string(&mut body, path);
        body.extend_from_slice(&(data.len() as u64).to_le_bytes());
        body.extend_from_slice(data);
    }

    // magic + version + total_size precede the body
    let total_size = (4 + 4 + 8 + body.len()) as u64;
    let mut buf = Vec::with_capacity(total_size as usize);
    buf.extend_from_slice(CONTAINER_MAGIC);
    buf.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
    buf.extend_from_slice(&total_size.to_le_bytes());
    buf.extend_from_slice(&body);
    buf
}

/// Encode one serialized entry declaring `externals`, followed by `payload`
pub fn encode_serialized(externals: &[&str], payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(SERIALIZED_MAGIC);
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&(externals.len() as u32).to_le_bytes());
    for external in externals {
        put_string(&mut buf, external);
    }
    buf.extend_from_slice(payload);
    buf
}
