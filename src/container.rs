use anyhow::Result;
use bytes::Bytes;

/// One content block unpacked from a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    pub path: String,
    pub data: Bytes,
}

/// One self-contained archive structure holding one or more content blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub entries: Vec<ContainerEntry>,
    /// Exact byte length of the container on disk, including its header
    pub size: u64,
}

/// Reader for one container format
pub trait ContainerFormat {
    /// Parse exactly one container at the start of `input`
    fn read(&self, input: &Bytes) -> Result<Container>;

    /// Pre-scan of the file envelope for known container start offsets.
    /// `None` means the file holds containers back-to-back and is split
    /// sequentially instead.
    fn scan_offsets(&self, _data: &Bytes) -> Option<Vec<u64>> {
        None
    }
}

/// Inspector for container entries that may hold serialized structured data
pub trait EntryInspector {
    /// Format sniff: serialized structured data vs an opaque blob
    fn is_serialized(&self, data: &[u8]) -> bool;

    /// External dependency names as declared, in declaration order.
    /// A serialized entry with no externals yields an empty list.
    fn external_dependencies(&self, data: &[u8]) -> Result<Vec<String>>;
}
