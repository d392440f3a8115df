//! Minimal PalmDB / Mobipocket header reader.
//!
//! Only the fields needed for DRM detection and metadata are decoded: the
//! database name, type/creator, record 0's encryption field, the MOBI full
//! name and the EXTH records.

/// PalmDB type/creator of a Mobipocket book.
pub const MOBI_TYPE_CREATOR: &[u8; 8] = b"BOOKMOBI";
/// PalmDB type/creator of an eReader book.
pub const EREADER_TYPE_CREATOR: &[u8; 8] = b"PNRdPPrs";

/// EXTH record: author.
pub const EXTH_AUTHOR: u32 = 100;
/// EXTH record: publisher.
pub const EXTH_PUBLISHER: u32 = 101;
/// EXTH record: subject (may repeat).
pub const EXTH_SUBJECT: u32 = 105;
/// EXTH record: publishing date.
pub const EXTH_PUBLISHED: u32 = 106;
/// EXTH record: updated title.
pub const EXTH_TITLE: u32 = 503;

fn be_u16(data: &[u8], at: usize) -> Option<u16> {
    let bytes = data.get(at..at + 2)?;
    Some(u16::from_be_bytes([*bytes.first()?, *bytes.get(1)?]))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

fn usize_at(data: &[u8], at: usize) -> Option<usize> {
    be_u32(data, at).and_then(|v| usize::try_from(v).ok())
}

/// Borrowed view of a PalmDB file.
#[derive(Debug, Clone, Copy)]
pub struct PalmDb<'a> {
    data: &'a [u8],
}

impl<'a> PalmDb<'a> {
    /// Wrap `data` if it is long enough to hold a PalmDB header.
    #[must_use]
    pub fn parse(data: &'a [u8]) -> Option<Self> {
        (data.len() >= 78).then_some(Self { data })
    }

    /// Database name (up to the first NUL).
    #[must_use]
    pub fn name(&self) -> String {
        let raw = self.data.get(..32).unwrap_or_default();
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(raw.get(..end).unwrap_or_default()).into_owned()
    }

    /// The 8-byte type/creator field.
    #[must_use]
    pub fn type_creator(&self) -> &'a [u8] {
        self.data.get(60..68).unwrap_or_default()
    }

    /// Number of records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        be_u16(self.data, 76).map_or(0, usize::from)
    }

    /// Raw bytes of record `index`.
    #[must_use]
    pub fn record(&self, index: usize) -> Option<&'a [u8]> {
        if index >= self.record_count() {
            return None;
        }
        let start = usize_at(self.data, 78 + index * 8)?;
        let end = if index + 1 < self.record_count() {
            usize_at(self.data, 78 + (index + 1) * 8)?
        } else {
            self.data.len()
        };
        self.data.get(start..end)
    }
}

/// Decoded Mobipocket header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MobiHeader {
    /// Record 0 encryption type: 0 none, 1 old Mobipocket, 2 Mobipocket/Kindle.
    pub encryption: u16,
    /// MOBI file version (8 for KF8/AZW3).
    pub version: u32,
    /// Full title from the MOBI header.
    pub full_name: Option<String>,
    /// EXTH records in file order.
    pub exth: Vec<(u32, Vec<u8>)>,
}

impl MobiHeader {
    /// First EXTH record of `kind`, decoded as UTF-8.
    #[must_use]
    pub fn exth_string(&self, kind: u32) -> Option<String> {
        self.exth
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| String::from_utf8_lossy(v).trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Every EXTH record of `kind`, decoded as UTF-8.
    #[must_use]
    pub fn exth_strings(&self, kind: u32) -> Vec<String> {
        self.exth
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, v)| String::from_utf8_lossy(v).trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Parse record 0 of a Mobipocket book.
///
/// Returns `None` if the type/creator is not `BOOKMOBI` or record 0 is
/// truncated.
#[must_use]
pub fn parse_mobi(data: &[u8]) -> Option<MobiHeader> {
    let db = PalmDb::parse(data)?;
    if db.type_creator() != MOBI_TYPE_CREATOR {
        return None;
    }
    let rec0 = db.record(0)?;
    let encryption = be_u16(rec0, 12)?;
    let mut header = MobiHeader {
        encryption,
        ..MobiHeader::default()
    };
    if rec0.get(16..20) != Some(b"MOBI".as_slice()) {
        return Some(header);
    }
    let mobi_len = usize_at(rec0, 20)?;
    header.version = be_u32(rec0, 36).unwrap_or(0);

    if let (Some(off), Some(len)) = (usize_at(rec0, 84), usize_at(rec0, 88)) {
        header.full_name = rec0
            .get(off..off.saturating_add(len))
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .filter(|s| !s.is_empty());
    }

    let exth_flags = be_u32(rec0, 128).unwrap_or(0);
    if exth_flags & 0x40 != 0 {
        header.exth = parse_exth(rec0.get(16 + mobi_len..).unwrap_or_default());
    }
    Some(header)
}

fn parse_exth(data: &[u8]) -> Vec<(u32, Vec<u8>)> {
    let mut records = Vec::new();
    if data.get(..4) != Some(b"EXTH".as_slice()) {
        return records;
    }
    let count = be_u32(data, 8).unwrap_or(0);
    let mut pos = 12;
    for _ in 0..count {
        let (Some(kind), Some(len)) = (be_u32(data, pos), usize_at(data, pos + 4)) else {
            break;
        };
        if len < 8 {
            break;
        }
        let Some(value) = data.get(pos + 8..pos + len) else {
            break;
        };
        records.push((kind, value.to_vec()));
        pos += len;
    }
    records
}

/// Build a synthetic Mobipocket file for tests.
#[cfg(test)]
#[allow(clippy::indexing_slicing)]
pub(crate) fn build_mobi(encryption: u16, full_name: &str, exth: &[(u32, &str)]) -> Vec<u8> {
    let mut exth_block = Vec::new();
    if !exth.is_empty() {
        let mut body = Vec::new();
        for (kind, value) in exth {
            body.extend_from_slice(&kind.to_be_bytes());
            body.extend_from_slice(&u32::try_from(value.len() + 8).unwrap_or(0).to_be_bytes());
            body.extend_from_slice(value.as_bytes());
        }
        exth_block.extend_from_slice(b"EXTH");
        exth_block.extend_from_slice(&u32::try_from(body.len() + 12).unwrap_or(0).to_be_bytes());
        exth_block.extend_from_slice(&u32::try_from(exth.len()).unwrap_or(0).to_be_bytes());
        exth_block.extend_from_slice(&body);
    }

    let mobi_len: usize = 232;
    let mut rec0 = vec![0u8; 16 + mobi_len];
    let put_u16 = |buf: &mut Vec<u8>, at: usize, v: u16| {
        buf[at..at + 2].copy_from_slice(&v.to_be_bytes());
    };
    let put_u32 = |buf: &mut Vec<u8>, at: usize, v: u32| {
        buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
    };
    put_u16(&mut rec0, 12, encryption);
    rec0[16..20].copy_from_slice(b"MOBI");
    put_u32(&mut rec0, 20, u32::try_from(mobi_len).unwrap_or(0));
    put_u32(&mut rec0, 36, 6);
    put_u32(&mut rec0, 128, if exth.is_empty() { 0 } else { 0x40 });
    rec0.extend_from_slice(&exth_block);
    let name_off = rec0.len();
    put_u32(&mut rec0, 84, u32::try_from(name_off).unwrap_or(0));
    put_u32(&mut rec0, 88, u32::try_from(full_name.len()).unwrap_or(0));
    rec0.extend_from_slice(full_name.as_bytes());

    let mut data = vec![0u8; 78 + 8 + 2];
    data[0..4].copy_from_slice(b"test");
    data[60..68].copy_from_slice(MOBI_TYPE_CREATOR);
    data[76..78].copy_from_slice(&1u16.to_be_bytes());
    let rec0_off = u32::try_from(data.len()).unwrap_or(0);
    data[78..82].copy_from_slice(&rec0_off.to_be_bytes());
    data.extend_from_slice(&rec0);
    data
}
