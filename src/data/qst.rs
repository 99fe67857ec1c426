//! Parser and writer for `.qst` quest containers.
//!
//! A Blue Burst `.qst` file carries two logical files, normally a `.dat`
//! entity table and a `.bin` script. It starts with one 88-byte header per
//! file, followed by 1056-byte chunks that interleave the files' contents
//! 1024 bytes at a time.
//!
//! Header (88 bytes):
//! - `0x00` `u16` header size (88)
//! - `0x02` `u16` magic (`0x44`)
//! - `0x04` `u16` quest number
//! - `0x06` 38 reserved bytes
//! - `0x2C` 16-byte file name
//! - `0x3C` `u32` file size
//! - `0x40` 24-byte secondary file name
//!
//! Chunk (1056 bytes):
//! - `0x000` 4 reserved bytes
//! - `0x004` `u8` chunk number
//! - `0x005` 3 reserved bytes
//! - `0x008` 16-byte file name
//! - `0x018` 1024 data bytes
//! - `0x418` `u32` count of valid data bytes
//! - `0x41C` 4 reserved bytes

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::data::cursor::{Cursor, CursorError, CursorMut};
use crate::data::parser_utils::StringFormat;
use crate::diagnostics::{Diagnostics, Warning};

pub const QST_HEADER_SIZE: usize = 88;
pub const QST_CHUNK_SIZE: usize = 1056;
pub const QST_CHUNK_BODY_SIZE: usize = 1024;
/// Chunk numbers are a single byte.
pub const QST_MAX_CHUNKS: usize = 256;
/// Largest file the chunk numbering can address.
pub const QST_MAX_FILE_SIZE: usize = QST_MAX_CHUNKS * QST_CHUNK_BODY_SIZE;

const QST_HEADER_MAGIC: u16 = 0x44;
const CHUNK_PREFIX: [u8; 4] = [0x1C, 0x04, 0x13, 0x00];
const FILE_NAME_LEN: usize = 16;
const SECONDARY_NAME_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum QstError {
    #[error("{0:?} quest containers are not supported")]
    UnsupportedVersion(QstVersion),
    #[error("a quest container holds exactly 2 files, got {0}")]
    FileCount(usize),
    #[error("file name {0:?} is longer than 16 bytes")]
    NameTooLong(String),
    #[error("secondary file name {0:?} is longer than 24 bytes")]
    SecondaryNameTooLong(String),
    #[error("file {name} has {size} bytes, more than a container can chunk")]
    FileTooLarge { name: String, size: usize },
    #[error("malformed container: {0}")]
    Cursor(#[from] CursorError),
}

/// Container flavor, detected from the first bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QstVersion {
    DreamcastGameCube,
    BlueBurst,
    Pc,
}

/// One logical file multiplexed inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QstFile {
    pub name: String,
    /// Secondary name from the header. Derived from `name` when writing if absent.
    pub name_2: Option<String>,
    pub quest_no: Option<u16>,
    /// Size declared by the file's header, if it had one.
    pub expected_size: Option<u32>,
    pub data: Vec<u8>,
    /// Chunk numbers observed while parsing.
    pub chunk_nos: BTreeSet<u8>,
}

impl QstFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        QstFile {
            name: name.into(),
            name_2: None,
            quest_no: None,
            expected_size: None,
            data,
            chunk_nos: BTreeSet::new(),
        }
    }
}

/// A parsed quest container.
#[derive(Debug, Clone)]
pub struct Qst {
    pub version: QstVersion,
    pub files: Vec<QstFile>,
}

impl Qst {
    pub fn file(&self, name: &str) -> Option<&QstFile> {
        self.files.iter().find(|file| file.name == name)
    }
}

struct FileHeader {
    quest_no: u16,
    name: String,
    size: u32,
    name_2: String,
}

/// Detect the container flavor from its first three bytes.
pub fn detect_version(data: &[u8]) -> Result<QstVersion, QstError> {
    let mut cursor = Cursor::new_le(data);
    let version_a = cursor.u8()?;
    cursor.seek(1)?;
    let version_b = cursor.u8()?;

    let version = match (version_a, version_b) {
        (0x44 | 0xA6, _) => QstVersion::DreamcastGameCube,
        (0x58, 0x44) => QstVersion::BlueBurst,
        _ => QstVersion::Pc,
    };
    Ok(version)
}

fn parse_file_header(cursor: &mut Cursor<'_>) -> Result<FileHeader, CursorError> {
    cursor.seek(4)?;
    let quest_no = cursor.u16()?;
    cursor.seek(38)?;
    let name = cursor.string_ascii(FILE_NAME_LEN, StringFormat::PADDED)?;
    let size = cursor.u32()?;
    let name_2 = cursor.string_ascii(SECONDARY_NAME_LEN, StringFormat::PADDED)?;
    Ok(FileHeader {
        quest_no,
        name,
        size,
        name_2,
    })
}

fn parse_chunk(
    chunk: &mut Cursor<'_>,
    headers: &[FileHeader],
    files: &mut Vec<QstFile>,
    diag: &mut Diagnostics,
) -> Result<(), CursorError> {
    chunk.seek(4)?;
    let chunk_no = chunk.u8()?;
    chunk.seek(3)?;
    let name = chunk.string_ascii(FILE_NAME_LEN, StringFormat::PADDED)?;
    let mut body = chunk.take(QST_CHUNK_BODY_SIZE)?;
    let declared_size = chunk.u32()?;

    let size = if declared_size as usize > QST_CHUNK_BODY_SIZE {
        diag.warn(Warning::OversizedChunk {
            file: name.clone(),
            chunk_no,
            size: declared_size,
        });
        QST_CHUNK_BODY_SIZE
    } else {
        declared_size as usize
    };
    let payload = body.bytes(size)?;

    let index = match files.iter().position(|file| file.name == name) {
        Some(index) => index,
        None => {
            let header = headers.iter().find(|header| header.name == name);
            let expected_size = header.map(|header| header.size);
            files.push(QstFile {
                name: name.clone(),
                name_2: header.map(|header| header.name_2.clone()),
                quest_no: header.map(|header| header.quest_no),
                expected_size,
                data: Vec::new(),
                chunk_nos: BTreeSet::new(),
            });
            files.len() - 1
        }
    };
    let file = &mut files[index];

    if !file.chunk_nos.insert(chunk_no) {
        diag.warn(Warning::DuplicateChunk {
            file: name,
            chunk_no,
        });
    }

    let offset = chunk_no as usize * QST_CHUNK_BODY_SIZE;
    if file.data.len() < offset + size {
        file.data.resize(offset + size, 0);
    }
    file.data[offset..offset + size].copy_from_slice(payload);

    Ok(())
}

fn finalize_file(file: &mut QstFile, diag: &mut Diagnostics) {
    let observed = file.data.len();
    let mut expected = 0;
    if let Some(declared) = file.expected_size {
        if observed != declared as usize {
            diag.warn(Warning::FileSizeMismatch {
                file: file.name.clone(),
                expected: declared,
                actual: observed,
            });
        }

        expected = declared as usize;
        if expected > QST_MAX_FILE_SIZE {
            diag.warn(Warning::DeclaredSizeTooLarge {
                file: file.name.clone(),
                declared,
                max: QST_MAX_FILE_SIZE,
            });
            expected = QST_MAX_FILE_SIZE;
        }
    }

    let size = observed.max(expected);
    file.data.resize(size, 0);

    for chunk_no in 0..size.div_ceil(QST_CHUNK_BODY_SIZE) {
        let present = u8::try_from(chunk_no).is_ok_and(|no| file.chunk_nos.contains(&no));
        if !present {
            diag.warn(Warning::MissingChunk {
                file: file.name.clone(),
                chunk_no,
            });
        }
    }
}

/// Parse a quest container.
///
/// Missing, duplicate, and oversized chunks are reported through `diag` and
/// the affected files are still returned with whatever data was present.
pub fn parse_qst(data: &[u8], diag: &mut Diagnostics) -> Result<Qst, QstError> {
    let version = detect_version(data)?;
    debug!(?version, "detected quest container version");
    if version != QstVersion::BlueBurst {
        return Err(QstError::UnsupportedVersion(version));
    }

    let mut cursor = Cursor::new_le(data);
    let headers = [
        parse_file_header(&mut cursor.take(QST_HEADER_SIZE)?)?,
        parse_file_header(&mut cursor.take(QST_HEADER_SIZE)?)?,
    ];

    let mut files = Vec::with_capacity(headers.len());
    while cursor.bytes_left() > 0 {
        let mut chunk = cursor.take(QST_CHUNK_SIZE)?;
        parse_chunk(&mut chunk, &headers, &mut files, diag)?;
    }

    for file in &mut files {
        finalize_file(file, diag);
    }

    Ok(Qst { version, files })
}

/// Secondary name used when a file has none: `_j` goes before the extension.
pub fn default_secondary_name(name: &str) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}_j{}", &name[..dot], &name[dot..]),
        None => format!("{name}_j"),
    }
}

fn chunk_count(file: &QstFile) -> usize {
    file.data.len().div_ceil(QST_CHUNK_BODY_SIZE).max(1)
}

fn write_file_header(cursor: &mut CursorMut<'_>, file: &QstFile) -> Result<(), QstError> {
    let name_2 = file
        .name_2
        .clone()
        .unwrap_or_else(|| default_secondary_name(&file.name));
    if name_2.len() > SECONDARY_NAME_LEN {
        return Err(QstError::SecondaryNameTooLong(name_2));
    }

    let mut header = cursor.take_mut(QST_HEADER_SIZE)?;
    header.write_u16(QST_HEADER_SIZE as u16)?;
    header.write_u16(QST_HEADER_MAGIC)?;
    header.write_u16(file.quest_no.unwrap_or(0))?;
    header.write_zeros(38)?;
    header.write_string_ascii(&file.name, FILE_NAME_LEN)?;
    header.write_u32(file.data.len() as u32)?;
    header.write_string_ascii(&name_2, SECONDARY_NAME_LEN)?;
    Ok(())
}

/// Write one chunk of `file`. Returns whether the file has data left after it.
fn write_chunk(
    cursor: &mut CursorMut<'_>,
    file: &QstFile,
    chunk_no: usize,
) -> Result<bool, QstError> {
    let start = (chunk_no * QST_CHUNK_BODY_SIZE).min(file.data.len());
    let end = (start + QST_CHUNK_BODY_SIZE).min(file.data.len());
    let payload = &file.data[start..end];

    let mut chunk = cursor.take_mut(QST_CHUNK_SIZE)?;
    chunk.write_bytes(&CHUNK_PREFIX)?;
    chunk.write_u8(chunk_no as u8)?;
    chunk.write_zeros(3)?;
    chunk.write_string_ascii(&file.name, FILE_NAME_LEN)?;
    chunk.write_bytes(payload)?;
    chunk.write_zeros(QST_CHUNK_BODY_SIZE - payload.len())?;
    chunk.write_u32(payload.len() as u32)?;
    chunk.write_u32(0)?;

    Ok(end < file.data.len())
}

/// Write a Blue Burst quest container.
///
/// Files are emitted round-robin, one chunk per file per round, and drop out
/// of the rotation once their data is exhausted.
pub fn write_qst(qst: &Qst) -> Result<Vec<u8>, QstError> {
    if qst.version != QstVersion::BlueBurst {
        return Err(QstError::UnsupportedVersion(qst.version));
    }
    if qst.files.len() != 2 {
        return Err(QstError::FileCount(qst.files.len()));
    }
    for file in &qst.files {
        if file.name.len() > FILE_NAME_LEN {
            return Err(QstError::NameTooLong(file.name.clone()));
        }
        if chunk_count(file) > QST_MAX_CHUNKS {
            return Err(QstError::FileTooLarge {
                name: file.name.clone(),
                size: file.data.len(),
            });
        }
    }

    let total_chunks: usize = qst.files.iter().map(chunk_count).sum();
    let mut out = vec![0u8; qst.files.len() * QST_HEADER_SIZE + total_chunks * QST_CHUNK_SIZE];
    let mut cursor = CursorMut::new_le(&mut out);

    for file in &qst.files {
        write_file_header(&mut cursor, file)?;
    }

    let mut rotation: Vec<(&QstFile, usize)> = qst.files.iter().map(|file| (file, 0)).collect();
    while !rotation.is_empty() {
        let mut i = 0;
        while i < rotation.len() {
            let (file, chunk_no) = rotation[i];
            if write_chunk(&mut cursor, file, chunk_no)? {
                rotation[i].1 += 1;
                i += 1;
            } else {
                rotation.remove(i);
            }
        }
    }

    debug_assert_eq!(cursor.bytes_left(), 0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(name: &str, size: u32, quest_no: u16) -> Vec<u8> {
        let mut out = vec![0u8; QST_HEADER_SIZE];
        let mut cursor = CursorMut::new_le(&mut out);
        cursor.write_u16(QST_HEADER_SIZE as u16).unwrap();
        cursor.write_u16(QST_HEADER_MAGIC).unwrap();
        cursor.write_u16(quest_no).unwrap();
        cursor.write_zeros(38).unwrap();
        cursor.write_string_ascii(name, 16).unwrap();
        cursor.write_u32(size).unwrap();
        cursor.write_string_ascii("", 24).unwrap();
        out
    }

    fn chunk_bytes(name: &str, chunk_no: u8, payload: &[u8], declared_size: u32) -> Vec<u8> {
        let mut out = vec![0u8; QST_CHUNK_SIZE];
        let mut cursor = CursorMut::new_le(&mut out);
        cursor.write_bytes(&CHUNK_PREFIX).unwrap();
        cursor.write_u8(chunk_no).unwrap();
        cursor.write_zeros(3).unwrap();
        cursor.write_string_ascii(name, 16).unwrap();
        cursor.write_bytes(payload).unwrap();
        cursor.seek_start(0x418).unwrap();
        cursor.write_u32(declared_size).unwrap();
        out
    }

    fn patterned(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn container(headers: &[Vec<u8>], chunks: &[Vec<u8>]) -> Vec<u8> {
        headers.iter().chain(chunks).flatten().copied().collect()
    }

    fn chunks_of(name: &str, data: &[u8]) -> Vec<Vec<u8>> {
        data.chunks(QST_CHUNK_BODY_SIZE)
            .enumerate()
            .map(|(i, c)| chunk_bytes(name, i as u8, c, c.len() as u32))
            .collect()
    }

    #[test]
    fn round_trip_exact_and_short_sizes() {
        let dat = patterned(2048, 1);
        let bin = patterned(3000, 7);
        let mut dat_file = QstFile::new("quest58.dat", dat.clone());
        dat_file.quest_no = Some(58);
        let qst = Qst {
            version: QstVersion::BlueBurst,
            files: vec![dat_file, QstFile::new("quest58.bin", bin.clone())],
        };

        let bytes = write_qst(&qst).unwrap();
        assert_eq!(bytes.len(), 2 * QST_HEADER_SIZE + 5 * QST_CHUNK_SIZE);
        assert_eq!(detect_version(&bytes).unwrap(), QstVersion::BlueBurst);

        let mut diag = Diagnostics::new();
        let parsed = parse_qst(&bytes, &mut diag).unwrap();
        assert!(diag.is_empty(), "{:?}", diag.warnings());
        assert_eq!(parsed.files.len(), 2);

        let dat_file = parsed.file("quest58.dat").unwrap();
        assert_eq!(dat_file.data, dat);
        assert_eq!(dat_file.quest_no, Some(58));
        assert_eq!(dat_file.name_2.as_deref(), Some("quest58_j.dat"));
        assert_eq!(dat_file.expected_size, Some(2048));
        assert_eq!(dat_file.chunk_nos, BTreeSet::from([0, 1]));

        let bin_file = parsed.file("quest58.bin").unwrap();
        assert_eq!(bin_file.data, bin);
        assert_eq!(bin_file.chunk_nos, BTreeSet::from([0, 1, 2]));
    }

    #[test]
    fn chunks_are_interleaved_round_robin() {
        let qst = Qst {
            version: QstVersion::BlueBurst,
            files: vec![
                QstFile::new("a.dat", patterned(3000, 0)),
                QstFile::new("a.bin", patterned(100, 0)),
            ],
        };
        let bytes = write_qst(&qst).unwrap();
        let names: Vec<String> = bytes[2 * QST_HEADER_SIZE..]
            .chunks(QST_CHUNK_SIZE)
            .map(|chunk| {
                let mut cursor = Cursor::new_le(&chunk[8..24]);
                cursor.string_ascii(16, StringFormat::PADDED).unwrap()
            })
            .collect();
        assert_eq!(names, ["a.dat", "a.bin", "a.dat", "a.dat"]);
    }

    #[test]
    fn interleaving_order_does_not_matter() {
        let dat = patterned(2500, 3);
        let bin = patterned(1500, 9);
        let headers = [
            header_bytes("q.dat", dat.len() as u32, 1),
            header_bytes("q.bin", bin.len() as u32, 1),
        ];
        let dat_chunks = chunks_of("q.dat", &dat);
        let bin_chunks = chunks_of("q.bin", &bin);

        let sequential: Vec<Vec<u8>> = dat_chunks.iter().chain(&bin_chunks).cloned().collect();
        let shuffled = vec![
            bin_chunks[1].clone(),
            dat_chunks[2].clone(),
            dat_chunks[0].clone(),
            bin_chunks[0].clone(),
            dat_chunks[1].clone(),
        ];

        let mut diag = Diagnostics::new();
        let a = parse_qst(&container(&headers, &sequential), &mut diag).unwrap();
        let b = parse_qst(&container(&headers, &shuffled), &mut diag).unwrap();
        assert!(diag.is_empty());

        for name in ["q.dat", "q.bin"] {
            assert_eq!(a.file(name).unwrap().data, b.file(name).unwrap().data);
        }
        assert_eq!(a.file("q.dat").unwrap().data, dat);
        assert_eq!(b.file("q.bin").unwrap().data, bin);
    }

    #[test]
    fn missing_chunk_is_a_warning() {
        let dat = patterned(3072, 5);
        let headers = [
            header_bytes("m.dat", dat.len() as u32, 0),
            header_bytes("m.bin", 4, 0),
        ];
        let dat_chunks = chunks_of("m.dat", &dat);
        let chunks = vec![
            dat_chunks[0].clone(),
            dat_chunks[2].clone(),
            chunk_bytes("m.bin", 0, &[1, 2, 3, 4], 4),
        ];

        let mut diag = Diagnostics::new();
        let qst = parse_qst(&container(&headers, &chunks), &mut diag).unwrap();
        assert_eq!(
            diag.warnings(),
            [Warning::MissingChunk {
                file: "m.dat".to_string(),
                chunk_no: 1
            }]
        );

        let file = qst.file("m.dat").unwrap();
        assert_eq!(file.data.len(), 3072);
        assert_eq!(file.data[..1024], dat[..1024]);
        assert_eq!(file.data[2048..], dat[2048..]);
        assert!(file.data[1024..2048].iter().all(|&b| b == 0));
    }

    #[test]
    fn missing_trailing_chunk_reports_size_and_gap() {
        let dat = patterned(1500, 5);
        let headers = [
            header_bytes("t.dat", dat.len() as u32, 0),
            header_bytes("t.bin", 0, 0),
        ];
        let chunks = vec![chunks_of("t.dat", &dat)[0].clone(), chunk_bytes("t.bin", 0, &[], 0)];

        let mut diag = Diagnostics::new();
        let qst = parse_qst(&container(&headers, &chunks), &mut diag).unwrap();
        assert_eq!(qst.file("t.dat").unwrap().data.len(), 1500);
        assert!(diag.warnings().contains(&Warning::FileSizeMismatch {
            file: "t.dat".to_string(),
            expected: 1500,
            actual: 1024
        }));
        assert!(diag.warnings().contains(&Warning::MissingChunk {
            file: "t.dat".to_string(),
            chunk_no: 1
        }));
    }

    #[test]
    fn declared_size_is_capped_at_addressable_chunks() {
        let headers = [header_bytes("h.dat", 0x1000_0000, 0), header_bytes("h.bin", 0, 0)];
        let chunks = [chunk_bytes("h.dat", 0, &[9; 100], 100)];

        let mut diag = Diagnostics::new();
        let qst = parse_qst(&container(&headers, &chunks), &mut diag).unwrap();
        assert_eq!(qst.file("h.dat").unwrap().data.len(), QST_MAX_FILE_SIZE);

        let warnings = diag.warnings();
        assert_eq!(warnings.len(), 2 + (QST_MAX_CHUNKS - 1));
        assert_eq!(
            warnings[..3],
            [
                Warning::FileSizeMismatch {
                    file: "h.dat".to_string(),
                    expected: 0x1000_0000,
                    actual: 100
                },
                Warning::DeclaredSizeTooLarge {
                    file: "h.dat".to_string(),
                    declared: 0x1000_0000,
                    max: QST_MAX_FILE_SIZE
                },
                Warning::MissingChunk {
                    file: "h.dat".to_string(),
                    chunk_no: 1
                },
            ]
        );
        assert_eq!(
            warnings.last(),
            Some(&Warning::MissingChunk {
                file: "h.dat".to_string(),
                chunk_no: QST_MAX_CHUNKS - 1
            })
        );
    }

    #[test]
    fn duplicate_and_oversized_chunks() {
        let headers = [header_bytes("d.dat", 4, 0), header_bytes("d.bin", 0, 0)];
        let chunks = vec![
            chunk_bytes("d.dat", 0, &[1, 1, 1, 1], 4),
            chunk_bytes("d.dat", 0, &[2, 2, 2, 2], 4),
            chunk_bytes("d.bin", 0, &[], 5000),
        ];

        let mut diag = Diagnostics::new();
        let qst = parse_qst(&container(&headers, &chunks), &mut diag).unwrap();
        assert_eq!(qst.file("d.dat").unwrap().data, [2, 2, 2, 2]);
        assert!(diag.warnings().contains(&Warning::DuplicateChunk {
            file: "d.dat".to_string(),
            chunk_no: 0
        }));
        assert!(diag.warnings().contains(&Warning::OversizedChunk {
            file: "d.bin".to_string(),
            chunk_no: 0,
            size: 5000
        }));
        assert_eq!(qst.file("d.bin").unwrap().data.len(), 1024);
    }

    #[test]
    fn partial_trailing_chunk_is_structural() {
        let qst = Qst {
            version: QstVersion::BlueBurst,
            files: vec![QstFile::new("x.dat", vec![1]), QstFile::new("x.bin", vec![2])],
        };
        let mut bytes = write_qst(&qst).unwrap();
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            parse_qst(&bytes, &mut Diagnostics::new()),
            Err(QstError::Cursor(CursorError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn version_detection() {
        assert_eq!(detect_version(&[0x44, 0, 0]).unwrap(), QstVersion::DreamcastGameCube);
        assert_eq!(detect_version(&[0xA6, 0, 0]).unwrap(), QstVersion::DreamcastGameCube);
        assert_eq!(detect_version(&[0x58, 0, 0x44]).unwrap(), QstVersion::BlueBurst);
        assert_eq!(detect_version(&[0x58, 0, 0x13]).unwrap(), QstVersion::Pc);
        assert!(detect_version(&[0x58]).is_err());

        let mut dc = vec![0u8; 200];
        dc[0] = 0x44;
        assert!(matches!(
            parse_qst(&dc, &mut Diagnostics::new()),
            Err(QstError::UnsupportedVersion(QstVersion::DreamcastGameCube))
        ));
    }

    #[test]
    fn write_rejects_bad_input() {
        let files = vec![QstFile::new("a.dat", vec![]), QstFile::new("a.bin", vec![])];
        let pc = Qst {
            version: QstVersion::Pc,
            files: files.clone(),
        };
        assert!(matches!(write_qst(&pc), Err(QstError::UnsupportedVersion(QstVersion::Pc))));

        let one = Qst {
            version: QstVersion::BlueBurst,
            files: files[..1].to_vec(),
        };
        assert!(matches!(write_qst(&one), Err(QstError::FileCount(1))));

        let long = Qst {
            version: QstVersion::BlueBurst,
            files: vec![
                QstFile::new("a_very_long_name.dat", vec![]),
                QstFile::new("a.bin", vec![]),
            ],
        };
        assert!(matches!(write_qst(&long), Err(QstError::NameTooLong(_))));

        let huge = Qst {
            version: QstVersion::BlueBurst,
            files: vec![
                QstFile::new("a.dat", vec![0; 257 * 1024]),
                QstFile::new("a.bin", vec![]),
            ],
        };
        assert!(matches!(write_qst(&huge), Err(QstError::FileTooLarge { .. })));
    }

    #[test]
    fn secondary_names() {
        assert_eq!(default_secondary_name("quest1.bin"), "quest1_j.bin");
        assert_eq!(default_secondary_name("quest1"), "quest1_j");
    }
}
