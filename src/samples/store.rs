//! Tab-separated stream storage.
//!
//! Layout: one header line, one line per record, one trailing `#` comment
//! holding the session metadata as JSON.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::frames::Acceleration;

pub const HEADER_LINE: &str = "seq sample x y z";
pub const COMMENT_PREFIX: char = '#';

/// Session metadata stored in the trailing comment. Field order is the wire
/// format of that line; all values are strings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamMeta {
    pub rate: String,
    pub range: String,
    pub scale: String,
    pub firmware: FirmwareMeta,
    pub samples: SampleCounts,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirmwareMeta {
    pub version: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampleCounts {
    pub requested: String,
    pub received: String,
}

/// Writes one decoded stream to a file.
pub struct SampleWriter {
    out: BufWriter<File>,
    path: PathBuf,
}

impl SampleWriter {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let out = BufWriter::new(File::create(&path)?);
        Ok(SampleWriter { out, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.out, "{HEADER_LINE}")
    }

    pub fn write_record(&mut self, seq: u32, accel: &Acceleration) -> io::Result<()> {
        writeln!(self.out, "{seq:02} {accel}")
    }

    pub fn write_metadata(&mut self, meta: &StreamMeta) -> io::Result<()> {
        let json = serde_json::to_string(meta)?;
        writeln!(self.out, "{COMMENT_PREFIX} {json}")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn metadata_serializes_in_declaration_order() {
        let meta = StreamMeta {
            rate: "ODR3200".into(),
            range: "G2".into(),
            scale: "FULL_RES_4MG_LSB".into(),
            firmware: FirmwareMeta {
                version: "1.2.3".into(),
            },
            samples: SampleCounts {
                requested: "2".into(),
                received: "2".into(),
            },
        };
        assert_eq!(
            serde_json::to_string(&meta).unwrap(),
            r#"{"rate":"ODR3200","range":"G2","scale":"FULL_RES_4MG_LSB","firmware":{"version":"1.2.3"},"samples":{"requested":"2","received":"2"}}"#
        );
    }

    #[test]
    fn writes_header_records_and_comment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.tsv");
        let mut writer = SampleWriter::create(&path).unwrap();
        writer.write_header().unwrap();
        writer
            .write_record(
                0,
                &Acceleration {
                    index: 0,
                    x: 390.0,
                    y: 0.0,
                    z: 780.0,
                },
            )
            .unwrap();
        writer
            .write_metadata(&StreamMeta {
                rate: "ODR100".into(),
                range: "G4".into(),
                scale: "FULL_RES_4MG_LSB".into(),
                firmware: FirmwareMeta {
                    version: "0.0.0".into(),
                },
                samples: SampleCounts {
                    requested: "1".into(),
                    received: "1".into(),
                },
            })
            .unwrap();
        writer.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "seq sample x y z");
        assert_eq!(lines[1], "00 00000 +0390.000 +0000.000 +0780.000");
        assert!(lines[2].starts_with("# {\"rate\":\"ODR100\""));
    }
}
