//! Reads a stored stream back into memory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::device::constants::{OutputDataRate, Range, Scale};

use super::Samples;
use super::store::{COMMENT_PREFIX, StreamMeta};

/// Loads one `.tsv` stream file.
///
/// Records are whitespace-separated `seq sample x y z` rows below a single
/// header line; every `#` line is skipped. The metadata comment is looked up
/// from the end of the file and parsed as JSON, never evaluated.
pub struct SamplesLoader {
    path: PathBuf,
}

impl SamplesLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        SamplesLoader {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn parse_metadata(content: &str, samples: &mut Samples) -> io::Result<()> {
        let Some(line) = content
            .lines()
            .rev()
            .find(|line| line.starts_with(COMMENT_PREFIX))
        else {
            return Ok(());
        };
        let json = line.trim_start_matches(COMMENT_PREFIX).trim();
        let meta: StreamMeta = serde_json::from_str(json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let rate = OutputDataRate::from_str(&meta.rate)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        samples.rate = Some(rate);
        samples.separation_s = rate.period_s();
        samples.range = Range::from_str(&meta.range).ok();
        samples.scale = Scale::from_str(&meta.scale).ok();
        samples.firmware_version = Some(meta.firmware.version);
        Ok(())
    }

    pub fn load(&self) -> io::Result<Samples> {
        let content = fs::read_to_string(&self.path)?;

        let mut samples = Samples::default();
        Self::parse_metadata(&content, &mut samples)?;

        let mut rows = content
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_PREFIX));
        // Column names, checked only for presence.
        if rows.next().is_none() {
            return Ok(samples);
        }

        for row in rows {
            let mut fields = row.split_whitespace();
            let (Some(seq), Some(index), Some(x), Some(y), Some(z)) = (
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
                fields.next(),
            ) else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed record: {row:?}"),
                ));
            };
            let parse = |s: &str| {
                s.parse::<f64>()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            };
            let index: u16 = index
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            samples.seq.push(
                seq.parse()
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            );
            samples.index.push(index);
            samples
                .timestamp_ms
                .push(f64::from(index) * samples.separation_s * 1000.0);
            samples.x.push(parse(x)?);
            samples.y.push(parse(y)?);
            samples.z.push(parse(z)?);
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_fixture(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("fixture.tsv");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_records_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "seq sample x y z\n\
             00 00000 +0390.000 +0000.000 +0780.000\n\
             00 00001 -0003.900 +0019.500 +0000.000\n\
             # {\"rate\":\"ODR200\",\"range\":\"G4\",\"scale\":\"FULL_RES_4MG_LSB\",\"firmware\":{\"version\":\"1.2.3\"},\"samples\":{\"requested\":\"2\",\"received\":\"2\"}}\n",
        );

        let samples = SamplesLoader::new(&path).load().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples.rate, Some(OutputDataRate::Odr200));
        assert_eq!(samples.range, Some(Range::G4));
        assert_eq!(samples.scale, Some(Scale::FullRes4MgLsb));
        assert_eq!(samples.firmware_version.as_deref(), Some("1.2.3"));
        assert_eq!(samples.separation_s, 1.0 / 200.0);
        assert_eq!(samples.x[0], 390.0);
        assert_eq!(samples.y[1], 19.5);
        assert_eq!(samples.seq, vec![0, 0]);
    }

    #[test]
    fn timestamps_follow_the_sample_period() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "seq sample x y z\n\
             00 00000 +0000.000 +0000.000 +0000.000\n\
             00 00001 +0000.000 +0000.000 +0000.000\n\
             00 00002 +0000.000 +0000.000 +0000.000\n\
             # {\"rate\":\"ODR3200\",\"range\":\"G2\",\"scale\":\"FULL_RES_4MG_LSB\",\"firmware\":{\"version\":\"1.0.0\"},\"samples\":{\"requested\":\"3\",\"received\":\"3\"}}\n",
        );

        let samples = SamplesLoader::new(&path).load().unwrap();
        let expected_gap = 1000.0 / 3200.0;
        for pair in samples.timestamp_ms.windows(2) {
            assert!((pair[1] - pair[0] - expected_gap).abs() < 1e-6);
        }
    }

    #[test]
    fn leading_comment_lines_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "# captured on printer axis x\n\
             # second remark\n\
             seq sample x y z\n\
             01 00000 +0003.900 +0000.000 +0000.000\n\
             # {\"rate\":\"ODR100\",\"range\":\"G2\",\"scale\":\"SCALED_10BIT\",\"firmware\":{\"version\":\"0.1.0\"},\"samples\":{\"requested\":\"1\",\"received\":\"1\"}}\n",
        );

        let samples = SamplesLoader::new(&path).load().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples.seq[0], 1);
        assert_eq!(samples.scale, Some(Scale::Scaled10Bit));
    }

    #[test]
    fn file_without_metadata_still_loads_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            &dir,
            "seq sample x y z\n00 00000 +0000.000 +0000.000 +0000.000\n",
        );

        let samples = SamplesLoader::new(&path).load().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples.rate, None);
        assert_eq!(samples.timestamp_ms[0], 0.0);
    }
}
