//! Bidirectional mapping between run descriptors and file names.
//!
//! Stream files:
//! `<prefix>-<run_hash>-<stream_hash>-YYYYMMDD-hhmmssSSS-sNNN-a<axis>-fFFF-zZZZ.tsv`
//!
//! FFT files carry an additional `-<fft_axis>` before the extension. The
//! parser and the formatter round-trip exactly for every legal name.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Local, NaiveDateTime, Timelike};
use regex::Regex;

use crate::gcode::Axis;

pub const STREAM_EXTENSION: &str = "tsv";

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S%3f";

fn stream_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(\w+)-([0-9a-f]+)-([0-9a-f]+)-(\d{8}-\d{9})-s(\d{3})-a([xyz])-f(\d{3})-z(\d{3})\.(\w+)$",
        )
        .unwrap()
    })
}

fn fft_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(\w+)-([0-9a-f]+)-([0-9a-f]+)-(\d{8}-\d{9})-s(\d{3})-a([xyz])-f(\d{3})-z(\d{3})-([xyz])\.(\w+)$",
        )
        .unwrap()
    })
}

fn timestamp_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    // Truncated to the millisecond the name can represent.
    now.with_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}

/// Fallback name for ad-hoc captures outside a planned run,
/// e.g. `stream-20231110-181020345.tsv`.
pub fn default_stream_filename(prefix: &str) -> String {
    format!(
        "{prefix}-{}.{STREAM_EXTENSION}",
        timestamp_now().format(TIMESTAMP_FORMAT)
    )
}

/// Everything encoded in a stream or FFT file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilenameMeta {
    pub prefix: String,
    /// Groups all streams of one planner invocation.
    pub run_hash: String,
    /// Disambiguates streams within a run.
    pub stream_hash: String,
    /// Millisecond precision; sub-millisecond digits are not representable.
    pub timestamp: NaiveDateTime,
    pub sequence_nr: u16,
    pub axis: Axis,
    pub frequency_hz: u16,
    pub zeta_em2: u8,
    /// Which acceleration column an FFT file was computed from; `None` for
    /// stream files.
    pub fft_axis: Option<Axis>,
    pub extension: String,
}

impl FilenameMeta {
    /// Meta for a new stream capture, stamped with the current time.
    pub fn for_stream(
        prefix: &str,
        run_hash: &str,
        stream_hash: &str,
        sequence_nr: u16,
        axis: Axis,
        frequency_hz: u16,
        zeta_em2: u8,
    ) -> Self {
        FilenameMeta {
            prefix: prefix.to_string(),
            run_hash: run_hash.to_string(),
            stream_hash: stream_hash.to_string(),
            timestamp: timestamp_now(),
            sequence_nr,
            axis,
            frequency_hz,
            zeta_em2,
            fft_axis: None,
            extension: STREAM_EXTENSION.to_string(),
        }
    }

    /// The FFT name for the same capture, keeping the source timestamp.
    pub fn to_fft(&self, fft_axis: Axis) -> Self {
        let mut meta = self.clone();
        meta.fft_axis = Some(fft_axis);
        meta
    }

    pub fn format(&self) -> String {
        let base = format!(
            "{}-{}-{}-{}-s{:03}-a{}-f{:03}-z{:03}",
            self.prefix,
            self.run_hash,
            self.stream_hash,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.sequence_nr,
            self.axis,
            self.frequency_hz,
            self.zeta_em2,
        );
        match self.fft_axis {
            Some(fft) => format!("{base}-{fft}.{}", self.extension),
            None => format!("{base}.{}", self.extension),
        }
    }

    pub fn parse(name: &str) -> Result<Self, String> {
        if let Some(captures) = fft_regex().captures(name) {
            let mut meta = Self::from_captures(&captures, name)?;
            meta.fft_axis = Some(Axis::from_str(&captures[9])?);
            meta.extension = captures[10].to_string();
            return Ok(meta);
        }
        let captures = stream_regex()
            .captures(name)
            .ok_or_else(|| format!("not a run file name: {name:?}"))?;
        let mut meta = Self::from_captures(&captures, name)?;
        meta.extension = captures[9].to_string();
        Ok(meta)
    }

    fn from_captures(captures: &regex::Captures<'_>, name: &str) -> Result<Self, String> {
        let timestamp = NaiveDateTime::parse_from_str(&captures[4], TIMESTAMP_FORMAT)
            .map_err(|e| format!("bad timestamp in {name:?}: {e}"))?;
        let number = |i: usize| -> Result<u16, String> {
            captures[i]
                .parse::<u16>()
                .map_err(|e| format!("bad number in {name:?}: {e}"))
        };
        Ok(FilenameMeta {
            prefix: captures[1].to_string(),
            run_hash: captures[2].to_string(),
            stream_hash: captures[3].to_string(),
            timestamp,
            sequence_nr: number(5)?,
            axis: Axis::from_str(&captures[6])?,
            frequency_hz: number(7)?,
            zeta_em2: number(8)? as u8,
            fft_axis: None,
            extension: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_meta() -> FilenameMeta {
        FilenameMeta {
            prefix: "axxel".to_string(),
            run_hash: "01af23cd".to_string(),
            stream_hash: "7b00c1d2".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2023, 11, 10)
                .unwrap()
                .and_hms_milli_opt(18, 20, 30, 456)
                .unwrap(),
            sequence_nr: 100,
            axis: Axis::X,
            frequency_hz: 200,
            zeta_em2: 15,
            fft_axis: None,
            extension: STREAM_EXTENSION.to_string(),
        }
    }

    #[test]
    fn formats_the_stream_schema() {
        assert_eq!(
            sample_meta().format(),
            "axxel-01af23cd-7b00c1d2-20231110-182030456-s100-ax-f200-z015.tsv"
        );
    }

    #[test]
    fn stream_names_round_trip() {
        let meta = sample_meta();
        assert_eq!(FilenameMeta::parse(&meta.format()).unwrap(), meta);
    }

    #[test]
    fn fft_names_round_trip_and_keep_the_timestamp() {
        let stream = sample_meta();
        let fft = stream.to_fft(Axis::Z);
        assert_eq!(
            fft.format(),
            "axxel-01af23cd-7b00c1d2-20231110-182030456-s100-ax-f200-z015-z.tsv"
        );
        let parsed = FilenameMeta::parse(&fft.format()).unwrap();
        assert_eq!(parsed, fft);
        assert_eq!(parsed.timestamp, stream.timestamp);
    }

    #[test]
    fn freshly_stamped_names_round_trip() {
        let meta = FilenameMeta::for_stream("cap", "deadbeef", "0badf00d", 7, Axis::Y, 80, 25);
        assert_eq!(FilenameMeta::parse(&meta.format()).unwrap(), meta);
    }

    #[test]
    fn rejects_foreign_names() {
        assert!(FilenameMeta::parse("notes.txt").is_err());
        assert!(FilenameMeta::parse("axxel-0a-20231110-182030456-s001-ax-f010-z000.tsv").is_err());
    }

    #[test]
    fn default_filename_carries_the_extension() {
        let name = default_stream_filename("stream");
        assert!(name.starts_with("stream-"));
        assert!(name.ends_with(".tsv"));
    }
}
