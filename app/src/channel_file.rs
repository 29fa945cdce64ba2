//! Channel files, JSON or CSV by extension.
//!
//! ```json
//! { "model": "IC-7300", "channels": [ { "channel_number": 1, ... } ] }
//! ```
//!
//! CSV files hold one row per channel and carry no model:
//!
//! ```text
//! channel,name,rx_frequency_hz,tx_frequency_hz,mode,filter,data_mode,tone_mode,tone_hz,dtcs_code,scan_select
//! 12,10M RPT,29620000,29520000,FM,FIL1,false,TONE,88.5,,0
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use civmem_core::{Band, ChannelMode, ChannelRecord, FilterWidth, ToneSquelch};

/// On-disk layout, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Csv,
}

impl FileFormat {
    /// `.csv` (any case) is CSV, everything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => FileFormat::Csv,
            _ => FileFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFile {
    /// Model the channels were read from or are meant for. Empty when the
    /// file format does not record it.
    pub model: String,
    pub channels: Vec<ChannelRecord>,
}

impl ChannelFile {
    pub fn new(model: &str, mut channels: Vec<ChannelRecord>) -> Self {
        channels.sort_by_key(|c| c.channel_number);
        ChannelFile {
            model: model.to_string(),
            channels,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: ChannelFile =
            serde_json::from_str(text).context("not a valid channel file")?;
        check_duplicates(&file.channels)?;
        Ok(file)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize channels")
    }

    pub fn from_csv(text: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let mut channels = Vec::new();
        for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
            // Line 1 is the header.
            let line = i + 2;
            let row = row.with_context(|| format!("line {line}: malformed row"))?;
            let record = row
                .into_record()
                .with_context(|| format!("line {line}"))?;
            channels.push(record);
        }
        check_duplicates(&channels)?;
        Ok(ChannelFile::new("", channels))
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in &self.channels {
            writer
                .serialize(CsvRow::from(record))
                .with_context(|| format!("failed to serialize channel {}", record.channel_number))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow!("failed to flush CSV: {}", e.error()))?;
        String::from_utf8(bytes).context("CSV output is not UTF-8")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed = match FileFormat::from_path(path) {
            FileFormat::Json => Self::from_json(&text),
            FileFormat::Csv => Self::from_csv(&text),
        };
        parsed.with_context(|| format!("in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = match FileFormat::from_path(path) {
            FileFormat::Json => {
                let mut text = self.to_json()?;
                text.push('\n');
                text
            }
            FileFormat::Csv => self.to_csv()?,
        };
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Count programmed channels against a radio with `capacity` slots.
    pub fn summary(&self, capacity: u16) -> Summary {
        let used: Vec<&ChannelRecord> = self.channels.iter().filter(|c| !c.is_empty()).collect();

        let by_band = Band::all()
            .iter()
            .filter_map(|&band| {
                let count = used
                    .iter()
                    .filter(|c| band.freq_range().contains(c.frequency_hz))
                    .count();
                (count > 0).then_some((band, count))
            })
            .collect();
        let out_of_band = used
            .iter()
            .filter(|c| Band::from_freq(c.frequency_hz).is_none())
            .count();

        let mut by_mode = BTreeMap::new();
        for c in &used {
            *by_mode.entry(c.mode.to_string()).or_insert(0) += 1;
        }

        Summary {
            capacity,
            used: used.len(),
            free: usize::from(capacity).saturating_sub(used.len()),
            by_band,
            out_of_band,
            by_mode,
        }
    }
}

/// Occupancy of a channel file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub capacity: u16,
    pub used: usize,
    pub free: usize,
    /// Bands with at least one channel, lowest first.
    pub by_band: Vec<(Band, usize)>,
    /// Channels outside every amateur band (general coverage).
    pub out_of_band: usize,
    /// Channels per mode, by mode name.
    pub by_mode: BTreeMap<String, usize>,
}

fn check_duplicates(channels: &[ChannelRecord]) -> Result<()> {
    let mut numbers: Vec<u16> = channels.iter().map(|c| c.channel_number).collect();
    numbers.sort_unstable();
    if let Some(w) = numbers.windows(2).find(|w| w[0] == w[1]) {
        bail!("channel {} appears more than once", w[0]);
    }
    Ok(())
}

/// Flat CSV form of a [`ChannelRecord`]. Only `channel`,
/// `rx_frequency_hz` and `mode` are required on import.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    channel: u16,
    #[serde(default)]
    name: String,
    rx_frequency_hz: u64,
    #[serde(default)]
    tx_frequency_hz: Option<u64>,
    mode: String,
    #[serde(default)]
    filter: String,
    #[serde(default)]
    data_mode: Option<bool>,
    #[serde(default)]
    tone_mode: String,
    #[serde(default)]
    tone_hz: Option<f64>,
    #[serde(default)]
    dtcs_code: Option<u16>,
    #[serde(default)]
    scan_select: Option<u8>,
}

impl From<&ChannelRecord> for CsvRow {
    fn from(record: &ChannelRecord) -> Self {
        let (tone_mode, tone_hz, dtcs_code) = match record.tone_squelch {
            None => ("OFF", None, None),
            Some(ToneSquelch::Tone(t)) => ("TONE", Some(f64::from(t) / 10.0), None),
            Some(ToneSquelch::Tsql(t)) => ("TSQL", Some(f64::from(t) / 10.0), None),
            Some(ToneSquelch::Dtcs(code)) => ("DTCS", None, Some(code)),
        };
        CsvRow {
            channel: record.channel_number,
            name: record.name.clone(),
            rx_frequency_hz: record.frequency_hz,
            tx_frequency_hz: Some(record.tx_frequency_hz().unwrap_or(record.frequency_hz)),
            mode: record.mode.to_string(),
            filter: record.filter_width.to_string(),
            data_mode: Some(record.data_mode),
            tone_mode: tone_mode.to_string(),
            tone_hz,
            dtcs_code,
            scan_select: Some(record.scan_select),
        }
    }
}

impl CsvRow {
    fn into_record(self) -> Result<ChannelRecord> {
        let mode: ChannelMode = self.mode.parse()?;
        let filter_width = if self.filter.trim().is_empty() {
            FilterWidth::default()
        } else {
            self.filter.parse()?
        };

        let rx = i64::try_from(self.rx_frequency_hz).context("RX frequency out of range")?;
        let tx = match self.tx_frequency_hz {
            Some(tx) => i64::try_from(tx).context("TX frequency out of range")?,
            None => rx,
        };

        let tone_squelch = match self.tone_mode.trim().to_ascii_uppercase().as_str() {
            "" | "OFF" => None,
            "TONE" => Some(ToneSquelch::Tone(deci_hz(self.tone_hz)?)),
            "TSQL" => Some(ToneSquelch::Tsql(deci_hz(self.tone_hz)?)),
            "DTCS" => Some(ToneSquelch::Dtcs(
                self.dtcs_code.context("DTCS row without dtcs_code")?,
            )),
            other => bail!("unknown tone mode '{other}'"),
        };

        Ok(ChannelRecord {
            channel_number: self.channel,
            frequency_hz: self.rx_frequency_hz,
            mode,
            filter_width,
            data_mode: self.data_mode.unwrap_or(false),
            duplex_offset_hz: tx - rx,
            tone_squelch,
            scan_select: self.scan_select.unwrap_or(0),
            name: self.name,
        })
    }
}

/// Tone in hertz to tenths of a hertz.
fn deci_hz(tone_hz: Option<f64>) -> Result<u16> {
    let hz = tone_hz.context("tone row without tone_hz")?;
    let deci = (hz * 10.0).round();
    if !(1.0..=f64::from(u16::MAX)).contains(&deci) {
        bail!("tone {hz} Hz out of range");
    }
    Ok(deci as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChannelFile {
        ChannelFile::new(
            "IC-7300",
            vec![
                ChannelRecord::new(2, 29_620_000, ChannelMode::Fm)
                    .with_offset(-100_000)
                    .with_tone(ToneSquelch::Tone(1000)),
                ChannelRecord::new(1, 7_074_000, ChannelMode::Usb).with_name("FT8"),
            ],
        )
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("civmem-test-{}-{name}", std::process::id()))
    }

    #[test]
    fn new_sorts_by_channel() {
        let file = sample();
        assert_eq!(file.channels[0].channel_number, 1);
        assert_eq!(file.channels[1].channel_number, 2);
    }

    #[test]
    fn json_round_trip() {
        let file = sample();
        let text = file.to_json().unwrap();
        assert!(text.contains("\"model\": \"IC-7300\""));
        assert_eq!(ChannelFile::from_json(&text).unwrap(), file);
    }

    #[test]
    fn minimal_entries_use_defaults() {
        let text = r#"{"model":"IC-7610","channels":[
            {"channel_number":5,"frequency_hz":14074000,"mode":"USB"}
        ]}"#;
        let file = ChannelFile::from_json(text).unwrap();
        assert_eq!(
            file.channels,
            vec![ChannelRecord::new(5, 14_074_000, ChannelMode::Usb)]
        );
    }

    #[test]
    fn duplicates_rejected() {
        let text = r#"{"model":"IC-7300","channels":[
            {"channel_number":5,"frequency_hz":14074000,"mode":"USB"},
            {"channel_number":5,"frequency_hz":7074000,"mode":"USB"}
        ]}"#;
        let err = ChannelFile::from_json(text).unwrap_err();
        assert!(err.to_string().contains("channel 5"));
    }

    #[test]
    fn garbage_rejected() {
        assert!(ChannelFile::from_json("{\"model\": 3}").is_err());
        assert!(ChannelFile::from_json("").is_err());
    }

    #[test]
    fn save_and_load() {
        let path = temp_path("save.json");
        let file = sample();
        file.save(&path).unwrap();
        let loaded = ChannelFile::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, file);
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = ChannelFile::load(Path::new("/nonexistent/civmem.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/civmem.json"));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(FileFormat::from_path(Path::new("mem.csv")), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("MEM.CSV")), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("mem.json")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("mem")), FileFormat::Json);
    }

    #[test]
    fn csv_round_trip_keeps_every_field() {
        let mut data = ChannelRecord::new(3, 14_074_000, ChannelMode::Usb).with_name("FT8 20M");
        data.data_mode = true;
        data.filter_width = FilterWidth::Fil2;
        data.scan_select = 2;
        let file = ChannelFile::new(
            "IC-7300",
            vec![
                sample().channels[0].clone(),
                sample().channels[1].clone(),
                data,
                ChannelRecord::new(4, 29_600_000, ChannelMode::Fm).with_tone(ToneSquelch::Tsql(885)),
                ChannelRecord::new(5, 51_000_000, ChannelMode::Fm).with_tone(ToneSquelch::Dtcs(23)),
                ChannelRecord::new(6, 5_000_000, ChannelMode::Unknown(0x17)),
            ],
        );

        let text = file.to_csv().unwrap();
        assert!(text.starts_with("channel,name,rx_frequency_hz,tx_frequency_hz,mode"));
        assert!(text.contains("2,,29620000,29520000,FM,FIL1,false,TONE,100.0,,0"));

        let back = ChannelFile::from_csv(&text).unwrap();
        assert_eq!(back.model, "");
        assert_eq!(back.channels, file.channels);
    }

    #[test]
    fn csv_minimal_columns() {
        let text = "channel,rx_frequency_hz,mode\n7,7074000,usb\n1,3573000,LSB\n";
        let file = ChannelFile::from_csv(text).unwrap();
        assert_eq!(
            file.channels,
            vec![
                ChannelRecord::new(1, 3_573_000, ChannelMode::Lsb),
                ChannelRecord::new(7, 7_074_000, ChannelMode::Usb),
            ]
        );
    }

    #[test]
    fn csv_errors_name_the_line() {
        let text = "channel,rx_frequency_hz,mode\n1,7074000,USB\n2,7075000,DV\n";
        let err = ChannelFile::from_csv(text).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 3"), "{msg}");
        assert!(msg.contains("DV"), "{msg}");

        let text = "channel,rx_frequency_hz,mode,tone_mode\n1,29600000,FM,TSQL\n";
        let err = ChannelFile::from_csv(text).unwrap_err();
        assert!(format!("{err:#}").contains("tone_hz"));

        let text = "channel,rx_frequency_hz,mode\n4,7074000,USB\n4,7075000,USB\n";
        let err = ChannelFile::from_csv(text).unwrap_err();
        assert!(err.to_string().contains("channel 4"));
    }

    #[test]
    fn csv_save_and_load() {
        let path = temp_path("save.csv");
        let file = sample();
        file.save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let loaded = ChannelFile::load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert!(text.starts_with("channel,"));
        assert_eq!(loaded.channels, file.channels);
    }

    #[test]
    fn summary_counts_bands_and_modes() {
        let file = ChannelFile::new(
            "IC-7300",
            vec![
                ChannelRecord::new(1, 7_074_000, ChannelMode::Usb),
                ChannelRecord::new(2, 7_030_000, ChannelMode::Cw),
                ChannelRecord::new(3, 14_074_000, ChannelMode::Usb),
                ChannelRecord::new(4, 5_000_000, ChannelMode::Am),
                ChannelRecord::empty(5),
            ],
        );
        let summary = file.summary(99);
        assert_eq!(summary.capacity, 99);
        assert_eq!(summary.used, 4);
        assert_eq!(summary.free, 95);
        assert_eq!(
            summary.by_band,
            vec![(Band::Band40m, 2), (Band::Band20m, 1)]
        );
        assert_eq!(summary.out_of_band, 1);
        let modes: Vec<(&str, usize)> = summary
            .by_mode
            .iter()
            .map(|(m, n)| (m.as_str(), *n))
            .collect();
        assert_eq!(modes, vec![("AM", 1), ("CW", 1), ("USB", 2)]);
    }
}
