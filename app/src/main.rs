// civmem -- read, write and clear Icom memory channels over CI-V.
//
// Usage:
//   civmem --port /dev/ttyUSB0 download --start 1 --end 99 --output ic7300.json
//   civmem --port /dev/ttyUSB0 upload ic7300.json
//   civmem --port /dev/ttyUSB0 upload ic7300.json --channel 12
//   civmem --model IC-7610 --port /dev/ttyUSB1 --address 0x98 clear --start 90 --end 99
//   civmem --port /dev/ttyUSB0 download --output ic7300.csv
//   civmem --port /dev/ttyUSB0 set 5 14.074 --mode USB --name "FT8 20M"
//   civmem show ic7300.json --band 10m --mode FM
//   civmem summary ic7300.json
//   civmem models

mod channel_file;
mod logging;

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use civmem_core::{
    Band, ChannelMode, ChannelRecord, FilterWidth, format_freq_mhz, format_offset_khz,
};
use civmem_icom::models::all_models;
use civmem_icom::{
    ChannelSession, ChannelStatus, IcomModel, SessionBuilder, SessionEvent, SessionReport,
    model_by_name,
};

use channel_file::{ChannelFile, Summary};
use logging::{LogFormat, LogLevel, init_logging};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// civmem -- Icom memory channel manager.
#[derive(Parser, Debug)]
#[command(name = "civmem", version, about)]
struct Cli {
    /// Radio model (e.g. IC-7300, IC-7300MK2, IC-7610).
    #[arg(long, global = true, default_value = "IC-7300")]
    model: String,

    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, global = true)]
    port: Option<String>,

    /// Override the model's default baud rate.
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Override the default CI-V address (hex, e.g. 0x94).
    #[arg(long, global = true, value_parser = parse_hex_u8)]
    address: Option<u8>,

    /// Time to wait for each reply, in milliseconds.
    #[arg(long, global = true, default_value_t = 500)]
    timeout_ms: u64,

    /// Attempts per channel, first one included.
    #[arg(long, global = true, default_value_t = 3)]
    retries: u32,

    /// Do not strip our own frames echoed by the interface.
    #[arg(long, global = true)]
    no_echo_filter: bool,

    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

/// Parse a hex string like "0x94" or "94" into a u8.
fn parse_hex_u8(s: &str) -> std::result::Result<u8, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(s, 16).map_err(|e| format!("invalid hex byte: {e}"))
}

/// Parse a frequency in MHz like "14.074" or "7" into exact hertz.
fn parse_mhz(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits(whole) || !digits(frac) {
        return Err(format!("invalid frequency '{s}' (expected MHz, e.g. 14.074)"));
    }
    if frac.len() > 6 {
        return Err(format!("'{s}' is finer than 1 Hz"));
    }
    let mhz: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|e| format!("invalid frequency '{s}': {e}"))?
    };
    let frac_hz: u64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<6}")
            .parse()
            .map_err(|e| format!("invalid frequency '{s}': {e}"))?
    };
    mhz.checked_mul(1_000_000)
        .and_then(|hz| hz.checked_add(frac_hz))
        .ok_or_else(|| format!("frequency '{s}' is too large"))
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a range of channels from the radio into a file (.csv for CSV,
    /// anything else JSON).
    Download {
        #[arg(long, default_value_t = 1)]
        start: u16,
        /// Last channel (default: the model's highest).
        #[arg(long)]
        end: Option<u16>,
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Write the channels in a JSON or CSV file to the radio.
    Upload {
        file: PathBuf,
        /// Only write this channel.
        #[arg(long)]
        channel: Option<u16>,
    },

    /// Clear a range of channels.
    Clear {
        #[arg(long)]
        start: u16,
        #[arg(long)]
        end: u16,
    },

    /// Program one channel on the radio.
    Set {
        channel: u16,
        /// Frequency in MHz (e.g. 14.074).
        #[arg(value_parser = parse_mhz)]
        frequency: u64,
        #[arg(long, short, default_value = "USB")]
        mode: ChannelMode,
        #[arg(long, short, default_value = "")]
        name: String,
        #[arg(long, default_value = "FIL1")]
        filter: FilterWidth,
    },

    /// Print the channels in a JSON or CSV file.
    Show {
        file: PathBuf,
        /// Only show channels in this band (e.g. 20m, 6m).
        #[arg(long)]
        band: Option<Band>,
        /// Only show channels in this mode (e.g. USB, FM, CW-R).
        #[arg(long)]
        mode: Option<ChannelMode>,
    },

    /// Count used and free channels in a file, by band and by mode.
    Summary { file: PathBuf },

    /// List supported radio models.
    Models,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    match &cli.command {
        Command::Models => {
            print_models();
            Ok(())
        }
        Command::Show { file, band, mode } => {
            let file = ChannelFile::load(file)?;
            print_channels(&file, *band, *mode);
            Ok(())
        }
        Command::Summary { file } => {
            let loaded = ChannelFile::load(file)?;
            // CSV files do not record a model.
            let model_name = if loaded.model.is_empty() {
                cli.model.as_str()
            } else {
                loaded.model.as_str()
            };
            let model = resolve_model(model_name)?;
            print!(
                "{}",
                format_summary(model.name, &loaded.summary(model.memory_channels))
            );
            Ok(())
        }
        Command::Download { start, end, output } => {
            let model = resolve_model(&cli.model)?;
            let end = end.unwrap_or(model.memory_channels);
            let mut session = open_session(&cli, model).await?;
            let report = run_with_progress(&mut session, Operation::Download(*start..=end))
                .await
                .context("download failed")?;

            let channels: Vec<ChannelRecord> = report.records().cloned().collect();
            let file = ChannelFile::new(session.model().name, channels);
            file.save(output)?;
            println!(
                "saved {} programmed channels to {}",
                file.channels.len(),
                output.display()
            );
            finish(&mut session, &report).await
        }
        Command::Upload { file, channel } => {
            let model = resolve_model(&cli.model)?;
            let loaded = ChannelFile::load(file)?;
            if !loaded.model.is_empty() && loaded.model != model.name {
                tracing::warn!(
                    file_model = %loaded.model,
                    radio_model = model.name,
                    "channel file was made for a different model"
                );
            }
            let records: Vec<ChannelRecord> = match channel {
                Some(n) => {
                    let Some(record) = loaded.channels.iter().find(|c| c.channel_number == *n)
                    else {
                        bail!("channel {n} is not in {}", file.display());
                    };
                    vec![record.clone()]
                }
                None => loaded.channels,
            };

            let mut session = open_session(&cli, model).await?;
            let report = run_with_progress(&mut session, Operation::Upload(records))
                .await
                .context("upload failed")?;
            finish(&mut session, &report).await
        }
        Command::Set {
            channel,
            frequency,
            mode,
            name,
            filter,
        } => {
            let model = resolve_model(&cli.model)?;
            let mut record = ChannelRecord::new(*channel, *frequency, *mode).with_name(name);
            record.filter_width = *filter;

            let mut session = open_session(&cli, model).await?;
            let report = run_with_progress(&mut session, Operation::Upload(vec![record]))
                .await
                .context("set failed")?;
            finish(&mut session, &report).await
        }
        Command::Clear { start, end } => {
            let model = resolve_model(&cli.model)?;
            let mut session = open_session(&cli, model).await?;
            let report = run_with_progress(&mut session, Operation::Clear(*start..=*end))
                .await
                .context("clear failed")?;
            finish(&mut session, &report).await
        }
    }
}

// ---------------------------------------------------------------------------
// Session helpers
// ---------------------------------------------------------------------------

fn resolve_model(name: &str) -> Result<IcomModel> {
    model_by_name(name).with_context(|| {
        let known: Vec<&str> = all_models().iter().map(|m| m.name).collect();
        format!("unknown model '{name}' (supported: {})", known.join(", "))
    })
}

async fn open_session(cli: &Cli, model: IcomModel) -> Result<ChannelSession> {
    let port = cli
        .port
        .as_deref()
        .context("--port is required for this command")?;

    let mut builder = SessionBuilder::new(model)
        .serial_port(port)
        .command_timeout(Duration::from_millis(cli.timeout_ms))
        .retry_budget(cli.retries)
        .echo_filter(!cli.no_echo_filter);
    if let Some(baud) = cli.baud {
        builder = builder.baud_rate(baud);
    }
    if let Some(addr) = cli.address {
        builder = builder.civ_address(addr);
    }

    builder
        .build()
        .await
        .with_context(|| format!("failed to open {port}"))
}

enum Operation {
    Download(RangeInclusive<u16>),
    Upload(Vec<ChannelRecord>),
    Clear(RangeInclusive<u16>),
}

/// Run a session operation with progress on stderr and Ctrl-C cancellation.
async fn run_with_progress(session: &mut ChannelSession, op: Operation) -> Result<SessionReport> {
    let progress = spawn_progress(session);

    let token = session.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling after the current channel...");
            token.cancel();
        }
    });

    let result = match op {
        Operation::Download(range) => session.download(range).await,
        Operation::Upload(records) => session.upload(&records).await,
        Operation::Clear(range) => session.clear(range).await,
    };
    ctrl_c.abort();
    match result {
        Ok(report) => {
            await_progress(progress).await;
            Ok(report)
        }
        Err(e) => {
            progress.abort();
            Err(e.into())
        }
    }
}

/// Wait for the progress printer, returning `false` if it panicked.
async fn await_progress(progress: JoinHandle<()>) -> bool {
    match progress.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "progress printer failed");
            false
        }
    }
}

fn spawn_progress(session: &ChannelSession) -> JoinHandle<()> {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::ChannelCompleted {
                    index,
                    total,
                    outcome,
                }) => {
                    eprintln!(
                        "[{:>3}/{total}] channel {:>3}: {}",
                        index + 1,
                        outcome.channel_number,
                        describe(&outcome.status)
                    );
                }
                Ok(SessionEvent::Finished { .. }) | Err(RecvError::Closed) => break,
                Ok(SessionEvent::Started { .. }) => {}
                Err(RecvError::Lagged(n)) => eprintln!("({n} progress lines skipped)"),
            }
        }
    })
}

async fn finish(session: &mut ChannelSession, report: &SessionReport) -> Result<()> {
    session.close().await.context("failed to close port")?;

    println!(
        "{} succeeded, {} failed{}",
        report.succeeded(),
        report.failed(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for outcome in report.failures() {
        println!(
            "  channel {:>3}: {}",
            outcome.channel_number,
            describe(&outcome.status)
        );
    }
    if report.failed() > 0 {
        bail!("{} channels failed", report.failed());
    }
    Ok(())
}

fn describe(status: &ChannelStatus) -> String {
    match status {
        ChannelStatus::Read(record) => format!(
            "{} {}",
            format_freq_mhz(record.frequency_hz),
            record.mode
        ),
        ChannelStatus::Empty => "empty".to_string(),
        ChannelStatus::Written => "written".to_string(),
        ChannelStatus::Rejected { detail } if detail.is_empty() => "rejected by radio".to_string(),
        ChannelStatus::Rejected { detail } => format!("rejected by radio ({detail:02X?})"),
        ChannelStatus::ExhaustedRetries {
            attempts,
            last_bytes,
        } => format!(
            "no reply after {attempts} attempts (last received {} bytes)",
            last_bytes.len()
        ),
        ChannelStatus::FieldError(e) => e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_models() {
    println!(
        "{:<12} {:>6} {:>8} {:>8}  Range",
        "Model", "CI-V", "Baud", "Channels"
    );
    for model in all_models() {
        println!(
            "{:<12} {:>6} {:>8} {:>8}  {} - {}",
            model.name,
            format!("0x{:02X}", model.default_civ_address),
            model.default_baud_rate,
            model.memory_channels,
            format_freq_mhz(model.frequency_range.low_hz),
            format_freq_mhz(model.frequency_range.high_hz),
        );
    }
}

fn format_summary(model_name: &str, summary: &Summary) -> String {
    let mut out = format!("{model_name} memory summary\n");
    out += &format!("Total channels: {:>4}\n", summary.capacity);
    out += &format!("Used channels:  {:>4}\n", summary.used);
    out += &format!("Free channels:  {:>4}\n", summary.free);

    if !summary.by_band.is_empty() || summary.out_of_band > 0 {
        out += "\nChannels by band:\n";
        for (band, count) in &summary.by_band {
            out += &format!("  {:<6} {count}\n", band.name());
        }
        if summary.out_of_band > 0 {
            out += &format!("  {:<6} {}\n", "other", summary.out_of_band);
        }
    }
    if !summary.by_mode.is_empty() {
        out += "\nChannels by mode:\n";
        for (mode, count) in &summary.by_mode {
            out += &format!("  {mode:<6} {count}\n");
        }
    }
    out
}

fn shown(record: &ChannelRecord, band: Option<Band>, mode: Option<ChannelMode>) -> bool {
    band.is_none_or(|b| b.freq_range().contains(record.frequency_hz))
        && mode.is_none_or(|m| m == record.mode)
}

fn print_channels(file: &ChannelFile, band: Option<Band>, mode: Option<ChannelMode>) {
    println!("{} channels for {}", file.channels.len(), file.model);
    println!(
        "{:>3}  {:<16} {:<7} {:<4} {:<12} {:<10} Name",
        "Ch", "Frequency", "Mode", "Fil", "Duplex", "Tone"
    );
    for record in file
        .channels
        .iter()
        .filter(|r| shown(r, band, mode))
    {
        let mode = if record.data_mode {
            format!("{}-D", record.mode)
        } else {
            record.mode.to_string()
        };
        let tone = record
            .tone_squelch
            .map(|t| t.to_string())
            .unwrap_or_default();
        println!(
            "{:>3}  {:<16} {:<7} {:<4} {:<12} {:<10} {}",
            record.channel_number,
            format_freq_mhz(record.frequency_hz),
            mode,
            record.filter_width,
            format_offset_khz(record.duplex_offset_hz),
            tone,
            record.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_hex_addresses() {
        assert_eq!(parse_hex_u8("0x94"), Ok(0x94));
        assert_eq!(parse_hex_u8("A6"), Ok(0xA6));
        assert_eq!(parse_hex_u8("0X98"), Ok(0x98));
        assert!(parse_hex_u8("0x194").is_err());
        assert!(parse_hex_u8("zz").is_err());
    }

    #[test]
    fn download_defaults() {
        let cli = Cli::try_parse_from([
            "civmem", "--port", "/dev/ttyUSB0", "download", "--output", "out.json",
        ])
        .unwrap();
        assert_eq!(cli.model, "IC-7300");
        assert_eq!(cli.timeout_ms, 500);
        assert_eq!(cli.retries, 3);
        assert!(!cli.no_echo_filter);
        assert_eq!(cli.log_level, LogLevel::Warn);
        match cli.command {
            Command::Download { start, end, output } => {
                assert_eq!(start, 1);
                assert_eq!(end, None);
                assert_eq!(output, PathBuf::from("out.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "civmem",
            "upload",
            "mem.json",
            "--channel",
            "12",
            "--model",
            "ic7610",
            "--address",
            "0x98",
            "--no-echo-filter",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.model, "ic7610");
        assert_eq!(cli.address, Some(0x98));
        assert!(cli.no_echo_filter);
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert!(matches!(
            cli.command,
            Command::Upload {
                channel: Some(12),
                ..
            }
        ));
    }

    #[test]
    fn show_parses_band() {
        let cli = Cli::try_parse_from(["civmem", "show", "mem.json", "--band", "10m"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Show {
                band: Some(Band::Band10m),
                ..
            }
        ));
        assert!(Cli::try_parse_from(["civmem", "show", "mem.json", "--band", "11m"]).is_err());
    }

    #[test]
    fn show_parses_mode() {
        let cli =
            Cli::try_parse_from(["civmem", "show", "mem.csv", "--mode", "cw-r"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Show {
                band: None,
                mode: Some(ChannelMode::CwR),
                ..
            }
        ));
        assert!(Cli::try_parse_from(["civmem", "show", "mem.csv", "--mode", "DV"]).is_err());
    }

    #[test]
    fn show_filters_by_band_and_mode() {
        let usb_20m = ChannelRecord::new(1, 14_074_000, ChannelMode::Usb);
        let cw_20m = ChannelRecord::new(2, 14_030_000, ChannelMode::Cw);
        let usb_40m = ChannelRecord::new(3, 7_074_000, ChannelMode::Usb);

        assert!(shown(&usb_20m, None, None));
        assert!(shown(&usb_20m, Some(Band::Band20m), Some(ChannelMode::Usb)));
        assert!(!shown(&cw_20m, Some(Band::Band20m), Some(ChannelMode::Usb)));
        assert!(!shown(&usb_40m, Some(Band::Band20m), Some(ChannelMode::Usb)));
        assert!(shown(&usb_40m, None, Some(ChannelMode::Usb)));
    }

    #[test]
    fn set_parses_channel() {
        let cli = Cli::try_parse_from([
            "civmem", "--port", "COM3", "set", "5", "14.074", "-m", "cw", "-n", "CW 20M",
            "--filter", "FIL2",
        ])
        .unwrap();
        match cli.command {
            Command::Set {
                channel,
                frequency,
                mode,
                name,
                filter,
            } => {
                assert_eq!(channel, 5);
                assert_eq!(frequency, 14_074_000);
                assert_eq!(mode, ChannelMode::Cw);
                assert_eq!(name, "CW 20M");
                assert_eq!(filter, FilterWidth::Fil2);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["civmem", "set", "1", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Set {
                frequency: 7_000_000,
                mode: ChannelMode::Usb,
                filter: FilterWidth::Fil1,
                ..
            }
        ));
        assert!(Cli::try_parse_from(["civmem", "set", "1", "14,074"]).is_err());
    }

    #[test]
    fn parse_mhz_is_exact() {
        assert_eq!(parse_mhz("14.074"), Ok(14_074_000));
        assert_eq!(parse_mhz("29.62"), Ok(29_620_000));
        assert_eq!(parse_mhz("7"), Ok(7_000_000));
        assert_eq!(parse_mhz(".5"), Ok(500_000));
        assert_eq!(parse_mhz("145.000001"), Ok(145_000_001));
        assert!(parse_mhz("14.0740001").is_err());
        assert!(parse_mhz("-7").is_err());
        assert!(parse_mhz("+7").is_err());
        assert!(parse_mhz(".").is_err());
        assert!(parse_mhz("").is_err());
    }

    #[test]
    fn summary_output() {
        let file = ChannelFile::new(
            "IC-7300",
            vec![
                ChannelRecord::new(1, 7_074_000, ChannelMode::Usb),
                ChannelRecord::new(2, 14_074_000, ChannelMode::Usb),
                ChannelRecord::new(3, 5_000_000, ChannelMode::Am),
            ],
        );
        let text = format_summary("IC-7300", &file.summary(99));
        assert!(text.starts_with("IC-7300 memory summary\n"));
        assert!(text.contains("Used channels:     3"));
        assert!(text.contains("Free channels:    96"));
        assert!(text.contains("  40m    1\n"));
        assert!(text.contains("  20m    1\n"));
        assert!(text.contains("  other  1\n"));
        assert!(text.contains("  USB    2\n"));

        let empty = format_summary("IC-7610", &ChannelFile::new("IC-7610", vec![]).summary(101));
        assert!(!empty.contains("by band"));
        assert!(!empty.contains("by mode"));
    }

    #[tokio::test]
    async fn progress_panic_is_reported() {
        assert!(await_progress(tokio::spawn(async {})).await);
        let failing = tokio::spawn(async { panic!("printer blew up") });
        assert!(!await_progress(failing).await);
    }

    #[test]
    fn clear_requires_range() {
        assert!(Cli::try_parse_from(["civmem", "clear", "--start", "1"]).is_err());
    }

    #[test]
    fn resolve_model_lists_supported_on_error() {
        assert_eq!(resolve_model("7300").unwrap().name, "IC-7300");
        let err = resolve_model("FT-991").unwrap_err();
        assert!(err.to_string().contains("IC-7610"));
    }

    #[test]
    fn describe_statuses() {
        assert_eq!(describe(&ChannelStatus::Empty), "empty");
        assert_eq!(
            describe(&ChannelStatus::Rejected { detail: vec![] }),
            "rejected by radio"
        );
        assert_eq!(
            describe(&ChannelStatus::ExhaustedRetries {
                attempts: 3,
                last_bytes: vec![0xFE, 0xFE]
            }),
            "no reply after 3 attempts (last received 2 bytes)"
        );
    }
}
