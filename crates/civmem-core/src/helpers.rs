//! Formatting helpers for channel listings.

/// Format a frequency in hertz as a human-readable MHz string.
///
/// Returns a string like `"14.074000 MHz"` with six decimal places, which is
/// the resolution a memory channel stores.
///
/// # Example
///
/// ```
/// use civmem_core::format_freq_mhz;
///
/// assert_eq!(format_freq_mhz(14_074_000), "14.074000 MHz");
/// assert_eq!(format_freq_mhz(50_313_000), "50.313000 MHz");
/// ```
pub fn format_freq_mhz(freq_hz: u64) -> String {
    let mhz = freq_hz as f64 / 1_000_000.0;
    format!("{mhz:.6} MHz")
}

/// Format a signed duplex offset in hertz as kHz with an explicit sign.
///
/// Simplex (zero offset) is shown as `"simplex"`.
///
/// ```
/// use civmem_core::format_offset_khz;
///
/// assert_eq!(format_offset_khz(-100_000), "-100.0 kHz");
/// assert_eq!(format_offset_khz(600_000), "+600.0 kHz");
/// assert_eq!(format_offset_khz(0), "simplex");
/// ```
pub fn format_offset_khz(offset_hz: i64) -> String {
    if offset_hz == 0 {
        return "simplex".to_string();
    }
    let khz = offset_hz as f64 / 1_000.0;
    format!("{khz:+.1} kHz")
}
