use std::time::Duration;

/// Render one telemetry series as a summary line.
pub fn format_series(label: &str, series: &[Duration]) -> String {
    if series.is_empty() {
        return format!("{label}: no samples");
    }

    let total: Duration = series.iter().sum();
    let mean = total / series.len() as u32;
    let max = series.iter().max().copied().unwrap_or_default();
    format!(
        "{label}: n={} mean={}ms max={}ms",
        series.len(),
        mean.as_millis(),
        max.as_millis()
    )
}
