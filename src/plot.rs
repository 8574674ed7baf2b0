//! Interactive price chart as a standalone HTML page.

use std::path::{Path, PathBuf};

use plotly::common::{Font, Line, LineShape, Mode, Title};
use plotly::layout::{Axis, Layout, Legend};
use plotly::{Plot, Scatter};

use crate::error::Result;
use crate::table::{PriceTable, ensure_parent_dir};

pub const DEFAULT_PLOT_FILE: &str = "day_ahead_prices.html";

/// Where the chart goes: next to the CSV output when there is one.
pub fn plot_path(output: Option<&Path>) -> PathBuf {
    match output {
        Some(p) => p.with_extension("html"),
        None => PathBuf::from(DEFAULT_PLOT_FILE),
    }
}

/// Y axis range with a 2 % margin, always including zero.
pub fn y_range(min: f64, max: f64) -> [f64; 2] {
    [0f64.min(min - min.abs() * 0.02), max + max.abs() * 0.02]
}

pub fn figure(table: &PriceTable) -> Plot {
    let x: Vec<String> = table.rows().map(|(ts, _)| table.format_timestamp(ts)).collect();

    let mut plot = Plot::new();
    for (i, zone) in table.zones().iter().enumerate() {
        let y: Vec<Option<f64>> = table.rows().map(|(_, cells)| cells[i]).collect();
        let trace = Scatter::new(x.clone(), y)
            .name(zone.as_str())
            .mode(Mode::Lines)
            .line(Line::new().shape(LineShape::Hv));
        plot.add_trace(trace);
    }

    let mut y_axis = Axis::new().title(Title::with_text(&table.unit().to_string()));
    if let Some((lo, hi)) = table.min_max() {
        y_axis = y_axis.range(y_range(lo, hi).to_vec());
    }

    let layout = Layout::new()
        .title(Title::with_text("Day ahead clearing price"))
        .x_axis(Axis::new().title(Title::with_text("")))
        .y_axis(y_axis)
        .font(Font::new().family("Arial, sans-serif").size(16).color("#4d4d4d"))
        .legend(Legend::new().title(Title::with_text("Bidding Zone")));
    plot.set_layout(layout);
    plot
}

pub fn write_html(table: &PriceTable, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    std::fs::write(path, figure(table).to_html())?;
    tracing::info!(path = %path.display(), "plot written");
    Ok(())
}
