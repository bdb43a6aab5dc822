//! Static SVG bar charts.

use super::Report;

const PALETTE: [&str; 9] = [
    "#5470c6", "#91cc75", "#fac858", "#ee6666", "#73c0de", "#3ba272", "#fc8452", "#9a60b4",
    "#ea7ccc",
];

const FONT_SIZE: f64 = 12.0;
const LINE_HEIGHT: f64 = 14.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 70.0;
const TICKS: f64 = 5.0;

/// Chart dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 600,
            height: 400,
        }
    }
}

struct Series<'r> {
    name: &'r str,
    values: Vec<Option<i64>>,
}

pub(super) fn render(report: &Report<'_>, options: &ChartOptions) -> String {
    let data = report.data();

    // The first column labels the categories; every other column is a series.
    let categories: Vec<String> = data
        .iter()
        .map(|row| row.first().map(ToString::to_string).unwrap_or_default())
        .collect();
    let series: Vec<Series<'_>> = report
        .columns()
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, column)| Series {
            name: column.name(),
            values: data.iter().map(|row| row.get(i).and_then(|c| c.value())).collect(),
        })
        .collect();

    let width = f64::from(options.width);
    let height = f64::from(options.height);
    let label_lines = categories
        .iter()
        .map(|c| c.split_whitespace().count().max(1))
        .max()
        .unwrap_or(1);
    let margin_bottom = 20.0 + label_lines as f64 * LINE_HEIGHT;

    let left = MARGIN_LEFT;
    let right = (width - MARGIN_RIGHT).max(left + 1.0);
    let top = MARGIN_TOP;
    let bottom = (height - margin_bottom).max(top + 1.0);

    let max = series
        .iter()
        .flat_map(|s| s.values.iter().flatten())
        .copied()
        .max()
        .unwrap_or(0);
    let (axis_max, step) = axis_scale(max as f64);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = options.width,
        h = options.height
    );
    svg.push('\n');

    svg.push_str(&format!(
        r##"<text x="{:.1}" y="24" text-anchor="middle" font-size="18" font-weight="bold" fill="#464646">{}</text>"##,
        width / 2.0,
        escape(report.title())
    ));
    svg.push('\n');

    push_legend(&mut svg, &series, width);

    // Gridlines and y-axis labels.
    let plot_height = bottom - top;
    let mut tick = 0.0;
    while tick <= axis_max + step / 2.0 {
        let y = bottom - tick / axis_max * plot_height;
        svg.push_str(&format!(
            r##"<line x1="{left:.1}" y1="{y:.1}" x2="{right:.1}" y2="{y:.1}" stroke="#e0e6f1"/>"##
        ));
        svg.push_str(&format!(
            r##"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="{FONT_SIZE}" fill="#6e7079">{}</text>"##,
            left - 8.0,
            y + 4.0,
            format_tick(tick)
        ));
        svg.push('\n');
        tick += step;
    }
    svg.push_str(&format!(
        r##"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="{FONT_SIZE}" fill="#6e7079">µs</text>"##,
        left - 48.0,
        (top + bottom) / 2.0
    ));
    svg.push('\n');

    // Bars.
    let band = (right - left) / categories.len().max(1) as f64;
    let group = band * 0.8;
    let count = series.len().max(1) as f64;
    let bar = group / (count + (count - 1.0) * 0.3);
    for (ci, category) in categories.iter().enumerate() {
        let start = left + band * ci as f64 + (band - group) / 2.0;
        for (si, s) in series.iter().enumerate() {
            let Some(value) = s.values[ci] else {
                continue;
            };
            let h = value.max(0) as f64 / axis_max * plot_height;
            svg.push_str(&format!(
                r#"<rect class="bar" x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"><title>{}: {} µs</title></rect>"#,
                start + si as f64 * bar * 1.3,
                bottom - h,
                bar,
                h,
                PALETTE[si % PALETTE.len()],
                escape(category),
                value
            ));
            svg.push('\n');
        }

        let center = left + band * (ci as f64 + 0.5);
        svg.push_str(&format!(
            r##"<text x="{center:.1}" y="{:.1}" text-anchor="middle" font-size="{FONT_SIZE}" fill="#6e7079">"##,
            bottom + 16.0
        ));
        for (li, word) in category.split_whitespace().enumerate() {
            let dy = if li == 0 { 0.0 } else { LINE_HEIGHT };
            svg.push_str(&format!(
                r#"<tspan x="{center:.1}" dy="{dy}">{}</tspan>"#,
                escape(word)
            ));
        }
        svg.push_str("</text>\n");
    }

    svg.push_str(&format!(
        r##"<line x1="{left:.1}" y1="{bottom:.1}" x2="{right:.1}" y2="{bottom:.1}" stroke="#6e7079"/>"##
    ));
    svg.push_str("\n</svg>\n");
    svg
}

fn push_legend(svg: &mut String, series: &[Series<'_>], width: f64) {
    const SWATCH: f64 = 25.0;
    const GAP: f64 = 10.0;

    // Approximate text width; exact metrics are not available without a font.
    let item_width =
        |s: &Series<'_>| SWATCH + 5.0 + s.name.chars().count() as f64 * FONT_SIZE * 0.6;
    let total: f64 = series.iter().map(item_width).sum::<f64>()
        + GAP * series.len().saturating_sub(1) as f64;

    let mut x = (width - total) / 2.0;
    for (i, s) in series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        svg.push_str(&format!(
            r#"<rect x="{x:.1}" y="32" width="{SWATCH}" height="14" rx="3" fill="{color}"/>"#
        ));
        svg.push_str(&format!(
            r##"<text x="{:.1}" y="44" font-size="{FONT_SIZE}" fill="#333">{}</text>"##,
            x + SWATCH + 5.0,
            escape(s.name)
        ));
        svg.push('\n');
        x += item_width(s) + GAP;
    }
}

/// Axis maximum and tick step for data peaking at `max`: a step of 1, 2 or
/// 5 times a power of ten giving at most five intervals.
fn axis_scale(max: f64) -> (f64, f64) {
    if max <= 0.0 {
        return (TICKS, 1.0);
    }
    let raw = max / TICKS;
    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    let step = match raw / magnitude {
        f if f <= 1.0 => magnitude,
        f if f <= 2.0 => 2.0 * magnitude,
        f if f <= 5.0 => 5.0 * magnitude,
        _ => 10.0 * magnitude,
    };
    ((max / step).ceil() * step, step)
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
