use crate::core::dump::DumpTables;
use crate::core::metrics::distribution::cluster_and_density;
use crate::core::metrics::intensity::cycle_medians;
use crate::core::metrics::qscore::{bin_means, cycle_means, q30_line};
use crate::core::metrics::summary::{SummaryTable, summary_stats};
use crate::core::model::{Lane, PLOT_COLORS, lane_color};
use crate::core::runinfo::RunInfo;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const Q30_COLUMN: &str = "Q30 pct";
pub const Q30_GOOD_THRESHOLD: f64 = 90.0;
const CALLED_BASES: [char; 4] = ['A', 'T', 'G', 'C'];
const Q30_BAND_FILL: &str = "rgba(54, 162, 235, 0.3)";
// Bins 5 through 7 (zero-based 4..7) sit at or above Q30.
const Q30_BINS: std::ops::Range<usize> = 4..7;
const QSCORE_AXIS_MAX: f64 = 45.0;

/// Single-line dashboard table: centred header row, no index column.
pub fn summary_table_html(table: &SummaryTable) -> String {
    render_summary(table, None)
}

/// Like [`summary_table_html`], with the Q30 column coloured green above the
/// threshold and red otherwise.
pub fn summary_table_highlighted(table: &SummaryTable) -> String {
    render_summary(table, Some((Q30_COLUMN, Q30_GOOD_THRESHOLD)))
}

fn render_summary(table: &SummaryTable, highlight: Option<(&str, f64)>) -> String {
    let target = highlight.and_then(|(col, threshold)| table.column(col).map(|i| (i, threshold)));
    let mut out = String::with_capacity(256 + table.rows.len() * 256);
    out.push_str("<table border=\"0\" class=\"dataframe table table-sm table-striped\">");
    out.push_str("  <thead>    <tr style=\"text-align: center;\">");
    for c in &table.columns {
        out.push_str("      <th>");
        out.push_str(&escape_html(c));
        out.push_str("</th>");
    }
    out.push_str("    </tr>  </thead>  <tbody>");
    for row in &table.rows {
        out.push_str("    <tr>");
        for (i, cell) in row.iter().enumerate() {
            match target {
                Some((idx, threshold)) if idx == i => {
                    let good = cell.parse::<f64>().is_ok_and(|v| v > threshold);
                    let color = if good { "green" } else { "red" };
                    out.push_str(&format!("      <td style=\"color:{}\">", color));
                }
                _ => out.push_str("      <td>"),
            }
            out.push_str(&escape_html(cell));
            out.push_str("</td>");
        }
        out.push_str("    </tr>");
    }
    out.push_str("  </tbody></table>");
    out
}

/// Standalone HTML report: highlighted summary table, called-intensity lines
/// per base, cluster and density box plots, the q-score histogram with its
/// Q30 band and one q-score-by-cycle chart per lane.
pub fn write_plot_report(
    path: &Path,
    title: &str,
    dump: &DumpTables,
    run_info: &RunInfo,
) -> Result<()> {
    let table = summary_stats(dump, run_info)?;
    let mut html = String::with_capacity(128 * 1024);
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"en\">")?;
    writeln!(html, "<head>")?;
    writeln!(html, "<meta charset=\"utf-8\"/>")?;
    writeln!(html, "<title>kira-interop report: {}</title>", escape_html(title))?;
    writeln!(html, "<style>")?;
    writeln!(
        html,
        "body{{font-family:Arial,Helvetica,sans-serif;margin:20px;color:#222;background:#fff;}}"
    )?;
    writeln!(html, "h1{{margin:0 0 8px 0;font-size:24px;}}")?;
    writeln!(html, "h2{{margin:24px 0 8px 0;font-size:20px;}}")?;
    writeln!(html, ".meta{{color:#555;font-size:13px;margin-bottom:16px;}}")?;
    writeln!(html, ".module{{border-top:1px solid #eee;padding-top:8px;}}")?;
    writeln!(html, ".plot{{margin:8px 0 6px 0;}}")?;
    writeln!(
        html,
        ".table{{border-collapse:collapse;width:100%;max-width:1000px;font-size:12px;}}"
    )?;
    writeln!(
        html,
        ".table th,.table td{{border:1px solid #ddd;padding:4px 6px;text-align:right;}}"
    )?;
    writeln!(html, ".legend{{font-size:12px;color:#444;margin:2px 0 6px 0;}}")?;
    writeln!(html, "svg{{background:#fafafa;border:1px solid #e5e5e5;}}")?;
    writeln!(html, "</style>")?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;
    writeln!(html, "<h1>kira-interop report</h1>")?;
    writeln!(
        html,
        "<div class=\"meta\">Run: <b>{}</b><br/>Reads: {}<br/>Timestamp: {} (unix: {})</div>",
        escape_html(title),
        run_info.reads.len(),
        fmt_timestamp(ts),
        ts
    )?;

    writeln!(html, "<h2>Summary</h2>")?;
    writeln!(html, "{}", summary_table_highlighted(&table))?;

    module_intensity(&mut html, dump)?;
    module_box_plots(&mut html, dump)?;
    module_qscore_distribution(&mut html, dump)?;
    module_qscore_by_cycle(&mut html, dump)?;

    writeln!(html, "</body></html>")?;

    let mut w = BufWriter::new(
        File::create(path).with_context(|| format!("create {} failed", path.display()))?,
    );
    w.write_all(html.as_bytes())?;
    w.flush()?;
    Ok(())
}

fn module_intensity(out: &mut String, dump: &DumpTables) -> Result<()> {
    let corrected = dump.corrected_int()?;
    writeln!(out, "<div class=\"module\">")?;
    writeln!(out, "<h2>Called intensity</h2>")?;
    for base in CALLED_BASES {
        let column = corrected.column(&format!("CalledIntensity_{}", base))?;
        let medians = cycle_medians(corrected, column)
            .with_context(|| format!("failed to generate intensity plot of base {}", base))?;
        let series: Vec<(Lane, Vec<(f64, f64)>)> = medians
            .iter()
            .map(|(lane, cycles)| {
                let points = cycles.iter().map(|(&c, &v)| (c as f64, v)).collect();
                (*lane, points)
            })
            .collect();
        writeln!(out, "<h3>Intensity plot of base {}</h3>", base)?;
        lane_legend(out, series.iter().map(|(l, _)| *l))?;
        svg_lane_lines(out, &series, 1000.0, 360.0, "Cycles", "Intensity values")?;
    }
    writeln!(out, "</div>")?;
    Ok(())
}

fn module_box_plots(out: &mut String, dump: &DumpTables) -> Result<()> {
    let (clusters, densities) = cluster_and_density(dump.tile()?, &PLOT_COLORS)?;
    writeln!(out, "<div class=\"module\">")?;
    writeln!(out, "<h2>ClusterCount</h2>")?;
    let boxes: Vec<LaneBox> = clusters
        .iter()
        .flat_map(|c| {
            [
                LaneBox::new(format!("Lane {}", c.lane_id), c.color, &c.cluster_count),
                LaneBox::new(format!("Lane {} PF", c.lane_id), c.color, &c.cluster_count_pf),
            ]
        })
        .collect();
    svg_boxplot(out, &boxes, 800.0, 360.0, "Lanes", "Cluster count")?;

    writeln!(out, "<h2>Density</h2>")?;
    let boxes: Vec<LaneBox> = densities
        .iter()
        .flat_map(|d| {
            [
                LaneBox::new(format!("Lane {}", d.lane_id), d.color, &d.density),
                LaneBox::new(format!("Lane {} PF", d.lane_id), d.color, &d.density_pf),
            ]
        })
        .collect();
    svg_boxplot(out, &boxes, 800.0, 360.0, "Lanes", "Density")?;
    writeln!(out, "</div>")?;
    Ok(())
}

fn module_qscore_distribution(out: &mut String, dump: &DumpTables) -> Result<()> {
    let (labels, means) = bin_means(dump.q_by_lane()?)?;
    let band = q30_line(&means) as f64;
    writeln!(out, "<div class=\"module\">")?;
    writeln!(out, "<h2>QScore distribution plot</h2>")?;
    lane_legend(out, means.keys().copied())?;
    svg_grouped_bars(out, &labels, &means, band, 800.0, 360.0, "Bins", "Mean score values")?;
    writeln!(out, "</div>")?;
    Ok(())
}

fn module_qscore_by_cycle(out: &mut String, dump: &DumpTables) -> Result<()> {
    let means = cycle_means(dump.q2030()?)?;
    writeln!(out, "<div class=\"module\">")?;
    for (lane, cycles) in &means {
        writeln!(out, "<h2>QScore distribution bar plot lane {}</h2>", lane)?;
        let data: Vec<(f64, f64)> = cycles.iter().map(|(&c, &v)| (c as f64, v)).collect();
        svg_bars(
            out,
            &data,
            lane_color(&PLOT_COLORS, *lane),
            1000.0,
            300.0,
            QSCORE_AXIS_MAX,
            "Cycles",
            "Mean QScore value",
        )?;
    }
    writeln!(out, "</div>")?;
    Ok(())
}

/// Five-number summary with Tukey whiskers (1.5 IQR, clamped to data).
#[derive(Clone, Debug, PartialEq)]
struct BoxStats {
    min: f64,
    q1: f64,
    median: f64,
    q3: f64,
    max: f64,
}

struct LaneBox {
    label: String,
    color: &'static str,
    stats: Option<BoxStats>,
}

impl LaneBox {
    fn new(label: String, color: &'static str, values: &[f64]) -> Self {
        Self {
            label,
            color,
            stats: box_stats(values),
        }
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn box_stats(values: &[f64]) -> Option<BoxStats> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let q1 = quantile(&v, 0.25);
    let q3 = quantile(&v, 0.75);
    let iqr = q3 - q1;
    let lo_fence = q1 - 1.5 * iqr;
    let hi_fence = q3 + 1.5 * iqr;
    let min = v.iter().copied().find(|&x| x >= lo_fence).unwrap_or(q1);
    let max = v.iter().rev().copied().find(|&x| x <= hi_fence).unwrap_or(q3);
    Some(BoxStats {
        min,
        q1,
        median: quantile(&v, 0.5),
        q3,
        max,
    })
}

fn lane_legend<I: Iterator<Item = Lane>>(out: &mut String, lanes: I) -> Result<()> {
    write!(out, "<div class=\"legend\">")?;
    for lane in lanes {
        write!(
            out,
            "<span style=\"display:inline-block;width:18px;height:4px;background:{};margin:0 6px 2px 10px;vertical-align:middle;\"></span>Lane {}",
            lane_color(&PLOT_COLORS, lane),
            lane
        )?;
    }
    writeln!(out, "</div>")?;
    Ok(())
}

fn svg_open(out: &mut String, w: f64, h: f64) -> Result<(f64, f64, f64, f64)> {
    writeln!(out, "<div class=\"plot\">")?;
    writeln!(
        out,
        "<svg width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\">",
        w, h, w, h
    )?;
    let left = 60.0;
    let right = 20.0;
    let top = 12.0;
    let bottom = 34.0;
    let plot_w = w - left - right;
    let plot_h = h - top - bottom;
    writeln!(
        out,
        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"#fff\" stroke=\"#ddd\"/>",
        left, top, plot_w, plot_h
    )?;
    Ok((left, top, plot_w, plot_h))
}

fn svg_lane_lines(
    out: &mut String,
    series: &[(Lane, Vec<(f64, f64)>)],
    w: f64,
    h: f64,
    x_label: &str,
    y_label: &str,
) -> Result<()> {
    let (left, top, plot_w, plot_h) = svg_open(out, w, h)?;
    let ys = series.iter().flat_map(|(_, d)| d.iter().map(|p| p.1));
    let (min_y, max_y) = auto_range(ys.filter(|v| v.is_finite()), 0.0, f64::MAX);
    let x_min = series
        .iter()
        .filter_map(|(_, d)| d.first().map(|p| p.0))
        .fold(f64::INFINITY, f64::min);
    let x_max = series
        .iter()
        .filter_map(|(_, d)| d.last().map(|p| p.0))
        .fold(f64::NEG_INFINITY, f64::max);
    draw_y_axis_ticks(out, left, top, plot_w, plot_h, min_y, max_y, 5)?;
    if x_min.is_finite() && x_max.is_finite() {
        draw_x_axis_ticks(out, left, top, plot_w, plot_h, x_min, x_max, 6)?;
    }
    draw_axis_labels(out, left, top, plot_w, plot_h, x_label, y_label)?;
    for (lane, data) in series {
        svg_line(
            out,
            data,
            left,
            top,
            plot_w,
            plot_h,
            (x_min, x_max),
            (min_y, max_y),
            lane_color(&PLOT_COLORS, *lane),
        )?;
    }
    writeln!(out, "</svg></div>")?;
    Ok(())
}

fn svg_boxplot(
    out: &mut String,
    boxes: &[LaneBox],
    w: f64,
    h: f64,
    x_label: &str,
    y_label: &str,
) -> Result<()> {
    let (left, top, plot_w, plot_h) = svg_open(out, w, h)?;
    let values = boxes
        .iter()
        .filter_map(|b| b.stats.as_ref())
        .flat_map(|s| [s.min, s.max]);
    let (min_y, max_y) = auto_range(values, 0.0, f64::MAX);
    let y_range = (max_y - min_y).max(1e-6);
    let y_of = |v: f64| top + plot_h - (v - min_y) / y_range * plot_h;
    draw_y_axis_ticks(out, left, top, plot_w, plot_h, min_y, max_y, 5)?;
    draw_axis_labels(out, left, top, plot_w, plot_h, x_label, y_label)?;

    let n = boxes.len().max(1) as f64;
    let x_step = plot_w / n;
    for (i, b) in boxes.iter().enumerate() {
        let x = left + (i as f64 + 0.5) * x_step;
        writeln!(
            out,
            "<text x=\"{}\" y=\"{}\" font-size=\"10\" fill=\"#666\" text-anchor=\"middle\" dominant-baseline=\"hanging\">{}</text>",
            x,
            top + plot_h + 4.0,
            escape_html(&b.label)
        )?;
        let Some(s) = &b.stats else {
            continue;
        };
        let box_w = (x_step * 0.5).max(1.0);
        let box_x = x - box_w / 2.0;
        writeln!(
            out,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" fill-opacity=\"0.6\" stroke=\"#666\"/>",
            box_x,
            y_of(s.q3),
            box_w,
            (y_of(s.q1) - y_of(s.q3)).max(0.0),
            b.color
        )?;
        // Whiskers and median line.
        writeln!(
            out,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#555\" stroke-width=\"1\"/>",
            x,
            y_of(s.max),
            x,
            y_of(s.q3)
        )?;
        writeln!(
            out,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#555\" stroke-width=\"1\"/>",
            x,
            y_of(s.q1),
            x,
            y_of(s.min)
        )?;
        let cap_w = (box_w * 0.6).max(1.0);
        for v in [s.min, s.max] {
            writeln!(
                out,
                "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#555\" stroke-width=\"1\"/>",
                x - cap_w / 2.0,
                y_of(v),
                x + cap_w / 2.0,
                y_of(v)
            )?;
        }
        writeln!(
            out,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#333\" stroke-width=\"1.2\"/>",
            box_x,
            y_of(s.median),
            box_x + box_w,
            y_of(s.median)
        )?;
    }
    writeln!(out, "</svg></div>")?;
    Ok(())
}

/// One bar group per bin, one bar per lane, with the Q30 band drawn behind
/// the Q30 bins up to `band`.
fn svg_grouped_bars(
    out: &mut String,
    labels: &[String],
    means: &BTreeMap<Lane, Vec<f64>>,
    band: f64,
    w: f64,
    h: f64,
    x_label: &str,
    y_label: &str,
) -> Result<()> {
    let (left, top, plot_w, plot_h) = svg_open(out, w, h)?;
    let tallest = means
        .values()
        .flat_map(|v| v.iter().copied())
        .filter(|v| v.is_finite())
        .fold(band, f64::max);
    let max_y = tallest.max(1.0);
    let y_scale = plot_h / max_y;
    let groups = labels.len().max(1) as f64;
    let group_w = plot_w / groups;

    let band_bins = Q30_BINS.start.min(labels.len())..Q30_BINS.end.min(labels.len());
    if !band_bins.is_empty() {
        let band_h = band * y_scale;
        writeln!(
            out,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
            left + band_bins.start as f64 * group_w,
            top + plot_h - band_h,
            band_bins.len() as f64 * group_w,
            band_h,
            Q30_BAND_FILL
        )?;
    }
    draw_y_axis_ticks(out, left, top, plot_w, plot_h, 0.0, max_y, 5)?;
    draw_axis_labels(out, left, top, plot_w, plot_h, x_label, y_label)?;

    let lanes = means.len().max(1) as f64;
    let bar_w = (group_w * 0.8 / lanes).max(1.0);
    for (g, label) in labels.iter().enumerate() {
        let gx = left + g as f64 * group_w + group_w * 0.1;
        for (i, (lane, values)) in means.iter().enumerate() {
            let v = values.get(g).copied().filter(|v| v.is_finite()).unwrap_or(0.0);
            let bh = v * y_scale;
            writeln!(
                out,
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
                gx + i as f64 * bar_w,
                top + plot_h - bh,
                bar_w,
                bh,
                lane_color(&PLOT_COLORS, *lane)
            )?;
        }
        writeln!(
            out,
            "<text x=\"{}\" y=\"{}\" font-size=\"10\" fill=\"#666\" text-anchor=\"middle\" dominant-baseline=\"hanging\">{}</text>",
            left + (g as f64 + 0.5) * group_w,
            top + plot_h + 4.0,
            escape_html(label)
        )?;
    }
    writeln!(out, "</svg></div>")?;
    Ok(())
}

fn svg_bars(
    out: &mut String,
    data: &[(f64, f64)],
    color: &str,
    w: f64,
    h: f64,
    max_y: f64,
    x_label: &str,
    y_label: &str,
) -> Result<()> {
    let (left, top, plot_w, plot_h) = svg_open(out, w, h)?;
    draw_y_axis_ticks(out, left, top, plot_w, plot_h, 0.0, max_y, 5)?;
    let x_min = data.first().map(|d| d.0).unwrap_or(0.0);
    let x_max = data.last().map(|d| d.0).unwrap_or(1.0);
    draw_x_axis_labels_only(out, left, top, plot_w, plot_h, x_min, x_max, 6)?;
    draw_axis_labels(out, left, top, plot_w, plot_h, x_label, y_label)?;
    let bar_w = if data.is_empty() {
        1.0
    } else {
        plot_w / data.len() as f64
    };
    for (i, (_, yv)) in data.iter().enumerate() {
        let v = if yv.is_finite() { yv.clamp(0.0, max_y) } else { 0.0 };
        let bh = v / max_y * plot_h;
        writeln!(
            out,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
            left + i as f64 * bar_w,
            top + plot_h - bh,
            (bar_w * 0.9).max(1.0),
            bh,
            color
        )?;
    }
    writeln!(out, "</svg></div>")?;
    Ok(())
}

fn svg_line(
    out: &mut String,
    data: &[(f64, f64)],
    left: f64,
    top: f64,
    plot_w: f64,
    plot_h: f64,
    (x_min, x_max): (f64, f64),
    (min_y, max_y): (f64, f64),
    color: &str,
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let x_range = (x_max - x_min).max(1.0);
    let y_range = (max_y - min_y).max(1.0);

    let mut path = String::new();
    for (xv, yv) in data.iter().filter(|(_, y)| y.is_finite()) {
        let x = left + (*xv - x_min) / x_range * plot_w;
        let y = top + plot_h - ((*yv - min_y) / y_range * plot_h);
        if path.is_empty() {
            write!(path, "M {} {}", x, y)?;
        } else {
            write!(path, " L {} {}", x, y)?;
        }
    }
    writeln!(
        out,
        "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\"/>",
        path, color
    )?;
    Ok(())
}

fn draw_y_axis_ticks(
    out: &mut String,
    left: f64,
    top: f64,
    plot_w: f64,
    plot_h: f64,
    min_y: f64,
    max_y: f64,
    ticks: usize,
) -> Result<()> {
    if ticks < 2 || (max_y - min_y).abs() < 1e-9 {
        return Ok(());
    }
    let (start, step, count) = nice_ticks(min_y, max_y, ticks);
    for i in 0..count {
        let v = start + step * i as f64;
        if v < min_y - 1e-9 || v > max_y + 1e-9 {
            continue;
        }
        let y = top + plot_h - ((v - min_y) / (max_y - min_y).max(1e-6)) * plot_h;
        writeln!(
            out,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#eee\"/>",
            left,
            y,
            left + plot_w,
            y
        )?;
        writeln!(
            out,
            "<text x=\"{}\" y=\"{}\" font-size=\"10\" fill=\"#666\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>",
            left - 4.0,
            y,
            fmt_tick(v)
        )?;
    }
    Ok(())
}

fn draw_x_axis_ticks(
    out: &mut String,
    left: f64,
    top: f64,
    plot_w: f64,
    plot_h: f64,
    min_x: f64,
    max_x: f64,
    ticks: usize,
) -> Result<()> {
    if ticks < 2 || (max_x - min_x).abs() < 1e-9 {
        return Ok(());
    }
    let (start, step, count) = nice_ticks(min_x, max_x, ticks);
    for i in 0..count {
        let v = start + step * i as f64;
        if v < min_x - 1e-9 || v > max_x + 1e-9 {
            continue;
        }
        let x = left + ((v - min_x) / (max_x - min_x).max(1e-6)) * plot_w;
        writeln!(
            out,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#eee\"/>",
            x,
            top,
            x,
            top + plot_h
        )?;
        writeln!(
            out,
            "<text x=\"{}\" y=\"{}\" font-size=\"10\" fill=\"#666\" text-anchor=\"middle\" dominant-baseline=\"hanging\">{}</text>",
            x,
            top + plot_h + 4.0,
            fmt_tick(v)
        )?;
    }
    Ok(())
}

fn draw_x_axis_labels_only(
    out: &mut String,
    left: f64,
    top: f64,
    plot_w: f64,
    plot_h: f64,
    min_x: f64,
    max_x: f64,
    ticks: usize,
) -> Result<()> {
    if ticks < 2 || (max_x - min_x).abs() < 1e-9 {
        return Ok(());
    }
    let (start, step, count) = nice_ticks(min_x, max_x, ticks);
    for i in 0..count {
        let v = start + step * i as f64;
        if v < min_x - 1e-9 || v > max_x + 1e-9 {
            continue;
        }
        let x = left + ((v - min_x) / (max_x - min_x).max(1e-6)) * plot_w;
        writeln!(
            out,
            "<text x=\"{}\" y=\"{}\" font-size=\"10\" fill=\"#666\" text-anchor=\"middle\" dominant-baseline=\"hanging\">{}</text>",
            x,
            top + plot_h + 4.0,
            fmt_tick(v)
        )?;
    }
    Ok(())
}

fn draw_axis_labels(
    out: &mut String,
    left: f64,
    top: f64,
    plot_w: f64,
    plot_h: f64,
    x_label: &str,
    y_label: &str,
) -> Result<()> {
    let x = left + plot_w / 2.0;
    let y = top + plot_h + 22.0;
    writeln!(
        out,
        "<text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"#444\" text-anchor=\"middle\">{}</text>",
        x, y, x_label
    )?;
    let yx = left - 44.0;
    let yy = top + plot_h / 2.0;
    writeln!(
        out,
        "<text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"#444\" text-anchor=\"middle\" transform=\"rotate(-90 {} {})\">{}</text>",
        yx, yy, yx, yy, y_label
    )?;
    Ok(())
}

fn fmt_tick(v: f64) -> String {
    if (v - v.round()).abs() < 0.001 {
        format!("{}", v.round() as i64)
    } else if v.abs() < 10.0 {
        format!("{:.2}", v)
    } else {
        format!("{:.1}", v)
    }
}

fn fmt_timestamp(ts: u64) -> String {
    let days = (ts / 86_400) as i64;
    let secs = (ts % 86_400) as u32;
    let hour = secs / 3_600;
    let min = (secs % 3_600) / 60;
    let sec = secs % 60;

    // Civil date from days since 1970-01-01 (proleptic Gregorian).
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = mp + if mp < 10 { 3 } else { -9 };
    let year = y + if m <= 2 { 1 } else { 0 };

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        year, m, d, hour, min, sec
    )
}

fn nice_ticks(min: f64, max: f64, ticks: usize) -> (f64, f64, usize) {
    let range = (max - min).abs().max(1e-9);
    let rough = range / (ticks as f64 - 1.0);
    let mag = 10f64.powf(rough.abs().log10().floor());
    let norm = rough / mag;
    let step = if norm <= 1.0 {
        1.0
    } else if norm <= 2.0 {
        2.0
    } else if norm <= 5.0 {
        5.0
    } else {
        10.0
    } * mag;
    let start = (min / step).floor() * step;
    let end = (max / step).ceil() * step;
    let count = ((end - start) / step).round() as usize + 1;
    (start, step, count)
}

fn auto_range<I: Iterator<Item = f64>>(values: I, min_bound: f64, max_bound: f64) -> (f64, f64) {
    let mut min_v = f64::INFINITY;
    let mut max_v = f64::NEG_INFINITY;
    for v in values {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    if !min_v.is_finite() || !max_v.is_finite() {
        return (0.0, 1.0);
    }
    let span = (max_v - min_v).max(1e-6);
    let pad = (span * 0.1).max(1.0);
    let y_min = (min_v - pad).max(min_bound);
    let y_max = (max_v + pad).min(max_bound);
    if (y_max - y_min) < 1e-6 {
        (min_bound, min_bound + 1.0)
    } else {
        (y_min, y_max)
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
