//! Prometheus text exposition of a cluster scrape.

use nutanix_core::Sample;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::exporter::ClusterScrape;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const SUCCESS_METRIC: &str = "nutanix_exporter_collector_success";
const DURATION_METRIC: &str = "nutanix_exporter_collector_duration_seconds";
const SERIES_METRIC: &str = "nutanix_exporter_collector_series";

/// Escapes a label value: backslash, double quote and newline.
pub fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Escapes HELP text: backslash and newline.
pub fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn write_header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, escape_help(help));
    let _ = writeln!(out, "# TYPE {} gauge", name);
}

fn write_sample(out: &mut String, name: &str, labels: &[(&str, &str)], value: f64) {
    out.push_str(name);
    if !labels.is_empty() {
        out.push('{');
        for (i, (label, v)) in labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}=\"{}\"", label, escape_label_value(v));
        }
        out.push('}');
    }
    let _ = writeln!(out, " {}", value);
}

/// Renders every declared series of every collector and the samples of the
/// current scrape, followed by the exporter's own gauges.
///
/// A collector whose scrape failed keeps its HELP/TYPE lines but has no
/// samples.
pub fn render(scrape: &ClusterScrape) -> String {
    let mut out = String::new();

    for outcome in &scrape.outcomes {
        let mut by_series: BTreeMap<&str, Vec<&Sample>> = BTreeMap::new();
        if let Ok(report) = &outcome.result {
            for sample in &report.samples {
                by_series
                    .entry(sample.series.key().as_str())
                    .or_default()
                    .push(sample);
            }
        }

        for def in &outcome.series {
            write_header(&mut out, def.name(), def.help());
            let Some(samples) = by_series.get(def.key().as_str()) else {
                continue;
            };
            for sample in samples {
                let labels: Vec<(&str, &str)> = def
                    .label_names()
                    .iter()
                    .map(String::as_str)
                    .zip(sample.label_values.iter().map(String::as_str))
                    .collect();
                write_sample(&mut out, def.name(), &labels, sample.value);
            }
        }
    }

    write_header(
        &mut out,
        SUCCESS_METRIC,
        "Whether the last scrape of the collector succeeded (1) or failed (0)",
    );
    for outcome in &scrape.outcomes {
        let value = if outcome.success() { 1.0 } else { 0.0 };
        write_sample(&mut out, SUCCESS_METRIC, &[("collector", outcome.collector)], value);
    }

    write_header(&mut out, DURATION_METRIC, "Duration of the last scrape of the collector");
    for outcome in &scrape.outcomes {
        write_sample(
            &mut out,
            DURATION_METRIC,
            &[("collector", outcome.collector)],
            outcome.duration.as_secs_f64(),
        );
    }

    write_header(&mut out, SERIES_METRIC, "Number of series declared by the collector");
    for outcome in &scrape.outcomes {
        write_sample(
            &mut out,
            SERIES_METRIC,
            &[("collector", outcome.collector)],
            outcome.series.len() as f64,
        );
    }

    out
}
