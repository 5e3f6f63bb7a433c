//! Chart rendering: converts chart specs to Chart.js configs and HTML pages.

use super::chart::{ChartSpec, ChartType, SeriesData};
use crate::error::Result;

const CHART_JS_CDN: &str = "https://cdn.jsdelivr.net/npm/chart.js@4";

/// Render a ChartSpec to a Chart.js configuration JSON string.
pub fn render_chart_config(spec: &ChartSpec) -> Result<String> {
    let datasets: Vec<serde_json::Value> = spec
        .datasets
        .iter()
        .map(|ds| {
            let data = match &ds.data {
                SeriesData::Values(v) => serde_json::json!(v),
                SeriesData::Points(p) => serde_json::json!(p),
            };
            let mut obj = serde_json::json!({
                "label": ds.label,
                "data": data,
                "yAxisID": ds.axis.scale_id(),
            });
            if let Some(color) = &ds.color {
                obj["borderColor"] = serde_json::json!(color);
                obj["backgroundColor"] = serde_json::json!(color);
            }
            if let Some(t) = ds.chart_type {
                obj["type"] = serde_json::json!(t);
                if t == ChartType::Line {
                    obj["pointRadius"] = serde_json::json!(0);
                    obj["fill"] = serde_json::json!(false);
                }
            }
            obj
        })
        .collect();

    let x_scale = if spec.chart_type == ChartType::Scatter {
        "linear"
    } else {
        "category"
    };
    let mut scales = serde_json::json!({
        "x": {
            "type": x_scale,
            "stacked": spec.stacked,
            "title": axis_title(spec.x_label.as_deref()),
        },
        "y": {
            "position": "left",
            "stacked": spec.stacked,
            "title": axis_title(spec.y_label.as_deref()),
        },
    });
    if spec.uses_right_axis() {
        scales["y1"] = serde_json::json!({
            "position": "right",
            "grid": { "drawOnChartArea": false },
            "title": axis_title(spec.y2_label.as_deref()),
        });
    }

    let config = serde_json::json!({
        "type": spec.chart_type,
        "data": {
            "labels": spec.labels,
            "datasets": datasets,
        },
        "options": {
            "responsive": true,
            "scales": scales,
            "plugins": {
                "title": {
                    "display": spec.title.is_some(),
                    "text": spec.title.as_deref().unwrap_or(""),
                }
            }
        }
    });

    Ok(serde_json::to_string_pretty(&config)?)
}

/// Render a standalone HTML page drawing the chart.
pub fn render_chart_page(spec: &ChartSpec) -> Result<String> {
    // `</` inside the inline script would end it early.
    let config = render_chart_config(spec)?.replace("</", "<\\/");
    let title = escape_html(spec.title.as_deref().unwrap_or("macrofeat chart"));
    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{CHART_JS_CDN}"></script>
</head>
<body>
<div style="max-width: 960px; margin: auto;">
<canvas id="chart"></canvas>
</div>
<script>
const config = {config};
new Chart(document.getElementById("chart"), config);
</script>
</body>
</html>
"#
    ))
}

fn axis_title(text: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "display": text.is_some(),
        "text": text.unwrap_or(""),
    })
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
