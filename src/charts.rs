/**
 * CHARTS - Génération des graphiques de métriques
 *
 * RÔLE : transformer une fenêtre de samples récents (ordre chronologique)
 * en images de courbes par métrique : CPU%, RAM%, GPU%, ping.
 *
 * FONCTIONNEMENT :
 * - extraction par métrique des paires (heure HH:MM:SS, valeur) présentes
 * - une métrique avec moins de 2 points n'a pas de graphique
 * - rendu plotters en SVG, encodé base64 pour data-URI dans le dashboard
 * - chaque graphique est indépendant : les labels ne sont pas alignés
 *   entre métriques, seulement au sous-ensemble où la métrique est présente
 */
use crate::models::Sample;
use crate::store::TaggedSample;
use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use plotters::prelude::*;

// Couleurs alignées sur la palette du dashboard
const CPU_COLOR: RGBColor = RGBColor(0x66, 0x7e, 0xea);
const RAM_COLOR: RGBColor = RGBColor(0x76, 0x4b, 0xa2);
const GPU_COLOR: RGBColor = RGBColor(0x22, 0xc5, 0x5e);
const PING_COLOR: RGBColor = RGBColor(0xf5, 0x9e, 0x0b);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cpu,
    Ram,
    Gpu,
    Ping,
}

/// Ordre d'affichage des graphiques sur le dashboard.
pub const METRICS: [Metric; 4] = [Metric::Cpu, Metric::Ram, Metric::Gpu, Metric::Ping];

impl Metric {
    pub fn title(self) -> &'static str {
        match self {
            Metric::Cpu => "CPU Usage",
            Metric::Ram => "RAM Usage",
            Metric::Gpu => "GPU Usage",
            Metric::Ping => "Network Latency",
        }
    }

    fn axis_label(self) -> &'static str {
        match self {
            Metric::Cpu => "CPU Usage (%)",
            Metric::Ram => "RAM Usage (%)",
            Metric::Gpu => "GPU Usage (%)",
            Metric::Ping => "Ping (ms)",
        }
    }

    fn color(self) -> RGBColor {
        match self {
            Metric::Cpu => CPU_COLOR,
            Metric::Ram => RAM_COLOR,
            Metric::Gpu => GPU_COLOR,
            Metric::Ping => PING_COLOR,
        }
    }

    /// Axe Y borné à [0, 100] pour les pourcentages, auto pour le ping.
    fn percent_bounded(self) -> bool {
        !matches!(self, Metric::Ping)
    }

    fn value(self, sample: &Sample) -> Option<f64> {
        match self {
            Metric::Cpu => sample.cpu_percent,
            Metric::Ram => sample.ram_percent(),
            Metric::Gpu => sample.gpu_percent,
            Metric::Ping => sample.ping_ms,
        }
    }
}

/// Un graphique rendu, prêt à être embarqué dans une page.
pub struct ChartImage {
    pub title: &'static str,
    /// SVG encodé base64 (data URI `image/svg+xml`).
    pub data: String,
}

/// Les 8 derniers caractères du timestamp client, soit l'heure HH:MM:SS
/// pour un timestamp ISO.
fn time_label(ts: &str) -> String {
    let chars: Vec<char> = ts.chars().collect();
    let start = chars.len().saturating_sub(8);
    chars[start..].iter().collect()
}

/// Projette le sous-ensemble des samples où la métrique est présente.
pub fn extract_series(samples: &[TaggedSample], metric: Metric) -> Vec<(String, f64)> {
    samples
        .iter()
        .filter_map(|t| {
            metric.value(&t.sample).map(|v| {
                let label = t
                    .sample
                    .timestamp
                    .as_deref()
                    .map(time_label)
                    .unwrap_or_default();
                (label, v)
            })
        })
        .collect()
}

/// Construit les graphiques disponibles, dans l'ordre CPU, RAM, GPU, Ping.
/// Un échec de rendu n'est pas fatal : le graphique est simplement omis.
pub fn build_charts(samples: &[TaggedSample]) -> Vec<ChartImage> {
    let mut charts = Vec::new();
    for metric in METRICS {
        let series = extract_series(samples, metric);
        if series.len() < 2 {
            continue;
        }
        match render_line_chart(metric, &series) {
            Ok(data) => charts.push(ChartImage {
                title: metric.title(),
                data,
            }),
            Err(e) => eprintln!("[charts] failed to render {}: {e}", metric.title()),
        }
    }
    charts
}

fn render_line_chart(metric: Metric, series: &[(String, f64)]) -> anyhow::Result<String> {
    let labels: Vec<&str> = series.iter().map(|(l, _)| l.as_str()).collect();
    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

    let (y_min, y_max) = if metric.percent_bounded() {
        (0.0, 100.0)
    } else {
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (0.0, (max * 1.1).max(1.0))
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (800, 400)).into_drawing_area();
        root.fill(&WHITE)
            .with_context(|| format!("fill background for {}", metric.title()))?;

        let color = metric.color();
        let mut chart = ChartBuilder::on(&root)
            .caption(format!("{} Over Time", metric.title()), ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0..values.len() - 1, y_min..y_max)
            .context("build chart axes")?;

        chart
            .configure_mesh()
            .x_labels(8)
            .x_label_formatter(&|idx| labels.get(*idx).map(|s| s.to_string()).unwrap_or_default())
            .x_desc("Time")
            .y_desc(metric.axis_label())
            .draw()
            .context("draw chart mesh")?;

        chart
            .draw_series(LineSeries::new(
                values.iter().copied().enumerate(),
                color.stroke_width(2),
            ))
            .context("draw line series")?;

        // Marqueurs sur chaque point
        chart
            .draw_series(
                values
                    .iter()
                    .copied()
                    .enumerate()
                    .map(|(i, v)| Circle::new((i, v), 3, color.filled())),
            )
            .context("draw point markers")?;

        root.present().context("finalize chart")?;
    }

    Ok(BASE64.encode(svg.as_bytes()))
}
