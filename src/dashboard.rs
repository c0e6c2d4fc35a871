/**
 * DASHBOARD - Rendu de la page HTML auto-rafraîchie
 *
 * RÔLE : assembler la vue principale : panneau d'utilisation de l'API,
 * cartes résumé, table des samples récents, graphiques, état vide.
 * Meta-refresh 5 secondes, aucune dépendance front.
 */
use crate::charts::ChartImage;
use crate::store::TaggedSample;
use std::fmt::Write as _;

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; margin: 20px; background-color: #f5f5f5; }
h1 { color: #333; text-align: center; }
.container { max-width: 1400px; margin: 0 auto; background-color: white;
  padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
.api-info { background-color: #f0f9ff; border: 2px solid #0ea5e9;
  border-radius: 8px; padding: 20px; margin-bottom: 30px; }
.api-info h2 { margin-top: 0; color: #0369a1; }
.api-info code { background-color: #e0f2fe; padding: 2px 6px; border-radius: 4px; }
.api-info pre { background-color: #1e293b; color: #e2e8f0; padding: 15px;
  border-radius: 6px; overflow-x: auto; }
.stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr));
  gap: 15px; margin-bottom: 30px; }
.stat-card { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
  color: white; padding: 20px; border-radius: 8px; text-align: center; }
.stat-card h3 { margin: 0 0 10px 0; font-size: 14px; opacity: 0.9; }
.stat-card .value { font-size: 32px; font-weight: bold; margin: 0; }
table { width: 100%; border-collapse: collapse; margin-top: 20px; }
th { background-color: #667eea; color: white; padding: 12px; text-align: left; }
td { padding: 10px; border-bottom: 1px solid #ddd; }
tr:hover { background-color: #f5f5f5; }
.status-connected { color: #22c55e; font-weight: bold; }
.status-disconnected { color: #ef4444; font-weight: bold; }
.charts { display: grid; grid-template-columns: repeat(auto-fit, minmax(400px, 1fr));
  gap: 20px; margin-top: 30px; }
.chart-container { text-align: center; }
.chart-container img { max-width: 100%; height: auto; border-radius: 8px;
  box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
.info { text-align: center; color: #666; margin-top: 20px; font-size: 14px; }
.no-data { text-align: center; padding: 60px 20px; color: #666; }
.no-data h2 { color: #999; }
"#;

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn fmt_pct(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.1}%"),
        None => "N/A".to_string(),
    }
}

fn fmt_num(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.1}"),
        None => "N/A".to_string(),
    }
}

/// Assemble la page complète.
pub fn render(
    samples: &[TaggedSample],
    charts: &[ChartImage],
    total_clients: usize,
    total_samples: usize,
    base_url: &str,
) -> String {
    let mut page = String::with_capacity(16 * 1024);
    let _ = write!(
        page,
        "<!DOCTYPE html>\n<html>\n<head>\n<title>Vigie - System Metrics Dashboard</title>\n\
         <meta http-equiv=\"refresh\" content=\"5\">\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <div class=\"container\">\n<h1>Vigie &mdash; System Metrics Dashboard</h1>\n"
    );

    render_api_info(&mut page, base_url);

    if samples.is_empty() {
        page.push_str(
            "<div class=\"no-data\">\n<h2>No Metrics Yet</h2>\n\
             <p>Waiting for clients to send data...</p>\n\
             <p>Use the API endpoint above to start sending metrics.</p>\n</div>\n",
        );
    } else {
        render_stat_cards(&mut page, samples, total_clients, total_samples);
        render_table(&mut page, samples);
        render_charts(&mut page, charts);
        let _ = write!(
            page,
            "<div class=\"info\"><p>Dashboard auto-refreshes every 5 seconds | \
             Total clients: {total_clients}</p></div>\n"
        );
    }

    page.push_str("</div>\n</body>\n</html>\n");
    page
}

fn render_api_info(page: &mut String, base_url: &str) {
    let _ = write!(
        page,
        "<div class=\"api-info\">\n<h2>How to Send Metrics</h2>\n\
         <p>Send metrics to this dashboard via POST request:</p>\n\
         <p><strong>Endpoint:</strong> <code>POST {base}/api/metrics</code></p>\n\
         <p><strong>Example:</strong></p>\n\
         <pre>curl -X POST {base}/api/metrics \\\n  -H 'Content-Type: application/json' \\\n  \
         -d '{{\"timestamp\": \"2025-01-01T10:00:00\", \"client_name\": \"My Computer\",\n       \
         \"cpu_percent\": 12.5, \"ram\": {{\"used_gb\": 4.2, \"total_gb\": 16.0, \"percent\": 26.3}}}}'</pre>\n\
         </div>\n",
        base = escape(base_url),
    );
}

fn render_stat_cards(
    page: &mut String,
    samples: &[TaggedSample],
    total_clients: usize,
    total_samples: usize,
) {
    // Le premier sample est le plus récent (tri décroissant)
    let latest = &samples[0].sample;
    let _ = write!(
        page,
        "<div class=\"stats\">\n\
         <div class=\"stat-card\"><h3>Active Clients</h3><p class=\"value\">{total_clients}</p></div>\n\
         <div class=\"stat-card\"><h3>Total Metrics</h3><p class=\"value\">{total_samples}</p></div>\n\
         <div class=\"stat-card\"><h3>Latest CPU</h3><p class=\"value\">{cpu}</p></div>\n\
         <div class=\"stat-card\"><h3>Latest RAM</h3><p class=\"value\">{ram}</p></div>\n\
         </div>\n",
        cpu = fmt_pct(latest.cpu_percent),
        ram = fmt_pct(latest.ram_percent()),
    );
}

fn render_table(page: &mut String, samples: &[TaggedSample]) {
    page.push_str(
        "<h2>Recent Metrics from All Clients</h2>\n<table>\n<thead><tr>\
         <th>Client</th><th>Timestamp</th><th>CPU %</th><th>GPU %</th>\
         <th>RAM Used (GB)</th><th>RAM %</th><th>Ping (ms)</th><th>Internet</th>\
         </tr></thead>\n<tbody>\n",
    );
    for tagged in samples {
        let s = &tagged.sample;
        let client = s.client_name.as_deref().unwrap_or(&tagged.client_id);
        let ram_used = match s.ram.as_ref() {
            Some(r) => match (r.used_gb, r.total_gb) {
                (Some(u), Some(t)) => format!("{u:.2} / {t:.2}"),
                _ => "N/A".to_string(),
            },
            None => "N/A".to_string(),
        };
        let (net_class, net_text) = match s.internet_connected {
            Some(true) => ("status-connected", "Connected"),
            Some(false) => ("status-disconnected", "Disconnected"),
            None => ("", "N/A"),
        };
        let _ = write!(
            page,
            "<tr><td><strong>{client}</strong></td><td>{ts}</td><td>{cpu}</td>\
             <td>{gpu}</td><td>{ram_used}</td><td>{ram_pct}</td><td>{ping}</td>\
             <td class=\"{net_class}\">{net_text}</td></tr>\n",
            client = escape(client),
            ts = escape(s.timestamp.as_deref().unwrap_or("N/A")),
            cpu = fmt_pct(s.cpu_percent),
            gpu = fmt_num(s.gpu_percent),
            ram_pct = fmt_pct(s.ram_percent()),
            ping = fmt_num(s.ping_ms),
        );
    }
    page.push_str("</tbody>\n</table>\n");
}

fn render_charts(page: &mut String, charts: &[ChartImage]) {
    if charts.is_empty() {
        return;
    }
    page.push_str("<h2>Performance Charts</h2>\n<div class=\"charts\">\n");
    for chart in charts {
        let _ = write!(
            page,
            "<div class=\"chart-container\">\n<h3>{title}</h3>\n\
             <img src=\"data:image/svg+xml;base64,{data}\" alt=\"{title}\">\n</div>\n",
            title = chart.title,
            data = chart.data,
        );
    }
    page.push_str("</div>\n");
}
