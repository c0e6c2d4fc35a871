use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: ListenConf,
    /// Nombre max de samples conservés par client.
    pub retention_cap: usize,
    /// Taille de page de la table du dashboard et limite par défaut de l'API.
    pub page_size: usize,
    /// Nombre de samples récents utilisés pour les graphiques.
    pub chart_window: usize,
    pub store: StoreConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ListenConf {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConf {
    Memory,
    Sqlite { path: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: ListenConf::default(),
            retention_cap: 100,
            page_size: 50,
            chart_window: 20,
            store: StoreConf::Memory,
        }
    }
}

impl Default for ListenConf {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
        }
    }
}

pub async fn load_config() -> ServerConfig {
    let path = std::env::var("VIGIE_CONFIG").unwrap_or_else(|_| "vigie.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return ServerConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            eprintln!("[vigie] config invalide: {e}");
            ServerConfig::default()
        })
    } else {
        eprintln!("[vigie] pas de {path}, usage config par défaut");
        ServerConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.retention_cap, 100);
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.chart_window, 20);
        assert_eq!(cfg.listen.port, 8000);
        assert!(matches!(cfg.store, StoreConf::Memory));
    }

    #[test]
    fn test_sqlite_backend_parses_from_yaml() {
        let cfg: ServerConfig = serde_yaml::from_str(
            "store:\n  backend: sqlite\n  path: ./vigie.db\nretention_cap: 10\n",
        )
        .unwrap();
        assert_eq!(cfg.retention_cap, 10);
        match cfg.store {
            StoreConf::Sqlite { path } => assert_eq!(path, "./vigie.db"),
            other => panic!("unexpected backend: {other:?}"),
        }
    }
}
