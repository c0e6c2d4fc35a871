/**
 * STORE - Historique borné de samples par client
 *
 * RÔLE :
 * Abstraction unique de stockage derrière laquelle vivent deux backends
 * interchangeables : file mémoire plafonnée (MemoryStore) et table SQLite
 * avec trim après insertion (SqliteStore). Sélection par configuration.
 *
 * FONCTIONNEMENT :
 * - append = insertion + trim au plafond de rétention, une seule section critique
 * - lectures fusionnées triées par timestamp client décroissant
 * - fenêtre récente avec paramètre d'ordre explicite (liste vs graphiques)
 * - client inconnu = historique vide, jamais une erreur
 */
pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::StoreConf;
use crate::models::Sample;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Ordre de restitution d'une fenêtre de samples récents.
///
/// La fenêtre est toujours "les N plus récents" ; seul l'ordre de parcours
/// change : `NewestFirst` pour les vues liste, `OldestFirst` pour les
/// graphiques (axe temps de gauche à droite).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOrder {
    NewestFirst,
    OldestFirst,
}

/// Sample restitué par le store, étiqueté avec le client propriétaire.
/// Le payload est aplati ; un `client_id` déjà présent dans le payload
/// d'origine prime sur l'étiquette.
#[derive(Debug, Clone, Serialize)]
pub struct TaggedSample {
    pub client_id: String,
    #[serde(flatten)]
    pub sample: Sample,
}

/// Une ligne du roster clients.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    pub client_id: String,
    pub client_name: String,
    pub last_seen: Option<String>,
    pub metric_count: usize,
}

/// Interface commune des backends de stockage.
pub trait MetricsStore: Send + Sync {
    /// Insère le sample comme entrée la plus récente du client, crée
    /// l'historique si besoin, puis applique le plafond de rétention.
    /// Retourne le nombre de samples conservés pour ce client.
    fn append(&self, client_id: &str, sample: Sample) -> Result<usize, StoreError>;

    /// Fusion tous clients, triée par timestamp client décroissant,
    /// tronquée à `limit`, puis ordonnée selon `order`.
    fn all_samples(&self, limit: usize, order: SampleOrder)
        -> Result<Vec<TaggedSample>, StoreError>;

    /// Même primitive de fenêtre récente, restreinte à un client.
    fn client_samples(
        &self,
        client_id: &str,
        limit: usize,
        order: SampleOrder,
    ) -> Result<Vec<TaggedSample>, StoreError>;

    /// Une ligne par client connu : identifiant, nom d'affichage,
    /// dernier timestamp vu, nombre de samples conservés.
    fn roster(&self) -> Result<Vec<ClientSummary>, StoreError>;

    fn total_clients(&self) -> Result<usize, StoreError>;

    fn total_samples(&self) -> Result<usize, StoreError>;
}

/// Construit le backend choisi par la configuration.
pub fn open_store(conf: &StoreConf, retention_cap: usize) -> Result<Arc<dyn MetricsStore>, StoreError> {
    match conf {
        StoreConf::Memory => {
            eprintln!("[store] using in-memory backend (cap: {retention_cap})");
            Ok(Arc::new(MemoryStore::new(retention_cap)))
        }
        StoreConf::Sqlite { path } => {
            eprintln!("[store] using sqlite backend at {path} (cap: {retention_cap})");
            Ok(Arc::new(SqliteStore::open(path, retention_cap)?))
        }
    }
}
