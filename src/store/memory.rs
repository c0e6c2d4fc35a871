use super::{ClientSummary, MetricsStore, SampleOrder, StoreError, TaggedSample};
use crate::models::Sample;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Backend mémoire : une file plafonnée par client.
///
/// L'éviction est en sémantique de queue : l'insertion au-delà du plafond
/// pousse l'entrée la plus ancienne dehors. Tout l'état vit derrière un
/// unique mutex, perdu à l'arrêt du process.
pub struct MemoryStore {
    cap: usize,
    clients: Mutex<HashMap<String, VecDeque<Sample>>>,
}

impl MemoryStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            clients: Mutex::new(HashMap::new()),
        }
    }
}

fn sort_newest_first(samples: &mut [TaggedSample]) {
    // Tri stable par timestamp client décroissant ; timestamp absent = ""
    samples.sort_by(|a, b| {
        let ka = a.sample.timestamp.as_deref().unwrap_or("");
        let kb = b.sample.timestamp.as_deref().unwrap_or("");
        kb.cmp(ka)
    });
}

impl MetricsStore for MemoryStore {
    fn append(&self, client_id: &str, sample: Sample) -> Result<usize, StoreError> {
        let mut clients = self.clients.lock();
        let history = clients.entry(client_id.to_string()).or_default();
        history.push_back(sample);
        while history.len() > self.cap {
            history.pop_front();
        }
        Ok(history.len())
    }

    fn all_samples(
        &self,
        limit: usize,
        order: SampleOrder,
    ) -> Result<Vec<TaggedSample>, StoreError> {
        let clients = self.clients.lock();
        let mut merged: Vec<TaggedSample> = clients
            .iter()
            .flat_map(|(client_id, history)| {
                history.iter().map(|s| TaggedSample {
                    client_id: client_id.clone(),
                    sample: s.clone(),
                })
            })
            .collect();
        sort_newest_first(&mut merged);
        merged.truncate(limit);
        if order == SampleOrder::OldestFirst {
            merged.reverse();
        }
        Ok(merged)
    }

    fn client_samples(
        &self,
        client_id: &str,
        limit: usize,
        order: SampleOrder,
    ) -> Result<Vec<TaggedSample>, StoreError> {
        let clients = self.clients.lock();
        let Some(history) = clients.get(client_id) else {
            return Ok(Vec::new());
        };
        // Fenêtre = les `limit` entrées les plus récentes
        let mut window: Vec<TaggedSample> = history
            .iter()
            .rev()
            .take(limit)
            .map(|s| TaggedSample {
                client_id: client_id.to_string(),
                sample: s.clone(),
            })
            .collect();
        if order == SampleOrder::OldestFirst {
            window.reverse();
        }
        Ok(window)
    }

    fn roster(&self) -> Result<Vec<ClientSummary>, StoreError> {
        let clients = self.clients.lock();
        let mut roster: Vec<ClientSummary> = clients
            .iter()
            .filter(|(_, history)| !history.is_empty())
            .map(|(client_id, history)| {
                // Nom d'affichage du sample le plus récent par timestamp,
                // même règle que le backend SQLite ; à timestamp égal,
                // le dernier inséré prime.
                let display_name = history
                    .iter()
                    .enumerate()
                    .max_by_key(|(idx, s)| {
                        (s.timestamp.clone().unwrap_or_default(), *idx)
                    })
                    .and_then(|(_, s)| s.client_name.clone())
                    .unwrap_or_else(|| client_id.clone());
                let last_seen = history
                    .iter()
                    .filter_map(|s| s.timestamp.as_deref())
                    .max()
                    .map(String::from);
                ClientSummary {
                    client_id: client_id.clone(),
                    client_name: display_name,
                    last_seen,
                    metric_count: history.len(),
                }
            })
            .collect();
        roster.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(roster)
    }

    fn total_clients(&self) -> Result<usize, StoreError> {
        Ok(self.clients.lock().len())
    }

    fn total_samples(&self) -> Result<usize, StoreError> {
        Ok(self.clients.lock().values().map(VecDeque::len).sum())
    }
}
