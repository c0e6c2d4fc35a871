use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type JsonMap = serde_json::Map<String, Value>;

/// Un sample de métriques tel que rapporté par un client.
///
/// Tous les champs connus sont optionnels ; tout champ inconnu (ou connu mais
/// mal typé) est conservé tel quel dans `extra` pour garantir le round-trip
/// complet du payload. Aucune validation de schéma à l'ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "JsonMap", into = "JsonMap")]
pub struct Sample {
    pub timestamp: Option<String>,
    pub client_name: Option<String>,
    pub client_id: Option<String>,
    pub cpu_percent: Option<f64>,
    pub gpu_percent: Option<f64>,
    pub ping_ms: Option<f64>,
    pub internet_connected: Option<bool>,
    pub ram: Option<RamUsage>,
    pub received_at: Option<String>,
    pub extra: JsonMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RamUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Sample {
    /// Pourcentage RAM, si la structure mémoire est présente et bien formée.
    pub fn ram_percent(&self) -> Option<f64> {
        self.ram.as_ref().and_then(|r| r.percent)
    }
}

// Extraction tolérante : une valeur mal typée n'est pas une erreur,
// elle reste dans `extra` et le champ typé reste None.
fn take_string(map: &mut JsonMap, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn take_f64(map: &mut JsonMap, key: &str) -> Option<f64> {
    match map.remove(key) {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) => Some(v),
            None => {
                map.insert(key.to_string(), Value::Number(n));
                None
            }
        },
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn take_bool(map: &mut JsonMap, key: &str) -> Option<bool> {
    match map.remove(key) {
        Some(Value::Bool(b)) => Some(b),
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn take_ram(map: &mut JsonMap, key: &str) -> Option<RamUsage> {
    match map.remove(key) {
        Some(v @ Value::Object(_)) => match serde_json::from_value::<RamUsage>(v.clone()) {
            Ok(ram) => Some(ram),
            Err(_) => {
                map.insert(key.to_string(), v);
                None
            }
        },
        Some(other) => {
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

impl From<JsonMap> for Sample {
    fn from(mut map: JsonMap) -> Self {
        Sample {
            timestamp: take_string(&mut map, "timestamp"),
            client_name: take_string(&mut map, "client_name"),
            client_id: take_string(&mut map, "client_id"),
            cpu_percent: take_f64(&mut map, "cpu_percent"),
            gpu_percent: take_f64(&mut map, "gpu_percent"),
            ping_ms: take_f64(&mut map, "ping_ms"),
            internet_connected: take_bool(&mut map, "internet_connected"),
            ram: take_ram(&mut map, "ram"),
            received_at: take_string(&mut map, "received_at"),
            extra: map,
        }
    }
}

impl From<Sample> for JsonMap {
    fn from(sample: Sample) -> Self {
        let mut map = JsonMap::new();
        if let Some(v) = sample.timestamp {
            map.insert("timestamp".into(), Value::String(v));
        }
        if let Some(v) = sample.client_name {
            map.insert("client_name".into(), Value::String(v));
        }
        if let Some(v) = sample.client_id {
            map.insert("client_id".into(), Value::String(v));
        }
        if let Some(v) = sample.cpu_percent {
            map.insert("cpu_percent".into(), serde_json::json!(v));
        }
        if let Some(v) = sample.gpu_percent {
            map.insert("gpu_percent".into(), serde_json::json!(v));
        }
        if let Some(v) = sample.ping_ms {
            map.insert("ping_ms".into(), serde_json::json!(v));
        }
        if let Some(v) = sample.internet_connected {
            map.insert("internet_connected".into(), Value::Bool(v));
        }
        if let Some(ram) = sample.ram {
            if let Ok(v) = serde_json::to_value(ram) {
                map.insert("ram".into(), v);
            }
        }
        if let Some(v) = sample.received_at {
            map.insert("received_at".into(), Value::String(v));
        }
        map.extend(sample.extra);
        map
    }
}
