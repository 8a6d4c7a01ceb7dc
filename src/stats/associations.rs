// Client association counts per band, cross-referencing SSIDs to radios by phy.

use serde_json::Value;
use std::collections::HashMap;

use super::fields::{key_string, unsigned};
use crate::error::StatsError;
use crate::models::{Associations, Band, channel_to_band};

/// Counts associated clients per band in one state report.
///
/// Each SSID names the radio it runs on by `phy`; the radio's channel decides the band. SSIDs
/// whose phy has no matching radio count as 2.4GHz. Nothing is carried between reports.
pub fn get_associations(report: &Value) -> Result<Associations, StatsError> {
    let (Some(radios), Some(interfaces)) = (
        report.get("radios").and_then(Value::as_array),
        report.get("interfaces").and_then(Value::as_array),
    ) else {
        return Err(StatsError::MissingRadiosOrInterfaces);
    };

    let bands = radio_bands(radios);
    let mut associations = Associations::default();
    for interface in interfaces {
        let Some(ssids) = interface.get("ssids").and_then(Value::as_array) else {
            continue;
        };
        for ssid in ssids {
            let (Some(clients), Some(phy)) = (
                ssid.get("associations").and_then(Value::as_array),
                ssid.get("phy").and_then(key_string),
            ) else {
                continue;
            };
            let band = bands.get(&phy).copied().unwrap_or(Band::Band2G);
            associations.add(band, clients.len() as u64);
        }
    }
    Ok(associations)
}

/// phy -> band for every radio with a readable channel. A later radio with the same phy wins.
fn radio_bands(radios: &[Value]) -> HashMap<String, Band> {
    let mut bands = HashMap::new();
    for radio in radios {
        let (Some(phy), Some(channel)) = (radio.get("phy").and_then(key_string), radio.get("channel"))
        else {
            continue;
        };
        let channel = match channel {
            Value::Array(channels) => channels.first().and_then(unsigned),
            scalar => unsigned(scalar),
        };
        match channel {
            Some(channel) => {
                bands.insert(phy, channel_to_band(channel));
            }
            None => tracing::debug!(phy = %phy, "radio channel unreadable, skipping"),
        }
    }
    bands
}
