// src/services/lock_reaper.rs

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use serde_json::{Value, json};

use crate::{
    db::ExpiredLock,
    services::record_service::RecordService,
    ws::{RoomRegistry, protocol::LOCK_EXPIRED},
};

/// Libera periodicamente as travas com lease vencido e avisa todas as salas.
pub fn start_lock_reaper(
    records: RecordService,
    rooms: Arc<RoomRegistry>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let reaped = match records.reap_expired_locks().await {
                Ok(reaped) => reaped,
                Err(e) => {
                    tracing::error!(error = %e, "Falha ao liberar travas vencidas");
                    continue;
                }
            };
            if reaped.is_empty() {
                continue;
            }

            tracing::info!(count = reaped.len(), "Travas vencidas liberadas");
            for notice in expiry_notices(&reaped) {
                rooms.broadcast_all(LOCK_EXPIRED, &notice).await;
            }
        }
    })
}

/// Um aviso `{clinicTag, recordIds}` por clínica.
fn expiry_notices(reaped: &[ExpiredLock]) -> Vec<Value> {
    let mut by_clinic: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    for lock in reaped {
        by_clinic
            .entry(lock.clinic_tag.as_str())
            .or_default()
            .push(lock.record_id);
    }

    by_clinic
        .into_iter()
        .map(|(clinic_tag, mut record_ids)| {
            record_ids.sort_unstable();
            json!({ "clinicTag": clinic_tag, "recordIds": record_ids })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expired(record_id: i64, clinic_tag: &str) -> ExpiredLock {
        ExpiredLock {
            record_id,
            clinic_tag: clinic_tag.to_string(),
            previous_holder: 7,
        }
    }

    #[test]
    fn notices_are_grouped_per_clinic() {
        let notices = expiry_notices(&[
            expired(3, "gangnam"),
            expired(1, "gangnam"),
            expired(2, "busan"),
        ]);

        assert_eq!(
            notices,
            vec![
                json!({ "clinicTag": "busan", "recordIds": [2] }),
                json!({ "clinicTag": "gangnam", "recordIds": [1, 3] }),
            ]
        );
    }

    #[test]
    fn nothing_reaped_means_no_notices() {
        assert!(expiry_notices(&[]).is_empty());
    }
}
