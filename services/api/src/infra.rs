use credit_ledger::ledger::{
    AuditError, AuditRecord, AuditSink, Ciphertext, ConfidentialityOracle, EncryptedAttributes,
    OracleError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) audit: Arc<InMemoryAuditLog>,
}

/// Records retained by the in-memory audit log before the oldest are evicted.
pub(crate) const AUDIT_RETENTION: usize = 10_000;

/// Process-local, bounded audit trail served from `/api/v1/audit`.
///
/// Records are kept in sequence order even when concurrent operations deliver them out of
/// order; once `capacity` is reached the lowest sequence numbers are evicted.
#[derive(Clone)]
pub(crate) struct InMemoryAuditLog {
    records: Arc<Mutex<VecDeque<AuditRecord>>>,
    capacity: usize,
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::with_capacity(AUDIT_RETENTION)
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| AuditError::Transport("audit log mutex poisoned".to_string()))?;
        let position = guard.partition_point(|stored| stored.sequence < record.sequence);
        guard.insert(position, record);
        while guard.len() > self.capacity {
            guard.pop_front();
        }
        Ok(())
    }
}

impl InMemoryAuditLog {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Most recent `limit` records, oldest first.
    pub(crate) fn latest(&self, limit: usize) -> Vec<AuditRecord> {
        let guard = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let skip = guard.len().saturating_sub(limit);
        guard.iter().skip(skip).cloned().collect()
    }

    /// Number of records currently retained.
    pub(crate) fn len(&self) -> usize {
        self.records
            .lock()
            .map(|guard| guard.len())
            .unwrap_or_default()
    }
}

/// Stand-in for the confidential coprocessor used by `serve` and `demo`.
///
/// Ciphertexts are plain big-endian `u32` words, either 4 bytes or a 32-byte ABI word with
/// zero padding. Income and debt are amounts; payment history and utilization are 0..=100.
/// The derived score always lands in 300..=850.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DevelopmentOracle;

impl DevelopmentOracle {
    pub(crate) fn score(attributes: &EncryptedAttributes) -> Result<u16, OracleError> {
        let income = decode_word("income", &attributes.income)?;
        let debt = decode_word("debt", &attributes.debt)?;
        let payment_history = decode_word("payment_history", &attributes.payment_history)?.min(100);
        let utilization = decode_word("utilization", &attributes.utilization)?.min(100);

        let debt_ratio = if income == 0 {
            100
        } else {
            (u64::from(debt) * 100 / u64::from(income)).min(100) as u32
        };

        let score = 300 + payment_history * 3 + (100 - utilization) * 3 / 2 + (100 - debt_ratio);
        Ok(score as u16)
    }
}

impl ConfidentialityOracle for DevelopmentOracle {
    fn evaluate(
        &self,
        attributes: &EncryptedAttributes,
        threshold: u16,
    ) -> Result<bool, OracleError> {
        Ok(Self::score(attributes)? >= threshold)
    }
}

pub(crate) fn encode_word(value: u32) -> Ciphertext {
    Ciphertext::new(value.to_be_bytes().to_vec())
}

fn decode_word(field: &str, ciphertext: &Ciphertext) -> Result<u32, OracleError> {
    let bytes = ciphertext.as_bytes();
    let word = match bytes.len() {
        4 => bytes,
        32 if bytes[..28].iter().all(|byte| *byte == 0) => &bytes[28..],
        len => {
            return Err(OracleError::Malformed(format!(
                "{field}: expected a 4 or 32 byte word, got {len} bytes"
            )))
        }
    };
    let mut buf = [0u8; 4];
    buf.copy_from_slice(word);
    Ok(u32::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(
        income: u32,
        debt: u32,
        payment_history: u32,
        utilization: u32,
    ) -> EncryptedAttributes {
        EncryptedAttributes {
            income: encode_word(income),
            debt: encode_word(debt),
            payment_history: encode_word(payment_history),
            utilization: encode_word(utilization),
        }
    }

    #[test]
    fn score_stays_within_bureau_range() {
        let best = DevelopmentOracle::score(&attributes(90_000, 0, 100, 0)).expect("decodes");
        let worst = DevelopmentOracle::score(&attributes(0, 50_000, 0, 100)).expect("decodes");
        assert_eq!(best, 850);
        assert_eq!(worst, 300);
    }

    #[test]
    fn abi_padded_words_decode() {
        let mut padded = vec![0u8; 28];
        padded.extend_from_slice(&95u32.to_be_bytes());
        let mut fields = attributes(80_000, 20_000, 0, 25);
        fields.payment_history = Ciphertext::new(padded);

        let score = DevelopmentOracle::score(&fields).expect("decodes");
        assert_eq!(score, 300 + 285 + 112 + 75);
    }

    #[test]
    fn unexpected_width_is_malformed() {
        let mut fields = attributes(1, 1, 1, 1);
        fields.debt = Ciphertext::new(vec![1, 2, 3]);
        assert!(matches!(
            DevelopmentOracle.evaluate(&fields, 300),
            Err(OracleError::Malformed(_))
        ));
    }

    fn submitted(sequence: u64, name: &str) -> AuditRecord {
        use credit_ledger::ledger::{AuditEvent, Identity};

        AuditRecord {
            sequence,
            recorded_at: chrono::Utc::now(),
            event: AuditEvent::DataSubmitted {
                identity: Identity::parse(name).expect("identity"),
            },
        }
    }

    fn sequences(records: &[AuditRecord]) -> Vec<u64> {
        records.iter().map(|record| record.sequence).collect()
    }

    #[test]
    fn audit_log_returns_latest_records() {
        let log = InMemoryAuditLog::default();
        for (sequence, name) in ["a", "b", "c"].into_iter().enumerate() {
            log.record(submitted(sequence as u64, name)).expect("recorded");
        }

        assert_eq!(log.len(), 3);
        assert_eq!(sequences(&log.latest(2)), vec![1, 2]);
        assert_eq!(log.latest(10).len(), 3);
    }

    #[test]
    fn audit_log_orders_late_deliveries_by_sequence() {
        let log = InMemoryAuditLog::default();
        for sequence in [0, 2, 3, 1] {
            log.record(submitted(sequence, "a")).expect("recorded");
        }

        assert_eq!(sequences(&log.latest(10)), vec![0, 1, 2, 3]);
        assert_eq!(sequences(&log.latest(2)), vec![2, 3]);
    }

    #[test]
    fn audit_log_evicts_oldest_beyond_capacity() {
        let log = InMemoryAuditLog::with_capacity(3);
        for sequence in 0..10 {
            log.record(submitted(sequence, "a")).expect("recorded");
        }

        assert_eq!(log.len(), 3);
        assert_eq!(sequences(&log.latest(usize::MAX)), vec![7, 8, 9]);
    }
}
