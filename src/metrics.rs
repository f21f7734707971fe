//! Relay metrics (Prometheus format)

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct RelayMetrics {
    registry: Registry,
    connections_open: IntGauge,
    connections_total: IntCounter,
    relayed: IntCounterVec,
    cached: IntCounterVec,
    replayed: IntCounter,
    dropped: IntCounterVec,
}

impl RelayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("camlink_relay".to_string()), None)?;

        let connections_open = IntGauge::new("connections", "Current number of relay connections")?;
        let connections_total =
            IntCounter::new("connections_total", "Relay connections accepted since start")?;
        let relayed = IntCounterVec::new(
            Opts::new("messages_relayed_total", "Messages forwarded live to a peer"),
            &["type"],
        )?;
        let cached = IntCounterVec::new(
            Opts::new("messages_cached_total", "Messages stored in the mailbox"),
            &["type"],
        )?;
        let replayed = IntCounter::new(
            "messages_replayed_total",
            "Cached messages replayed to a joining camera",
        )?;
        let dropped = IntCounterVec::new(
            Opts::new("messages_dropped_total", "Messages discarded by the relay"),
            &["reason"],
        )?;

        registry.register(Box::new(connections_open.clone()))?;
        registry.register(Box::new(connections_total.clone()))?;
        registry.register(Box::new(relayed.clone()))?;
        registry.register(Box::new(cached.clone()))?;
        registry.register(Box::new(replayed.clone()))?;
        registry.register(Box::new(dropped.clone()))?;

        Ok(Self {
            registry,
            connections_open,
            connections_total,
            relayed,
            cached,
            replayed,
            dropped,
        })
    }

    pub fn connection_opened(&self) {
        self.connections_open.inc();
        self.connections_total.inc();
    }

    pub fn connection_closed(&self) {
        self.connections_open.dec();
    }

    pub fn open_connections(&self) -> i64 {
        self.connections_open.get()
    }

    pub fn record_relayed(&self, message_type: &str) {
        self.relayed.with_label_values(&[message_type]).inc();
    }

    pub fn record_cached(&self, message_type: &str) {
        self.cached.with_label_values(&[message_type]).inc();
    }

    pub fn record_replayed(&self, count: usize) {
        self.replayed.inc_by(count as u64);
    }

    pub fn record_dropped(&self, reason: &str) {
        self.dropped.with_label_values(&[reason]).inc();
    }

    pub fn relayed_count(&self, message_type: &str) -> u64 {
        self.relayed.with_label_values(&[message_type]).get()
    }

    pub fn dropped_count(&self, reason: &str) -> u64 {
        self.dropped.with_label_values(&[reason]).get()
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::RelayMetrics;

    #[test]
    fn encode_includes_prefixed_counters() {
        let metrics = RelayMetrics::new().unwrap();
        metrics.connection_opened();
        metrics.record_relayed("offer");
        metrics.record_dropped("no_viewer");

        let text = metrics.encode().unwrap();
        assert!(text.contains("camlink_relay_connections 1"));
        assert!(text.contains("camlink_relay_messages_relayed_total{type=\"offer\"} 1"));
        assert!(text.contains("camlink_relay_messages_dropped_total{reason=\"no_viewer\"} 1"));
    }

    #[test]
    fn connection_gauge_tracks_open_connections() {
        let metrics = RelayMetrics::new().unwrap();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();
        assert_eq!(metrics.open_connections(), 1);
    }
}
