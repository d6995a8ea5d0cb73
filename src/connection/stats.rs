//! Traffic counters for measuring how much compression saves.

/// Octet and message counts for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OctetCounter {
    /// Payload octets as seen by the application (uncompressed).
    pub app_octets: u64,
    /// Payload octets carried in WebSocket frames (compressed if applicable).
    pub websocket_octets: u64,
    /// Data frames.
    pub frames: u64,
    /// Complete messages.
    pub messages: u64,
}

impl OctetCounter {
    /// Record one message.
    pub fn record(&mut self, app_octets: usize, websocket_octets: usize, frames: usize) {
        self.app_octets += app_octets as u64;
        self.websocket_octets += websocket_octets as u64;
        self.frames += frames as u64;
        self.messages += 1;
    }

    /// WebSocket-level octets divided by application-level octets.
    ///
    /// `None` until some application data has been counted.
    #[must_use]
    pub fn compression_ratio(&self) -> Option<f64> {
        if self.app_octets == 0 {
            None
        } else {
            Some(self.websocket_octets as f64 / self.app_octets as f64)
        }
    }
}

/// Per-connection traffic statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// Messages we sent.
    pub outgoing: OctetCounter,
    /// Messages we received.
    pub incoming: OctetCounter,
}

impl TrafficStats {
    /// See [`OctetCounter::compression_ratio`].
    #[must_use]
    pub fn outgoing_compression_ratio(&self) -> Option<f64> {
        self.outgoing.compression_ratio()
    }

    /// See [`OctetCounter::compression_ratio`].
    #[must_use]
    pub fn incoming_compression_ratio(&self) -> Option<f64> {
        self.incoming.compression_ratio()
    }

    /// Zero all counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_none_until_data() {
        let stats = TrafficStats::default();
        assert_eq!(stats.outgoing_compression_ratio(), None);
        assert_eq!(stats.incoming_compression_ratio(), None);
    }

    #[test]
    fn test_record_and_reset() {
        let mut stats = TrafficStats::default();
        stats.outgoing.record(1000, 250, 2);
        stats.outgoing.record(1000, 250, 1);
        assert_eq!(stats.outgoing.messages, 2);
        assert_eq!(stats.outgoing.frames, 3);
        assert_eq!(stats.outgoing_compression_ratio(), Some(0.25));

        stats.reset();
        assert_eq!(stats, TrafficStats::default());
    }
}
