//! Shutdown statistics block: connection counts, byte counters, and the
//! HTTP-mode breakdown (per-method totals, malformed count, keep-alive reuse
//! count) printed once the event loop exits.

#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub errors: u64,

    pub requests_total: u64,
    pub requests_get: u64,
    pub requests_post: u64,
    pub requests_error: u64,
    pub keep_alive_reused: u64,
}

impl Stats {
    pub fn record_method(&mut self, method: crate::http::types::Method) {
        self.requests_total += 1;
        match method {
            crate::http::types::Method::Get => self.requests_get += 1,
            crate::http::types::Method::Post => self.requests_post += 1,
            _ => {}
        }
    }

    /// Renders the human-readable shutdown report.
    pub fn report(&self) -> String {
        format!(
            "=== Proxy Statistics ===\n\
             Total connections:   {}\n\
             Active connections:  {}\n\
             Bytes received:      {}\n\
             Bytes sent:          {}\n\
             Errors:              {}\n\
             Requests total:      {}\n\
             Requests GET:        {}\n\
             Requests POST:       {}\n\
             Requests malformed:  {}\n\
             Keep-alive reused:   {}\n\
             ========================",
            self.total_connections,
            self.active_connections,
            self.bytes_received,
            self.bytes_sent,
            self.errors,
            self.requests_total,
            self.requests_get,
            self.requests_post,
            self.requests_error,
            self.keep_alive_reused,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_method_buckets_get_and_post() {
        let mut stats = Stats::default();
        stats.record_method(crate::http::types::Method::Get);
        stats.record_method(crate::http::types::Method::Post);
        stats.record_method(crate::http::types::Method::Put);
        assert_eq!(stats.requests_total, 3);
        assert_eq!(stats.requests_get, 1);
        assert_eq!(stats.requests_post, 1);
    }

    #[test]
    fn report_contains_every_field_label() {
        let report = Stats::default().report();
        for label in [
            "Total connections",
            "Active connections",
            "Bytes received",
            "Bytes sent",
            "Errors",
            "Requests total",
            "Keep-alive reused",
        ] {
            assert!(report.contains(label), "missing {label}");
        }
    }
}
