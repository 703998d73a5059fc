use metrics::{counter, histogram};

pub struct ChatTelemetry;

impl ChatTelemetry {
    pub fn record_request(intent: &'static str) {
        counter!("chat_requests_total", "intent" => intent).increment(1);
    }

    pub fn record_duration(intent: &'static str, duration_ms: f64) {
        histogram!("chat_request_duration_ms", "intent" => intent).record(duration_ms);
    }

    pub fn record_stream_error(intent: &'static str) {
        counter!("chat_stream_errors_total", "intent" => intent).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::DebuggingRecorder;

    #[test]
    fn test_chat_metrics_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            ChatTelemetry::record_request("edit");
            ChatTelemetry::record_duration("edit", 420.0);
            ChatTelemetry::record_stream_error("edit");
        });

        assert_eq!(snapshotter.snapshot().into_vec().len(), 3);
    }
}
