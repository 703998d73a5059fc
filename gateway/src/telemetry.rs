use metrics::{counter, histogram};

use crate::circuit_breaker::CircuitState;

pub struct GatewayTelemetry;

impl GatewayTelemetry {
    pub fn record_call(model: &str, operation: &'static str, status: &'static str) {
        counter!(
            "gateway_calls_total",
            "model" => model.to_string(),
            "operation" => operation,
            "status" => status
        )
        .increment(1);
    }

    pub fn record_latency(model: &str, operation: &'static str, duration_ms: f64) {
        histogram!(
            "gateway_call_duration_ms",
            "model" => model.to_string(),
            "operation" => operation
        )
        .record(duration_ms);
    }

    pub fn record_transition(circuit: &str, to: CircuitState) {
        counter!(
            "circuit_breaker_transitions_total",
            "circuit" => circuit.to_string(),
            "to" => to.as_str()
        )
        .increment(1);
    }

    pub fn record_rejection(circuit: &str) {
        counter!("circuit_breaker_rejections_total", "circuit" => circuit.to_string())
            .increment(1);
    }
}
