// file: src/utils/telemetry.rs
// description: Health checks for the hosted endpoints and operation timing
// reference: used by the verify command and the ingestion pipeline

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "✓",
            HealthStatus::Degraded => "⚠",
            HealthStatus::Unhealthy => "✗",
        }
    }
}

/// Result of probing one component (LLM endpoint, embedder, index, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthCheck {
    pub fn healthy(component: &str, response_time: Duration) -> Self {
        Self::with_status(component, HealthStatus::Healthy, None, response_time)
    }

    pub fn degraded(component: &str, message: String, response_time: Duration) -> Self {
        Self::with_status(component, HealthStatus::Degraded, Some(message), response_time)
    }

    pub fn unhealthy(component: &str, message: String, response_time: Duration) -> Self {
        Self::with_status(component, HealthStatus::Unhealthy, Some(message), response_time)
    }

    /// Healthy with `detail` on success, unhealthy with the error otherwise.
    pub fn from_result<T, E: std::fmt::Display>(
        component: &str,
        result: std::result::Result<T, E>,
        detail: impl FnOnce(&T) -> String,
        response_time: Duration,
    ) -> Self {
        match result {
            Ok(value) => {
                let mut check = Self::healthy(component, response_time);
                check.message = Some(detail(&value));
                check
            }
            Err(e) => Self::unhealthy(component, e.to_string(), response_time),
        }
    }

    fn with_status(
        component: &str,
        status: HealthStatus,
        message: Option<String>,
        response_time: Duration,
    ) -> Self {
        Self {
            component: component.to_string(),
            status,
            message,
            response_time_ms: response_time.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub timestamp: u64,
    pub version: String,
}

impl HealthReport {
    pub fn new(checks: Vec<HealthCheck>, version: String) -> Self {
        let overall_status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            overall_status,
            checks,
            timestamp: chrono::Utc::now().timestamp().max(0) as u64,
            version,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == HealthStatus::Healthy
    }

    pub fn format(&self) -> String {
        let mut output = format!(
            "{} paper_rag health: {:?}\n\
             Version: {}\n\
             Timestamp: {}\n\n",
            self.overall_status.icon(),
            self.overall_status,
            self.version,
            chrono::DateTime::from_timestamp(self.timestamp as i64, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        for check in &self.checks {
            output.push_str(&format!(
                "{} {} ({:?}) - {}ms",
                check.status.icon(),
                check.component,
                check.status,
                check.response_time_ms
            ));

            if let Some(ref msg) = check.message {
                output.push_str(&format!("\n  {}", msg));
            }

            output.push('\n');
        }

        output
    }
}

pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        info!("Starting: {}", operation);
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Completed: {} in {:.2}s",
            self.operation,
            elapsed.as_secs_f64()
        );
        elapsed
    }

    pub fn finish_with_count(self, count: usize, unit: &str) -> Duration {
        let elapsed = self.elapsed();
        let secs = elapsed.as_secs_f64();
        info!(
            "Completed: {} - {} {} in {:.2}s ({:.2} {}/sec)",
            self.operation,
            count,
            unit,
            secs,
            if secs > 0.0 { count as f64 / secs } else { 0.0 },
            unit
        );
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_report_overall_status() {
        let checks = vec![
            HealthCheck::healthy("config", Duration::from_millis(1)),
            HealthCheck::degraded(
                "api key",
                "not set".to_string(),
                Duration::from_millis(0),
            ),
        ];

        let report = HealthReport::new(checks, "0.1.0".to_string());
        assert_eq!(report.overall_status, HealthStatus::Degraded);
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_from_result() {
        let ok: Result<usize, String> = Ok(3);
        let check = HealthCheck::from_result(
            "llm",
            ok,
            |n| format!("{} models", n),
            Duration::from_millis(12),
        );
        assert_eq!(check.status, HealthStatus::Healthy);
        assert_eq!(check.message.as_deref(), Some("3 models"));

        let err: Result<usize, String> = Err("401 Unauthorized".to_string());
        let check = HealthCheck::from_result("llm", err, |_| String::new(), Duration::ZERO);
        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert_eq!(check.message.as_deref(), Some("401 Unauthorized"));
    }

    #[test]
    fn test_report_format_lists_components() {
        let report = HealthReport::new(
            vec![HealthCheck::unhealthy(
                "embedding endpoint",
                "connection refused".to_string(),
                Duration::from_millis(5),
            )],
            "0.1.0".to_string(),
        );
        let text = report.format();
        assert!(text.contains("✗ embedding endpoint (Unhealthy) - 5ms"));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.finish_with_count(4, "chunks") >= Duration::from_millis(10));
    }
}
