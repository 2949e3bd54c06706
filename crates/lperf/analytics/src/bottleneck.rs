use crate::config::{BottleneckConfig, TrendRule, UsageRule, VolatilityRule};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::stats::{self, Descriptive};
use crate::store::SubjectSnapshot;
use chrono::{DateTime, Utc};
use lperf_types::{BottleneckFinding, BottleneckKind, Evidence, Metric, Severity, SubjectId};
use std::collections::BTreeSet;

/// Applies the per-metric rule set to metric series and reports bottlenecks.
pub struct BottleneckDetector {
    config: BottleneckConfig,
}

/// One series under inspection, with its summary computed once.
struct SeriesContext<'a> {
    subject: &'a SubjectId,
    metric: &'a Metric,
    values: &'a [f64],
    summary: Descriptive,
    detected_at: DateTime<Utc>,
}

impl SeriesContext<'_> {
    fn evidence(&self, threshold: f64) -> Evidence {
        Evidence {
            max: self.summary.max,
            min: self.summary.min,
            avg: self.summary.mean,
            variance: None,
            trend: None,
            observed: None,
            threshold,
        }
    }

    fn finding(
        &self,
        kind: BottleneckKind,
        severity: Severity,
        evidence: Evidence,
        periods: BTreeSet<usize>,
        description: String,
    ) -> BottleneckFinding {
        BottleneckFinding {
            subject: self.subject.clone(),
            metric: self.metric.clone(),
            kind,
            severity,
            evidence,
            periods,
            description,
            recommendation: kind.recommendation(self.metric).to_string(),
            detected_at: self.detected_at,
        }
    }
}

impl BottleneckDetector {
    pub fn new(config: BottleneckConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(BottleneckConfig::default())
    }

    pub fn config(&self) -> &BottleneckConfig {
        &self.config
    }

    /// Detect bottlenecks across every series of a snapshot. A series that
    /// cannot be checked is skipped; the others are unaffected.
    pub fn detect(&self, snapshot: &SubjectSnapshot) -> Vec<BottleneckFinding> {
        snapshot
            .iter()
            .filter_map(|(metric, series)| {
                self.detect_metric(&snapshot.subject, metric, &series.values())
                    .ok()
            })
            .flatten()
            .collect()
    }

    /// Detect bottlenecks in one metric series.
    ///
    /// Empty or unsupported series yield no findings. A series containing
    /// non-finite values is rejected with [`AnalyticsError::NonFiniteSeries`].
    pub fn detect_metric(
        &self,
        subject: &SubjectId,
        metric: &Metric,
        values: &[f64],
    ) -> AnalyticsResult<Vec<BottleneckFinding>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::NonFiniteSeries {
                metric: metric.clone(),
            });
        }

        let ctx = SeriesContext {
            subject,
            metric,
            values,
            summary: stats::describe(values),
            detected_at: Utc::now(),
        };
        let rules = &self.config;

        let mut findings = Vec::new();
        match metric {
            Metric::Cpu => {
                findings.extend(self.check_usage(&ctx, &rules.cpu.usage));
                findings.extend(self.check_volatility(&ctx, &rules.cpu.volatility));
                findings.extend(self.check_trend(&ctx, &rules.cpu.trend, Severity::Medium));
            }
            Metric::Memory => {
                findings.extend(self.check_usage(&ctx, &rules.memory.usage));
                findings.extend(self.check_trend(&ctx, &rules.memory.growth, Severity::High));
            }
            Metric::Network => {
                findings.extend(self.check_volatility(&ctx, &rules.network.volatility));
            }
            Metric::Fps => findings.extend(self.check_low_rate(&ctx)),
            Metric::StartupTime => findings.extend(self.check_startup(&ctx)),
            Metric::Battery => findings.extend(self.check_battery_drain(&ctx)),
            Metric::Custom(_) => {}
        }
        Ok(findings)
    }

    /// Samples above the usage threshold.
    fn check_usage(&self, ctx: &SeriesContext<'_>, rule: &UsageRule) -> Option<BottleneckFinding> {
        let periods: BTreeSet<usize> = ctx
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > rule.threshold)
            .map(|(i, _)| i)
            .collect();
        if periods.is_empty() {
            return None;
        }

        let severity = if ctx.summary.max > rule.high_severity_above {
            Severity::High
        } else {
            Severity::Medium
        };
        let description = format!(
            "{} above {} in {} of {} samples (max {:.1})",
            ctx.metric.label(),
            rule.threshold,
            periods.len(),
            ctx.values.len(),
            ctx.summary.max
        );
        Some(ctx.finding(
            BottleneckKind::HighUsage,
            severity,
            ctx.evidence(rule.threshold),
            periods,
            description,
        ))
    }

    /// Population variance above the volatility threshold.
    fn check_volatility(
        &self,
        ctx: &SeriesContext<'_>,
        rule: &VolatilityRule,
    ) -> Option<BottleneckFinding> {
        let variance = ctx.summary.variance;
        if ctx.values.len() < rule.min_samples || variance <= 0.0 || variance <= rule.max_variance {
            return None;
        }

        let mut evidence = ctx.evidence(rule.max_variance);
        evidence.variance = Some(variance);
        let description = format!(
            "{} variance {:.1} exceeds {}",
            ctx.metric.label(),
            variance,
            rule.max_variance
        );
        Some(ctx.finding(
            BottleneckKind::Volatility,
            Severity::Medium,
            evidence,
            BTreeSet::new(),
            description,
        ))
    }

    /// Normalized trend above the growth threshold.
    fn check_trend(
        &self,
        ctx: &SeriesContext<'_>,
        rule: &TrendRule,
        severity: Severity,
    ) -> Option<BottleneckFinding> {
        if ctx.values.len() < rule.min_samples {
            return None;
        }
        let trend = stats::normalized_trend(ctx.values);
        if trend <= 0.0 || trend <= rule.threshold {
            return None;
        }

        let mut evidence = ctx.evidence(rule.threshold);
        evidence.trend = Some(trend);
        let description = format!(
            "{} trending upward (coefficient {:.3} > {})",
            ctx.metric.label(),
            trend,
            rule.threshold
        );
        Some(ctx.finding(
            BottleneckKind::IncreasingTrend,
            severity,
            evidence,
            BTreeSet::new(),
            description,
        ))
    }

    /// Frame rate samples below the floor.
    fn check_low_rate(&self, ctx: &SeriesContext<'_>) -> Option<BottleneckFinding> {
        let rule = &self.config.fps;
        let periods: BTreeSet<usize> = ctx
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v < rule.floor)
            .map(|(i, _)| i)
            .collect();
        if periods.is_empty() {
            return None;
        }

        let severity = if ctx.summary.min < rule.high_severity_below {
            Severity::High
        } else {
            Severity::Medium
        };
        let description = format!(
            "{} below {} in {} of {} samples (min {:.1})",
            ctx.metric.label(),
            rule.floor,
            periods.len(),
            ctx.values.len(),
            ctx.summary.min
        );
        Some(ctx.finding(
            BottleneckKind::LowFrameRate,
            severity,
            ctx.evidence(rule.floor),
            periods,
            description,
        ))
    }

    /// First startup sample slower than the limit.
    fn check_startup(&self, ctx: &SeriesContext<'_>) -> Option<BottleneckFinding> {
        let limit = self.config.startup.slow_after;
        let first = *ctx.values.first()?;
        if first <= limit {
            return None;
        }

        let mut evidence = ctx.evidence(limit);
        evidence.observed = Some(first);
        let description = format!("startup took {:.2}s, limit {}s", first, limit);
        Some(ctx.finding(
            BottleneckKind::SlowStartup,
            Severity::Medium,
            evidence,
            BTreeSet::new(),
            description,
        ))
    }

    /// Battery level dropped by more than the allowed amount.
    fn check_battery_drain(&self, ctx: &SeriesContext<'_>) -> Option<BottleneckFinding> {
        let rule = &self.config.battery;
        if ctx.values.len() < rule.min_samples {
            return None;
        }
        let drain = ctx.values.first()? - ctx.values.last()?;
        if drain <= rule.max_drain {
            return None;
        }

        let mut evidence = ctx.evidence(rule.max_drain);
        evidence.observed = Some(drain);
        let description = format!(
            "battery dropped {:.1} points over {} samples",
            drain,
            ctx.values.len()
        );
        Some(ctx.finding(
            BottleneckKind::HighBatteryDrain,
            Severity::Medium,
            evidence,
            BTreeSet::new(),
            description,
        ))
    }
}

impl Default for BottleneckDetector {
    fn default() -> Self {
        Self::with_defaults()
    }
}
