use prometheus::{IntGaugeVec, Opts, Registry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::metrics::RailMetric;
use crate::regulator::RailSet;

pub struct RailMetricExporter {
    rail_set: Arc<RailSet>,
    registry: Arc<Registry>,
    gauges: HashMap<RailMetric, IntGaugeVec>,
}

impl RailMetricExporter {
    pub fn new(rail_set: Arc<RailSet>) -> Result<Self> {
        let mut exporter = Self {
            rail_set,
            registry: Arc::new(Registry::new()),
            gauges: HashMap::new(),
        };

        exporter.register_metrics()?;

        Ok(exporter)
    }

    fn register_metrics(&mut self) -> Result<()> {
        for &metric in RailMetric::all() {
            let opts = Opts::new(metric.name(), metric.help())
                .const_label("rail_set", self.rail_set.match_key());
            let gauge = IntGaugeVec::new(opts, &["rail", "supply"])?;
            self.registry.register(Box::new(gauge.clone()))?;
            self.gauges.insert(metric, gauge);
        }

        Ok(())
    }

    fn set(&self, metric: RailMetric, rail: &str, supply: &str, value: i64) {
        if let Some(gauge) = self.gauges.get(&metric) {
            gauge.with_label_values(&[rail, supply]).set(value);
        }
    }

    /// Drop a series so a stale sample is not reported
    fn clear(&self, metric: RailMetric, rail: &str, supply: &str) {
        if let Some(gauge) = self.gauges.get(&metric) {
            // Absent series are not an error here
            let _ = gauge.remove_label_values(&[rail, supply]);
        }
    }

    /// Sample every rail once
    pub fn collect(&self) {
        let rails = match self.rail_set.rails() {
            Ok(rails) => rails,
            Err(e) => {
                tracing::error!("Cannot sample {}: {}", self.rail_set.match_key(), e);
                return;
            }
        };

        for rail in rails {
            let supply = rail.descriptor().supply_name;
            match rail.status() {
                Ok(status) => {
                    self.set(
                        RailMetric::Selector,
                        status.name,
                        supply,
                        i64::from(status.selector),
                    );
                    match status.voltage_uv {
                        Some(uv) => self.set(RailMetric::Voltage, status.name, supply, i64::from(uv)),
                        None => self.clear(RailMetric::Voltage, status.name, supply),
                    }
                    if let Some(enabled) = status.enabled {
                        self.set(RailMetric::Enabled, status.name, supply, i64::from(enabled));
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to read state of rail {}: {}", rail.name(), e);
                    for &metric in RailMetric::all() {
                        self.clear(metric, rail.name(), supply);
                    }
                }
            }
        }
    }

    async fn collect_loop(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        tracing::warn!("Starting rail export loop for {}", self.rail_set.match_key());

        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.collect(),
                _ = cancel.cancelled() => {
                    tracing::info!("Rail export loop cancelled");
                    break;
                }
            }
        }
    }

    pub fn start(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).collect_loop(interval, cancel))
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
}
