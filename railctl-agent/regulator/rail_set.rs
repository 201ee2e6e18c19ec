use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use railctl_raw::RailSetSpec;

use crate::common::{CalibrationStore, RegisterPort};
use crate::error::{RailError, Result};
use crate::regulator::calibration::CalibrationHook;
use crate::regulator::control::{Rail, RailStatus};

/// A set of rails sharing one register port
///
/// [`RailSet::new`] validates the set without touching hardware.
/// [`RailSet::bring_up`] then runs the calibration hook, which lives on this
/// instance: however many callers bring the set up, concurrently or not, the
/// trim is programmed at most once. Rails are reachable only after a
/// successful bring-up, so a failed calibration leaves none of them usable.
pub struct RailSet {
    spec: &'static RailSetSpec,
    port: Arc<dyn RegisterPort>,
    hook: Option<CalibrationHook>,
    ready: AtomicBool,
}

impl RailSet {
    pub fn new(spec: &'static RailSetSpec, port: Arc<dyn RegisterPort>) -> Result<Self> {
        spec.validate()?;

        Ok(Self {
            spec,
            port,
            hook: spec.calibration.map(CalibrationHook::new),
            ready: AtomicBool::new(false),
        })
    }

    /// Calibrate, then make every rail usable
    ///
    /// A second bring-up of a calibrated set fails with
    /// [`RailError::AlreadyCalibrated`] and leaves the trim alone. Sets
    /// without a calibration step may be brought up repeatedly.
    pub fn bring_up(&self, store: &dyn CalibrationStore) -> Result<()> {
        tracing::info!(
            "Bringing up {} ({} rails) on {}",
            self.spec.match_key,
            self.spec.rails.len(),
            self.port.name()
        );

        if let Some(hook) = &self.hook {
            hook.run(self.port.as_ref(), store).map_err(|e| {
                tracing::error!("Calibration of {} failed: {}", hook.spec().cell, e);
                e
            })?;
        }

        for rail in self.spec.rails {
            tracing::info!(
                "Registered rail {} ({} ladder, {}..={} uV, {})",
                rail.name,
                rail.ladder.name(),
                rail.ladder.min_uv(),
                rail.ladder.max_uv()?,
                rail.capabilities().names().join("/")
            );
        }

        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    pub fn match_key(&self) -> &'static str {
        self.spec.match_key
    }

    pub fn spec(&self) -> &'static RailSetSpec {
        self.spec
    }

    pub fn port(&self) -> &Arc<dyn RegisterPort> {
        &self.port
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_calibrated(&self) -> bool {
        self.hook.as_ref().is_some_and(|hook| hook.has_run())
    }

    fn check_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(RailError::NotBroughtUp(self.spec.match_key.to_string()))
        }
    }

    /// Rails in declaration order
    pub fn rails(&self) -> Result<impl Iterator<Item = Rail<'_>> + '_> {
        self.check_ready()?;
        Ok(self
            .spec
            .rails
            .iter()
            .map(move |desc| Rail::new(desc, self.port.as_ref())))
    }

    pub fn rail(&self, name: &str) -> Result<Rail<'_>> {
        self.check_ready()?;
        self.spec
            .rail(name)
            .map(|desc| Rail::new(desc, self.port.as_ref()))
            .ok_or_else(|| RailError::UnknownRail(name.to_string()))
    }

    pub fn status(&self) -> Result<Vec<RailStatus>> {
        self.rails()?.map(|rail| rail.status()).collect()
    }
}

impl std::fmt::Debug for RailSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RailSet")
            .field("match_key", &self.spec.match_key)
            .field("port", &self.port.name())
            .field("ready", &self.is_ready())
            .field("calibrated", &self.is_calibrated())
            .finish()
    }
}
