use std::sync::atomic::{AtomicBool, Ordering};

use railctl_raw::CalibrationSpec;

use crate::common::{CalibrationStore, RegisterPort};
use crate::error::{RailError, Result};

/// One-shot trim programming for a rail set
///
/// The hook fires at most once per instance. A second `run`, even after the
/// first one failed, returns [`RailError::AlreadyCalibrated`] without touching
/// the store or the port.
#[derive(Debug)]
pub struct CalibrationHook {
    spec: CalibrationSpec,
    fired: AtomicBool,
}

impl CalibrationHook {
    pub fn new(spec: CalibrationSpec) -> Self {
        Self {
            spec,
            fired: AtomicBool::new(false),
        }
    }

    pub fn spec(&self) -> &CalibrationSpec {
        &self.spec
    }

    pub fn has_run(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Read the trim cell and program it, returning the byte written
    pub fn run(&self, port: &dyn RegisterPort, store: &dyn CalibrationStore) -> Result<u8> {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RailError::AlreadyCalibrated(self.spec.cell.to_string()));
        }

        let trim = match store.read_u8(self.spec.cell) {
            Ok(Some(value)) if value != 0 => value,
            Ok(_) => {
                tracing::warn!(
                    "Calibration cell {} not provisioned, using default trim 0x{:02x}",
                    self.spec.cell,
                    self.spec.default_trim
                );
                self.spec.default_trim
            }
            Err(e @ RailError::CalibrationReadError { .. }) => return Err(e),
            Err(e) => {
                return Err(RailError::CalibrationReadError {
                    cell: self.spec.cell.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let field = self.spec.field;
        port.update_bits(field.offset, field.mask, field.encode(u32::from(trim)))?;

        tracing::info!(
            "Programmed {} trim 0x{:02x} into 0x{:03x}",
            self.spec.cell,
            trim,
            field.offset
        );

        Ok(trim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{MemoryPort, StaticStore};
    use railctl_raw::current_soc::analog;

    fn bg_trim_hook() -> CalibrationHook {
        CalibrationHook::new(analog::ANALOG_LDOS.calibration.unwrap())
    }

    #[test]
    fn test_unprovisioned_uses_default() {
        let port = MemoryPort::with_words("test", &[(0x348, 0xC000_3200)]);
        let hook = bg_trim_hook();

        let trim = hook.run(&port, &StaticStore::new()).unwrap();
        assert_eq!(trim, analog::BG_TRIM_DEFAULT);
        assert_eq!(port.peek(0x348), 0xC000_3219);
    }

    #[test]
    fn test_zero_cell_uses_default() {
        let port = MemoryPort::new("test");
        let store = StaticStore::new().with_cell("bg_trim", 0);

        assert_eq!(bg_trim_hook().run(&port, &store).unwrap(), 0x19);
        assert_eq!(port.peek(0x348), 0x19);
    }

    #[test]
    fn test_provisioned_trim_written_exactly() {
        let port = MemoryPort::with_words("test", &[(0x348, 0x8000_10FF)]);
        let store = StaticStore::new().with_cell("bg_trim", 0x1B);

        assert_eq!(bg_trim_hook().run(&port, &store).unwrap(), 0x1B);
        assert_eq!(port.peek(0x348), 0x8000_101B);
    }

    #[test]
    fn test_store_failure_aborts() {
        let port = MemoryPort::with_words("test", &[(0x348, 0x55)]);
        let err = bg_trim_hook()
            .run(&port, &StaticStore::failing("EIO"))
            .unwrap_err();

        assert!(matches!(err, RailError::CalibrationReadError { .. }));
        assert_eq!(port.peek(0x348), 0x55);
    }

    #[test]
    fn test_second_run_refused() {
        let port = MemoryPort::new("test");
        let hook = bg_trim_hook();
        hook.run(&port, &StaticStore::new().with_cell("bg_trim", 0x1A))
            .unwrap();
        assert!(hook.has_run());

        let err = hook
            .run(&port, &StaticStore::new().with_cell("bg_trim", 0x10))
            .unwrap_err();
        assert!(matches!(err, RailError::AlreadyCalibrated(_)));
        assert_eq!(port.peek(0x348), 0x1A);
    }

    #[test]
    fn test_concurrent_runs_fire_once() {
        let port = MemoryPort::new("test");
        let store = StaticStore::new().with_cell("bg_trim", 0x1A);
        let hook = bg_trim_hook();

        let successes = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| hook.run(&port, &store).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(false))
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 1);
    }
}
