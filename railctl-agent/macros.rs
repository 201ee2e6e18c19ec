//! Declarative macros shared across the railctl agent

/// Define a metric enum carrying each series' name and help text
///
/// # Example
/// ```
/// use railctl::metric_enum;
///
/// metric_enum! {
///     pub enum SupplyMetric {
///         InputVoltage => "supply_input_microvolts": "Voltage at the supply input",
///         Faults => "supply_faults": "Latched fault count",
///     }
/// }
///
/// let metric = SupplyMetric::InputVoltage;
/// assert_eq!(metric.name(), "supply_input_microvolts");
/// assert_eq!(metric.help(), "Voltage at the supply input");
/// assert_eq!(SupplyMetric::all().len(), 2);
/// ```
#[macro_export]
macro_rules! metric_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $str:literal : $help:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            /// Prometheus series name
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn help(&self) -> &'static str {
                match self {
                    $($name::$variant => $help,)*
                }
            }

            /// Every variant in declaration order
            pub fn all() -> &'static [$name] {
                &[$($name::$variant,)*]
            }
        }
    };
}
