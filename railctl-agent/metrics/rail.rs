metric_enum! {
    /// Per-rail gauges exported by `railctl serve`
    pub enum RailMetric {
        Selector => "rail_selector": "Selector code currently programmed",
        Voltage => "rail_voltage_microvolts": "Output voltage of the programmed selector",
        Enabled => "rail_enabled": "1 if the rail's enable bit is set (absent for always-on rails)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_unique() {
        let mut names: Vec<_> = RailMetric::all().iter().map(|m| m.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RailMetric::all().len());
        assert!(names.iter().all(|n| n.starts_with("rail_")));
    }
}
