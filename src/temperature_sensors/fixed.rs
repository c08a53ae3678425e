use anyhow::Result;

use crate::sensors::{Reading, SensorLoader, TemperatureSensor};

/// Reports one constant temperature, for hosts without a matching sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSensor {
    pub celsius: f32,
}

impl TemperatureSensor for FixedSensor {
    fn read_temperature(&self) -> Reading {
        Reading::good(self.celsius)
    }

    fn name(&self) -> String {
        format!("fixed:{}", self.celsius)
    }
}

impl SensorLoader for FixedSensor {
    fn load(&self) -> Result<Box<dyn TemperatureSensor>> {
        Ok(Box::new(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn loads_and_reads_constant() {
        let sensor = FixedSensor { celsius: 42.5 }.load().unwrap();
        assert_eq!(sensor.read_temperature(), Reading::good(42.5));
        assert_eq!(sensor.name(), "fixed:42.5");
    }
}
