//! Event filter.
//!
//! The model's own `Other` verdict is the only noise gate. There is no
//! confidence threshold, no duplicate suppression across polls and no
//! cooldown: a truck idling at the gate for three polls is logged three times.

use crate::classify::{ClassificationResult, VehicleType};

/// True when the classification describes a vehicle worth logging.
pub fn is_reportable(result: &ClassificationResult) -> bool {
    result.vehicle_type != VehicleType::Other
}
