//! # Command Actions
//!
//! Typed commands derived from a [`MatchResult`]. The workstation operations
//! themselves live outside this service; dispatching an action records it in
//! the log and returns the description sent back to the client.

use crate::intent::parser::MatchResult;
use crate::intent::slots::{SlotExtractor, SlotValue};
use serde::Serialize;

/// Which battery (or batteries) a command refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ids", rename_all = "snake_case")]
pub enum BatteryTarget {
    Single(u64),
    Many(Vec<u64>),
    Unspecified,
}

impl BatteryTarget {
    fn from_slot(value: Option<&SlotValue>) -> Self {
        match value {
            Some(SlotValue::Number(id)) => BatteryTarget::Single(*id),
            Some(SlotValue::Numbers(ids)) => BatteryTarget::Many(ids.clone()),
            _ => BatteryTarget::Unspecified,
        }
    }
}

impl std::fmt::Display for BatteryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatteryTarget::Single(id) => write!(f, "battery {}", id),
            BatteryTarget::Many(ids) => {
                let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
                write!(f, "batteries {}", ids.join(", "))
            }
            BatteryTarget::Unspecified => write!(f, "unspecified battery"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandAction {
    ChargeBattery {
        battery: BatteryTarget,
        series: Option<String>,
    },
    DischargeBattery {
        battery: BatteryTarget,
    },
    CheckResistance {
        battery: BatteryTarget,
    },
    StoreBattery {
        battery: BatteryTarget,
    },
    /// Matched a catalogue intent that has no action attached.
    Unrecognized {
        intent: String,
    },
}

impl CommandAction {
    /// Resolve the action for a match, or `None` when nothing matched.
    ///
    /// Slots are looked up under the names `extractor` reports them with.
    pub fn from_match(result: &MatchResult, extractor: &SlotExtractor) -> Option<Self> {
        let intent = result.intent.as_deref()?;
        let battery = BatteryTarget::from_slot(result.slot(extractor.numeric_slot()));

        let action = match intent {
            "charge_battery" => CommandAction::ChargeBattery {
                battery,
                series: result
                    .slot(extractor.qualifier_slot())
                    .and_then(SlotValue::as_text)
                    .map(str::to_string),
            },
            "discharge_battery" => CommandAction::DischargeBattery { battery },
            "check_resistance" => CommandAction::CheckResistance { battery },
            "store_battery" => CommandAction::StoreBattery { battery },
            other => CommandAction::Unrecognized {
                intent: other.to_string(),
            },
        };
        Some(action)
    }

    pub fn describe(&self) -> String {
        match self {
            CommandAction::ChargeBattery { battery, series: Some(series) } => {
                format!("Charging {} (series {})", battery, series)
            }
            CommandAction::ChargeBattery { battery, series: None } => format!("Charging {}", battery),
            CommandAction::DischargeBattery { battery } => format!("Discharging {}", battery),
            CommandAction::CheckResistance { battery } => format!("Checking resistance of {}", battery),
            CommandAction::StoreBattery { battery } => format!("Storing {}", battery),
            CommandAction::Unrecognized { intent } => format!("No action registered for intent '{}'", intent),
        }
    }

    /// Record the action and return its description.
    pub fn dispatch(&self) -> String {
        let description = self.describe();
        match self {
            CommandAction::Unrecognized { intent } => {
                tracing::warn!(intent = %intent, "Matched intent has no action")
            }
            _ => tracing::info!("Executing command: {}", description),
        }
        description
    }
}
