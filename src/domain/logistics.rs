// src/domain/logistics.rs

use crate::domain::extract::{ActionTokens, ExtractError};
use crate::domain::ingest::{Field, IngestError, Params};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const VOCABULARY: &[&str] = &[
    "load-truck",
    "unload-truck",
    "load-airplane",
    "unload-airplane",
    "drive-truck",
    "fly-airplane",
];

const PACKAGE_KEYS: &[&str] = &[
    "obj", "object", "package", "pkg", "p", "item", "package_name", "obj_name",
];
const TRUCK_KEYS: &[&str] = &["truck", "vehicle", "t", "truck_name", "veh"];
const AIRPLANE_KEYS: &[&str] = &["airplane", "plane", "a", "airplane_name", "aircraft"];
const LOCATION_KEYS: &[&str] = &[
    "loc", "location", "l", "at", "place", "loc_name", "location_name",
];
const FROM_KEYS: &[&str] = &["from", "source", "origin", "loc_from", "from_loc", "start"];
const TO_KEYS: &[&str] = &["to", "dest", "destination", "target", "loc_to", "to_loc", "end"];
const CITY_KEYS: &[&str] = &["city", "c", "city_name"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum LogisticsAction {
    LoadTruck { package: String, truck: String, location: String },
    UnloadTruck { package: String, truck: String, location: String },
    LoadAirplane { package: String, airplane: String, location: String },
    UnloadAirplane { package: String, airplane: String, location: String },
    DriveTruck { truck: String, from: String, to: String, city: String },
    FlyAirplane { airplane: String, from: String, to: String },
}

impl LogisticsAction {
    pub fn name(&self) -> &'static str {
        match self {
            LogisticsAction::LoadTruck { .. } => "load-truck",
            LogisticsAction::UnloadTruck { .. } => "unload-truck",
            LogisticsAction::LoadAirplane { .. } => "load-airplane",
            LogisticsAction::UnloadAirplane { .. } => "unload-airplane",
            LogisticsAction::DriveTruck { .. } => "drive-truck",
            LogisticsAction::FlyAirplane { .. } => "fly-airplane",
        }
    }

    fn arguments(&self) -> Vec<&str> {
        let fields: Vec<&String> = match self {
            LogisticsAction::LoadTruck { package, truck, location }
            | LogisticsAction::UnloadTruck { package, truck, location } => {
                vec![package, truck, location]
            }
            LogisticsAction::LoadAirplane { package, airplane, location }
            | LogisticsAction::UnloadAirplane { package, airplane, location } => {
                vec![package, airplane, location]
            }
            LogisticsAction::DriveTruck { truck, from, to, city } => vec![truck, from, to, city],
            LogisticsAction::FlyAirplane { airplane, from, to } => vec![airplane, from, to],
        };
        fields.into_iter().map(String::as_str).collect()
    }

    pub(crate) fn from_params(kind: &str, params: &Params<'_>) -> Result<Self, IngestError> {
        const PACKAGE: Field = ("package", PACKAGE_KEYS);
        const TRUCK: Field = ("truck", TRUCK_KEYS);
        const AIRPLANE: Field = ("airplane", AIRPLANE_KEYS);
        const LOCATION: Field = ("location", LOCATION_KEYS);
        const FROM: Field = ("from", FROM_KEYS);
        const TO: Field = ("to", TO_KEYS);
        const CITY: Field = ("city", CITY_KEYS);
        Ok(match kind {
            "load-truck" => {
                let [package, truck, location] =
                    params.resolve("load-truck", [PACKAGE, TRUCK, LOCATION])?;
                LogisticsAction::LoadTruck { package, truck, location }
            }
            "unload-truck" => {
                let [package, truck, location] =
                    params.resolve("unload-truck", [PACKAGE, TRUCK, LOCATION])?;
                LogisticsAction::UnloadTruck { package, truck, location }
            }
            "load-airplane" => {
                let [package, airplane, location] =
                    params.resolve("load-airplane", [PACKAGE, AIRPLANE, LOCATION])?;
                LogisticsAction::LoadAirplane { package, airplane, location }
            }
            "unload-airplane" => {
                let [package, airplane, location] =
                    params.resolve("unload-airplane", [PACKAGE, AIRPLANE, LOCATION])?;
                LogisticsAction::UnloadAirplane { package, airplane, location }
            }
            "drive-truck" => {
                let [truck, from, to, city] =
                    params.resolve("drive-truck", [TRUCK, FROM, TO, CITY])?;
                LogisticsAction::DriveTruck { truck, from, to, city }
            }
            "fly-airplane" => {
                let [airplane, from, to] = params.resolve("fly-airplane", [AIRPLANE, FROM, TO])?;
                LogisticsAction::FlyAirplane { airplane, from, to }
            }
            other => return Err(IngestError::UnknownActionType(other.to_string())),
        })
    }

    pub(crate) fn from_tokens(tokens: &ActionTokens, line: &str) -> Result<Self, ExtractError> {
        let (action, arity) = match tokens.name.as_str() {
            "load-truck" => ("load-truck", 3),
            "unload-truck" => ("unload-truck", 3),
            "load-airplane" => ("load-airplane", 3),
            "unload-airplane" => ("unload-airplane", 3),
            "drive-truck" => ("drive-truck", 4),
            "fly-airplane" => ("fly-airplane", 3),
            _ => return Err(ExtractError::UnknownAction(line.trim().to_string())),
        };
        let args = tokens.expect_arity(action, arity, line)?.to_vec();
        let mut args = args.into_iter();
        let mut next = || args.next().unwrap_or_default();
        Ok(match action {
            "load-truck" => LogisticsAction::LoadTruck { package: next(), truck: next(), location: next() },
            "unload-truck" => LogisticsAction::UnloadTruck { package: next(), truck: next(), location: next() },
            "load-airplane" => LogisticsAction::LoadAirplane { package: next(), airplane: next(), location: next() },
            "unload-airplane" => LogisticsAction::UnloadAirplane { package: next(), airplane: next(), location: next() },
            "drive-truck" => LogisticsAction::DriveTruck { truck: next(), from: next(), to: next(), city: next() },
            _ => LogisticsAction::FlyAirplane { airplane: next(), from: next(), to: next() },
        })
    }
}

impl fmt::Display for LogisticsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {})", self.name(), self.arguments().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::extract::parse_action_line;
    use crate::domain::ingest::action_from_node;
    use crate::domain::{Action, DomainTag};
    use crate::model::ActionNode;

    #[test]
    fn aliased_params_render_in_signature_order() {
        let node = ActionNode::new("n1", "LoadTruck")
            .with_param("location", "L1")
            .with_param("package", "P1")
            .with_param("vehicle", "T1");
        let action = action_from_node(DomainTag::Logistics, &node).unwrap();
        assert_eq!(action.to_string(), "(load-truck p1 t1 l1)");
    }

    #[test]
    fn drive_truck_needs_a_city() {
        let node = ActionNode::new("n1", "drive_truck")
            .with_param("truck", "t1")
            .with_param("from", "l1")
            .with_param("to", "l2");
        assert_eq!(
            action_from_node(DomainTag::Logistics, &node),
            Err(IngestError::MissingParam {
                action: "drive-truck",
                param: "city"
            })
        );
    }

    #[test]
    fn lines_round_back_into_actions() {
        let action = parse_action_line(DomainTag::Logistics, "(fly-airplane a1 l1 l2)").unwrap();
        assert_eq!(
            action,
            Action::Logistics(LogisticsAction::FlyAirplane {
                airplane: "a1".into(),
                from: "l1".into(),
                to: "l2".into()
            })
        );
    }
}
