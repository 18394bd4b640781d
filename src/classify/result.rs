use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

/// Lowercase and drop separators so "Dump Truck", "DUMP_TRUCK" and
/// "dumptruck" compare equal.
fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-' | '/' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Declares a closed vocabulary the model must answer with.
///
/// The first label is the canonical spelling written to the ledger; any
/// further spellings are accepted on input.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $variant:ident => $label:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $name {
            $( $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Canonical label, as the model is instructed to spell it.
            pub fn label(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(raw: &str) -> anyhow::Result<Self> {
                let token = normalize_token(raw);
                $(
                    if token == normalize_token($label)
                        $(|| token == normalize_token($alias))*
                    {
                        return Ok($name::$variant);
                    }
                )+
                Err(anyhow!(
                    "unknown {} value '{}'",
                    stringify!($name),
                    raw
                ))
            }
        }

        impl TryFrom<String> for $name {
            type Error = anyhow::Error;

            fn try_from(raw: String) -> anyhow::Result<Self> {
                raw.parse()
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.label()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

vocabulary! {
    /// Vehicle category. `Other` marks non-vehicle motion and is discarded.
    VehicleType {
        DumpTruck => "Dump Truck" | "Dump",
        Pickup => "Pickup" | "Pickup Truck",
        Car => "Car",
        Motorcycle => "Motorcycle" | "Motorbike",
        Other => "Other",
    }
}

vocabulary! {
    /// Travel direction relative to the camera.
    Direction {
        Entering => "ENTERING",
        Exiting => "EXITING",
    }
}

vocabulary! {
    TarpStatus {
        Yes => "YES",
        No => "NO",
        Partial => "PARTIAL",
        NotApplicable => "N/A" | "Not Applicable",
    }
}

vocabulary! {
    LoadStatus {
        Loaded => "Loaded",
        Empty => "Empty",
        Unknown => "Unknown",
    }
}

/// Structured output of the vision model for one frame.
///
/// Field names match the JSON object the model is asked to return; the
/// material description travels as `load_desc`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub vehicle_type: VehicleType,
    pub color: String,
    pub direction: Direction,
    pub plate: String,
    pub tarp_status: TarpStatus,
    pub load_status: LoadStatus,
    #[serde(
        rename = "load_desc",
        alias = "load_description",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub load_description: String,
}

/// Models sometimes answer `null` for a field they have nothing to say about.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl ClassificationResult {
    /// Trim free-text fields and apply the documented placeholders.
    pub(crate) fn normalized(mut self) -> Self {
        self.color = placeholder_if_blank(&self.color, "Unknown");
        self.plate = placeholder_if_blank(&self.plate, "?");
        self.load_description = self.load_description.trim().to_string();
        self
    }
}

fn placeholder_if_blank(value: &str, placeholder: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder.to_string()
    } else {
        trimmed.to_string()
    }
}
