use serde::{Deserialize, Serialize};
use std::fmt;

/// Detection class reported by the backend (`event_type` / `object_type`).
///
/// Names outside the known set are kept verbatim in `Other` so text search
/// still sees what the backend sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectKind {
    Motion,
    Person,
    Vehicle,
    Animal,
    Other(String),
}

/// Presentation attributes for a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindDescriptor {
    pub label: &'static str,
    pub glyph: &'static str,
    pub color: &'static str,
}

const DEFAULT_DESCRIPTOR: KindDescriptor = KindDescriptor {
    label: "Detection",
    glyph: "📹",
    color: "gray",
};

impl ObjectKind {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectKind::Motion => "motion",
            ObjectKind::Person => "person",
            ObjectKind::Vehicle => "vehicle",
            ObjectKind::Animal => "animal",
            ObjectKind::Other(name) => name,
        }
    }

    pub fn descriptor(&self) -> KindDescriptor {
        match self {
            ObjectKind::Motion => KindDescriptor {
                label: "Motion",
                glyph: "🏃",
                color: "blue",
            },
            ObjectKind::Person => KindDescriptor {
                label: "Person",
                glyph: "👤",
                color: "yellow",
            },
            ObjectKind::Vehicle => KindDescriptor {
                label: "Vehicle",
                glyph: "🚗",
                color: "purple",
            },
            ObjectKind::Animal => KindDescriptor {
                label: "Animal",
                glyph: "🐾",
                color: "green",
            },
            ObjectKind::Other(_) => DEFAULT_DESCRIPTOR,
        }
    }
}

impl From<String> for ObjectKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "motion" => ObjectKind::Motion,
            "person" => ObjectKind::Person,
            "vehicle" => ObjectKind::Vehicle,
            "animal" => ObjectKind::Animal,
            _ => ObjectKind::Other(name),
        }
    }
}

impl From<&str> for ObjectKind {
    fn from(name: &str) -> Self {
        ObjectKind::from(name.to_string())
    }
}

impl From<ObjectKind> for String {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
