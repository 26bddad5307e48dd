use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Start or end time of a section as printed by the portal.
///
/// The portal leaves the time blank for unscheduled sections; those are
/// written out as `-1` so consumers of the exported data can tell them apart
/// from a real time string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassTime {
    Unscheduled,
    At(String),
}

impl ClassTime {
    pub const UNSCHEDULED_SENTINEL: i64 = -1;

    /// Empty text means the section has no scheduled time.
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            ClassTime::Unscheduled
        } else {
            ClassTime::At(raw.to_string())
        }
    }

    pub fn is_unscheduled(&self) -> bool {
        matches!(self, ClassTime::Unscheduled)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClassTime::Unscheduled => None,
            ClassTime::At(time) => Some(time),
        }
    }
}

impl fmt::Display for ClassTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassTime::Unscheduled => write!(f, "{}", Self::UNSCHEDULED_SENTINEL),
            ClassTime::At(time) => f.write_str(time),
        }
    }
}

impl Serialize for ClassTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ClassTime::Unscheduled => serializer.serialize_i64(Self::UNSCHEDULED_SENTINEL),
            ClassTime::At(time) => serializer.serialize_str(time),
        }
    }
}

impl<'de> Deserialize<'de> for ClassTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Sentinel(i64),
            Time(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Sentinel(Self::UNSCHEDULED_SENTINEL) => Ok(ClassTime::Unscheduled),
            Wire::Sentinel(other) => Err(serde::de::Error::custom(format!(
                "unexpected numeric class time {other}"
            ))),
            Wire::Time(time) => Ok(ClassTime::from_raw(&time)),
        }
    }
}

/// One offered section of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub crn: String,
    pub section: String,
    pub instructor: String,
    pub activity: String,
    pub days: String,
    pub location: String,
    pub start_time: ClassTime,
    pub end_time: ClassTime,
    pub status: String,
}

/// A course offered in one term, owning every section seen for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub code: String,
    pub name: String,
    pub term: String,
    pub department: String,
    pub sections: Vec<Section>,
}

impl Course {
    pub fn new(code: String, name: String, term: String, department: String, first: Section) -> Self {
        Self {
            code,
            name,
            term,
            department,
            sections: vec![first],
        }
    }

    pub fn key(&self) -> CourseKey {
        CourseKey::new(&self.code, &self.term)
    }
}

/// Identity of a course within a crawl: the same code in the same term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CourseKey {
    pub code: String,
    pub term: String,
}

impl CourseKey {
    pub fn new(code: &str, term: &str) -> Self {
        Self {
            code: code.to_string(),
            term: term.to_string(),
        }
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.code, self.term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_time_from_raw() {
        assert_eq!(ClassTime::from_raw(""), ClassTime::Unscheduled);
        assert_eq!(ClassTime::from_raw("0800"), ClassTime::At("0800".to_string()));
        assert_eq!(ClassTime::Unscheduled.as_str(), None);
    }

    #[test]
    fn test_class_time_serializes_sentinel() {
        let json = serde_json::to_string(&ClassTime::Unscheduled).unwrap();
        assert_eq!(json, "-1");

        let json = serde_json::to_string(&ClassTime::At("08:00".to_string())).unwrap();
        assert_eq!(json, "\"08:00\"");
    }

    #[test]
    fn test_class_time_deserializes_both_forms() {
        let t: ClassTime = serde_json::from_str("-1").unwrap();
        assert!(t.is_unscheduled());

        let t: ClassTime = serde_json::from_str("\"13:10\"").unwrap();
        assert_eq!(t, ClassTime::At("13:10".to_string()));

        assert!(serde_json::from_str::<ClassTime>("7").is_err());
    }

    #[test]
    fn test_course_keys_do_not_collide_on_concatenation() {
        // "IC" + "S202..." and "ICS" + "202..." would concatenate identically
        let a = CourseKey::new("IC", "S202410");
        let b = CourseKey::new("ICS", "202410");
        assert_ne!(a, b);
    }
}
