use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identity of a syllabus record: (semester, category, course).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub semester: String,
    pub category: String,
    pub course: String,
}

impl RecordKey {
    pub fn new(
        semester: impl Into<String>,
        category: impl Into<String>,
        course: impl Into<String>,
    ) -> Self {
        Self {
            semester: semester.into(),
            category: category.into(),
            course: course.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.semester, self.category, self.course)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: RecordKey,
    /// Upload date as shown by the portal. Informational only.
    pub uploaded: String,
}

impl Record {
    pub fn semester(&self) -> &str {
        &self.key.semester
    }

    pub fn category(&self) -> &str {
        &self.key.category
    }

    pub fn course(&self) -> &str {
        &self.key.course
    }
}

/// Deduplicated download plan.
///
/// Keys are unique; re-inserting a key replaces the upload date and keeps the
/// record at its original position, so iteration follows first-seen order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkList {
    records: Vec<Record>,
    #[serde(skip)]
    index: HashMap<RecordKey, usize>,
}

impl WorkList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update. Returns `true` when the key was new.
    pub fn upsert(&mut self, key: RecordKey, uploaded: impl Into<String>) -> bool {
        let uploaded = uploaded.into();
        if let Some(&pos) = self.index.get(&key) {
            self.records[pos].uploaded = uploaded;
            return false;
        }
        self.index.insert(key.clone(), self.records.len());
        self.records.push(Record { key, uploaded });
        true
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.index.get(key).map(|&pos| &self.records[pos])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Group records by semester, semesters in first-seen order.
    pub fn by_semester(&self) -> Vec<SemesterGroup<'_>> {
        let mut groups: Vec<SemesterGroup<'_>> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for record in &self.records {
            let pos = *positions.entry(record.semester()).or_insert_with(|| {
                groups.push(SemesterGroup {
                    semester: record.semester(),
                    records: Vec::new(),
                });
                groups.len() - 1
            });
            groups[pos].records.push(record);
        }
        groups
    }
}

impl<'de> Deserialize<'de> for WorkList {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            records: Vec<Record>,
        }
        let raw = Raw::deserialize(deserializer)?;
        let mut list = WorkList::new();
        for record in raw.records {
            list.upsert(record.key, record.uploaded);
        }
        Ok(list)
    }
}

#[derive(Debug, Clone)]
pub struct SemesterGroup<'a> {
    pub semester: &'a str,
    pub records: Vec<&'a Record>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    RowNotFound,
    Error(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::RowNotFound => f.write_str("Row not found in re-scan"),
            FailureReason::Error(msg) => f.write_str(msg),
        }
    }
}

/// A course that could not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub semester: String,
    pub category: String,
    pub course: String,
    pub reason: FailureReason,
}

impl FailureEntry {
    pub fn new(record: &Record, reason: FailureReason) -> Self {
        Self {
            semester: record.semester().to_string(),
            category: record.category().to_string(),
            course: record.course().to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_keeps_key_unique_last_date_wins() {
        let mut list = WorkList::new();
        assert!(list.upsert(RecordKey::new("Fall 2024", "Core", "CS101"), "2024-08-01"));
        assert!(list.upsert(RecordKey::new("Fall 2024", "Elective", "CS101"), "2024-08-02"));
        assert!(!list.upsert(RecordKey::new("Fall 2024", "Core", "CS101"), "2024-09-01"));

        assert_eq!(list.len(), 2);
        let rec = list.get(&RecordKey::new("Fall 2024", "Core", "CS101")).unwrap();
        assert_eq!(rec.uploaded, "2024-09-01");
        // Re-sighting keeps the first position.
        assert_eq!(list.iter().next().unwrap().category(), "Core");
    }

    #[test]
    fn test_group_by_semester_first_seen_order() {
        let mut list = WorkList::new();
        list.upsert(RecordKey::new("Spring 2025", "Core", "A"), "d1");
        list.upsert(RecordKey::new("Fall 2024", "Core", "B"), "d2");
        list.upsert(RecordKey::new("Spring 2025", "Lab", "C"), "d3");

        let groups = list.by_semester();
        let names: Vec<&str> = groups.iter().map(|g| g.semester).collect();
        assert_eq!(names, vec!["Spring 2025", "Fall 2024"]);
        let courses: Vec<&str> = groups[0].records.iter().map(|r| r.course()).collect();
        assert_eq!(courses, vec!["A", "C"]);
    }

    #[test]
    fn test_work_list_json_roundtrip_rebuilds_index() {
        let mut list = WorkList::new();
        list.upsert(RecordKey::new("Fall 2024", "Core", "CS101"), "2024-09-01");
        let json = serde_json::to_string(&list).unwrap();
        let back: WorkList = serde_json::from_str(&json).unwrap();
        assert!(back.get(&RecordKey::new("Fall 2024", "Core", "CS101")).is_some());
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(FailureReason::RowNotFound.to_string(), "Row not found in re-scan");
        assert_eq!(FailureReason::Error("HTTP 404".into()).to_string(), "HTTP 404");
    }
}
