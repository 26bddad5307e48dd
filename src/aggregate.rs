use indexmap::IndexMap;
use tracing::debug;

use crate::extract::RowRecord;
use crate::models::{Course, CourseKey};

/// Courses of a crawl keyed by (code, term), in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct AggregationTable {
    courses: IndexMap<CourseKey, Course>,
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one row into the table.
    ///
    /// The first row seen for a key creates the course and fixes its name and
    /// department; later rows only append a section. Rows are not deduplicated,
    /// feeding the same row twice yields two identical sections.
    pub fn ingest(&mut self, record: &RowRecord, term: &str, department: &str) {
        let key = CourseKey::new(&record.course_code, term);
        let section = record.to_section();

        match self.courses.get_mut(&key) {
            Some(course) => {
                if course.department != department {
                    debug!(
                        course = %key,
                        first_department = %course.department,
                        department = %department,
                        "Course seen again under another department"
                    );
                }
                course.sections.push(section);
                debug!(course = %key, crn = %record.crn, "Section appended");
            }
            None => {
                let course = Course::new(
                    record.course_code.clone(),
                    record.course_name.clone(),
                    term.to_string(),
                    department.to_string(),
                    section,
                );
                debug!(course = %key, crn = %record.crn, "Course created");
                self.courses.insert(key, course);
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &CourseKey) -> Option<&Course> {
        self.courses.get(key)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn section_count(&self) -> usize {
        self.courses.values().map(|c| c.sections.len()).sum()
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    /// Distinct terms present, in first-seen order.
    pub fn terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = Vec::new();
        for key in self.courses.keys() {
            if !terms.contains(&key.term.as_str()) {
                terms.push(&key.term);
            }
        }
        terms
    }
}
