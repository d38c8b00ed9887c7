//! CSV export and import of the iOverlay driver list.
//!
//! The file has one row per driver with the columns `identifier`, `name`
//! and `tagId`, so it can be edited in a spreadsheet and merged back.

use super::key::DriverKey;
use super::overlay::{DriverTag, OverlaySettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};

/// Columns every import file must have.
pub const CSV_COLUMNS: [&str; 3] = ["identifier", "name", "tagId"];

/// One CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvDriverRecord {
    pub identifier: String,
    pub name: String,
    #[serde(rename = "tagId")]
    pub tag_id: i64,
}

impl From<&DriverTag> for CsvDriverRecord {
    fn from(tag: &DriverTag) -> Self {
        Self {
            identifier: tag.identifier.as_str().to_string(),
            name: tag.name.clone(),
            tag_id: tag.tag_id,
        }
    }
}

/// A row that parsed cleanly, with the line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedDriver {
    pub line: usize,
    pub identifier: DriverKey,
    pub name: String,
    pub tag_id: i64,
}

/// Rows read from an import file.
#[derive(Debug, Default)]
pub struct CsvImport {
    /// Rows that parsed, in file order.
    pub drivers: Vec<ImportedDriver>,
    /// Line number and message for every row that did not.
    pub errors: Vec<(usize, String)>,
}

/// How an import would change the driver list.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// New drivers, in file order.
    pub additions: Vec<DriverTag>,
    /// Rows whose identifier is already tagged in iOverlay.
    pub already_tagged: usize,
    /// Rows repeating an identifier seen earlier in the same file.
    pub repeated: usize,
}

/// Writes `drivers` as CSV with a header row.
///
/// # Errors
///
/// Returns the CSV writer's error if a row cannot be written or flushed.
pub fn export_drivers<'a, W: Write>(
    drivers: impl IntoIterator<Item = &'a DriverTag>,
    writer: W,
) -> csv::Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut count = 0;
    for tag in drivers {
        wtr.serialize(CsvDriverRecord::from(tag))?;
        count += 1;
    }
    // An empty export still gets its header
    if count == 0 {
        wtr.write_record(CSV_COLUMNS)?;
    }
    wtr.flush()?;
    Ok(count)
}

/// Reads CSV rows, collecting a message per bad row instead of stopping.
///
/// Fields are trimmed and columns may come in any order. A missing column is
/// reported once, against line 1.
pub fn import_drivers<R: Read>(reader: R) -> CsvImport {
    let mut result = CsvImport::default();
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    match rdr.headers() {
        Ok(headers) => {
            let missing: Vec<&str> = CSV_COLUMNS
                .iter()
                .copied()
                .filter(|column| !headers.iter().any(|h| h == *column))
                .collect();
            if !missing.is_empty() {
                result
                    .errors
                    .push((1, format!("missing column(s): {}", missing.join(", "))));
                return result;
            }
        }
        Err(e) => {
            result.errors.push((1, format!("unreadable header: {e}")));
            return result;
        }
    }

    for (index, row) in rdr.deserialize::<CsvDriverRecord>().enumerate() {
        let line = index + 2;
        match row {
            Ok(record) => match DriverKey::parse(&record.identifier) {
                Ok(identifier) => result.drivers.push(ImportedDriver {
                    line,
                    identifier,
                    name: record.name,
                    tag_id: record.tag_id,
                }),
                Err(e) => result.errors.push((line, e)),
            },
            Err(e) => result.errors.push((line, e.to_string())),
        }
    }
    result
}

impl OverlaySettings {
    /// Works out which imported rows are new.
    ///
    /// Existing entries are never changed: a row whose identifier is already
    /// tagged is skipped, as is any later row repeating an identifier.
    ///
    /// # Errors
    ///
    /// Returns line number and message for every row whose `tagId` names no
    /// category.
    pub fn plan_import(&self, imported: &[ImportedDriver]) -> Result<MergePlan, Vec<(usize, String)>> {
        let errors: Vec<(usize, String)> = imported
            .iter()
            .filter(|row| !self.categories.iter().any(|c| c.id == row.tag_id))
            .map(|row| (row.line, format!("tagId {} is not an iOverlay category", row.tag_id)))
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }

        let existing: HashSet<&DriverKey> = self.drivers.iter().map(|t| &t.identifier).collect();
        let mut seen = HashSet::new();
        let mut plan = MergePlan::default();
        for row in imported {
            if existing.contains(&row.identifier) {
                plan.already_tagged += 1;
            } else if !seen.insert(&row.identifier) {
                plan.repeated += 1;
            } else {
                plan.additions.push(DriverTag::new(
                    0,
                    row.identifier.clone(),
                    row.name.clone(),
                    row.tag_id,
                ));
            }
        }
        Ok(plan)
    }

    /// Appends `additions` and renumbers ids 1..N.
    pub fn append_drivers(&mut self, additions: Vec<DriverTag>) {
        let mut drivers = std::mem::take(&mut self.drivers);
        drivers.extend(additions);
        self.replace_drivers(drivers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings() -> OverlaySettings {
        OverlaySettings::from_value(json!({"modules": {"drivertagging": {
            "tagcategory": [
                {"id": 1, "name": "Friends"},
                {"id": 2, "name": "CrewChief"}
            ],
            "drivertag": [
                {"id": 1, "identifier": "123456", "name": "Alice", "tagId": 1}
            ]
        }}}))
        .unwrap()
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let overlay = settings();
        let mut out = Vec::new();
        let count = export_drivers(&overlay.drivers, &mut out).unwrap();

        assert_eq!(count, 1);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["identifier,name,tagId", "123456,Alice,1"]);
    }

    #[test]
    fn test_empty_export_keeps_header() {
        let mut out = Vec::new();
        export_drivers(&Vec::<DriverTag>::new(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim_end(), "identifier,name,tagId");
    }

    #[test]
    fn test_names_with_commas_are_quoted() {
        let tag = DriverTag::new(1, DriverKey::from(42), "Doe, Jane", 1);
        let mut out = Vec::new();
        export_drivers([&tag], &mut out).unwrap();

        let back = import_drivers(out.as_slice());
        assert!(back.errors.is_empty());
        assert_eq!(back.drivers[0].name, "Doe, Jane");
    }

    #[test]
    fn test_import_reports_bad_rows_with_line_numbers() {
        let csv = "tagId,identifier,name\n1, 234567 ,Bob\n1,abc,Eve\nx,345678,Carl\n";
        let import = import_drivers(csv.as_bytes());

        assert_eq!(import.drivers.len(), 1);
        assert_eq!(import.drivers[0].identifier.as_str(), "234567");
        assert_eq!(import.drivers[0].line, 2);
        let lines: Vec<usize> = import.errors.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn test_import_requires_all_columns() {
        let import = import_drivers("identifier,name\n123456,Alice\n".as_bytes());
        assert!(import.drivers.is_empty());
        assert_eq!(import.errors.len(), 1);
        assert!(import.errors[0].1.contains("tagId"));
    }

    #[test]
    fn test_plan_import_is_add_only() {
        let overlay = settings();
        let csv = "identifier,name,tagId\n123456,Alice Renamed,2\n234567,Bob,2\n234567,Bob Again,1\n";
        let import = import_drivers(csv.as_bytes());

        let plan = overlay.plan_import(&import.drivers).unwrap();

        assert_eq!(plan.already_tagged, 1);
        assert_eq!(plan.repeated, 1);
        assert_eq!(plan.additions.len(), 1);
        assert_eq!(plan.additions[0].name, "Bob");
        assert_eq!(plan.additions[0].tag_id, 2);
    }

    #[test]
    fn test_plan_import_rejects_unknown_category() {
        let overlay = settings();
        let import = import_drivers("identifier,name,tagId\n234567,Bob,9\n".as_bytes());

        let errors = overlay.plan_import(&import.drivers).unwrap_err();
        assert_eq!(errors, vec![(2, "tagId 9 is not an iOverlay category".to_string())]);
    }

    #[test]
    fn test_append_renumbers() {
        let mut overlay = settings();
        overlay.drivers[0].id = 7;
        overlay.append_drivers(vec![DriverTag::new(0, DriverKey::from(234_567), "Bob", 2)]);

        let ids: Vec<i64> = overlay.drivers.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(overlay.drivers[1].name, "Bob");
    }
}
