use crate::error::AdminError;
use crate::helpers::{display_json, secure_filename};
use crate::store::Row;
use crate::view::{ModelView, EXPORT_CSV, EXPORT_JSON};
use chrono::{Local, NaiveDateTime};

pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

pub fn content_type(export_type: &str) -> Result<&'static str, AdminError> {
    match export_type {
        EXPORT_CSV => Ok("text/csv; charset=utf-8"),
        EXPORT_JSON => Ok("application/json"),
        other => Err(AdminError::bad_request(format!("Unsupported export type: {}", other))),
    }
}

pub fn export_filename_at(view: &ModelView, ext: &str, at: NaiveDateTime) -> String {
    secure_filename(&format!("{}_{}.{}", view.identity, at.format(EXPORT_TIMESTAMP_FORMAT), ext))
}

pub fn export_filename(view: &ModelView, ext: &str) -> String {
    export_filename_at(view, ext, Local::now().naive_local())
}

fn cell(value: Option<&serde_json::Value>, pretty: bool) -> String {
    use serde_json::Value as J;
    match value {
        None => String::new(),
        Some(J::Bool(b)) if pretty => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        Some(v @ (J::Array(_) | J::Object(_))) if !pretty => v.to_string(),
        Some(v) => display_json(v),
    }
}

/// Header of column labels, then one record per row.
pub fn export_csv(view: &ModelView, rows: &[Row]) -> Result<Vec<u8>, AdminError> {
    let columns = view.export_columns();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns.iter().map(|c| view.label(c)))?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| cell(row.get(c), view.use_pretty_export)))?;
    }
    writer.into_inner().map_err(|e| AdminError::from(e.into_error()))
}

/// Each row reduced to the export columns.
pub fn json_record(view: &ModelView, columns: &[String], row: &Row) -> serde_json::Value {
    let record: Row = columns
        .iter()
        .map(|c| (view.label(c).to_string(), row.get(c).cloned().unwrap_or(serde_json::Value::Null)))
        .collect();
    serde_json::Value::Object(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, ModelMeta, Relation};
    use chrono::NaiveDate;
    use serde_json::json;

    fn view() -> ModelView {
        let meta = ModelMeta::new("TeamMember", "members")
            .column(Column::integer("id").primary_key())
            .column(Column::text("name"))
            .column(Column::boolean("active"))
            .relation(Relation::one_to_many("tags", "tags", "id", "member_id"));
        ModelView::new(meta).column_list(["id", "name", "active", "tags"]).column_label("name", "Full name")
    }

    fn rows() -> Vec<Row> {
        vec![
            json!({"id": 1, "name": "Ann, Jr.", "active": true, "tags": [{"label": "a"}, {"label": "b"}]}),
            json!({"id": 2, "name": null, "active": false, "tags": []}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    #[test]
    fn plain_csv() {
        let csv = String::from_utf8(export_csv(&view(), &rows()).unwrap()).unwrap();
        assert_eq!(csv, "id,Full name,active,tags\n1,\"Ann, Jr.\",true,\"[{\"\"label\"\":\"\"a\"\"},{\"\"label\"\":\"\"b\"\"}]\"\n2,,false,[]\n");
    }

    #[test]
    fn pretty_csv() {
        let csv = String::from_utf8(export_csv(&view().use_pretty_export(true), &rows()).unwrap()).unwrap();
        assert_eq!(csv, "id,Full name,active,tags\n1,\"Ann, Jr.\",TRUE,\"a,b\"\n2,,FALSE,\n");
    }

    #[test]
    fn filenames_and_types() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap().and_hms_opt(7, 8, 9).unwrap();
        assert_eq!(export_filename_at(&view(), "csv", at), "team-member_2024-05-06_07-08-09.csv");
        assert!(content_type("xlsx").is_err());
        assert_eq!(content_type("json").unwrap(), "application/json");
    }

    #[test]
    fn json_records_use_labels() {
        let v = view();
        let record = json_record(&v, &v.export_columns(), &rows()[1]);
        assert_eq!(record, json!({"id": 2, "Full name": null, "active": false, "tags": []}));
    }
}
