//! CSV decoding of whole reports.

use std::io::Read;

use tracing::debug;

use crate::records::ReportRecord;
use crate::ReportError;

/// Decodes every data row of a report, skipping the header row.
///
/// The header is never checked against the expected column names. The first
/// bad row aborts the load.
///
/// # Errors
///
/// Returns [`ReportError`] on malformed CSV, on a row with the wrong field
/// count, or on an unparseable `analysis_time`.
pub fn load_report<R: ReportRecord, Rd: Read>(reader: Rd) -> Result<Vec<R>, ReportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row.map_err(|source| ReportError::Csv {
            kind: R::KIND,
            source,
        })?;
        let line = row.position().map_or(0, csv::Position::line);
        let fields: Vec<&str> = row.iter().collect();
        let record = R::decode(&fields).map_err(|e| e.at(R::KIND, line))?;
        records.push(record);
    }

    debug!(kind = %R::KIND, rows = records.len(), "report decoded");
    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{PrincipalAccessSummary, Resource, ResourceAccessSummary};
    use vigil_core::ReportKind;

    const RESOURCE_HEADER: &str = "analysis_time,resource_name,resource_arn,resource_type,\
resource_tag_business_unit,resource_tag_environment,resource_tag_owner,\
resource_tag_confidentiality,resource_tag_integrity,resource_tag_availability,resource_tags\n";

    fn resource_line(arn: &str) -> String {
        format!(
            "2021-06-11T20:54:08.112773+00:00,logs,{arn},S3Bucket,sec,prod,ops,high,high,low,\"a=1,b=2\"\n"
        )
    }

    fn load_resources(input: &[u8]) -> Result<Vec<Resource>, ReportError> {
        load_report(input)
    }

    // -- load_report tests --------------------------------------------------

    #[test]
    fn skips_header_and_decodes_rows() {
        let input = format!(
            "{RESOURCE_HEADER}{}{}",
            resource_line("arn:aws:s3:::a"),
            resource_line("arn:aws:s3:::b")
        );
        let resources = load_resources(input.as_bytes()).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[1].resource_arn, "arn:aws:s3:::b");
        assert_eq!(resources[0].resource_tags, "a=1,b=2");
    }

    #[test]
    fn header_names_are_not_validated() {
        let input = format!("whatever,the,header,says\n{}", resource_line("arn:x"));
        assert_eq!(load_resources(input.as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn header_only_yields_empty_report() {
        assert!(load_resources(RESOURCE_HEADER.as_bytes()).unwrap().is_empty());
        assert!(load_resources("".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn short_row_aborts_with_line_number() {
        let input = format!(
            "{RESOURCE_HEADER}{}2021-06-11T20:54:08Z,only,three\n",
            resource_line("arn:a")
        );
        match load_resources(input.as_bytes()) {
            Err(ReportError::InvalidRecordShape {
                kind,
                line,
                expected,
                found,
            }) => {
                assert_eq!(kind, ReportKind::Resources);
                assert_eq!(line, 3);
                assert_eq!(expected, 11);
                assert_eq!(found, 3);
            }
            other => panic!("expected shape error, got {other:?}"),
        }
    }

    #[test]
    fn bad_timestamp_aborts_load() {
        let input = format!(
            "{RESOURCE_HEADER}{}",
            resource_line("arn:a").replace("2021-06-11T20:54:08.112773+00:00", "2021-06-11")
        );
        assert!(matches!(
            load_resources(input.as_bytes()),
            Err(ReportError::Timestamp { line: 2, .. })
        ));
    }

    #[test]
    fn unterminated_quote_fails_load() {
        let input = format!("{RESOURCE_HEADER}2021-06-11T20:54:08Z,\"unterminated\n");
        let err = load_resources(input.as_bytes());
        assert!(err.is_err());
    }

    #[test]
    fn row_shape_follows_requested_kind() {
        let input = "h\n2021-06-11T20:54:08Z,s3,logs,arn:aws:s3:::logs,read-data,IAMRole,ops,arn:aws:iam::1:role/ops,high\n";
        let rows = load_report::<ResourceAccessSummary, _>(input.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);

        // Same row, wrong kind: 9 fields where 8 are expected.
        let wrong = load_report::<PrincipalAccessSummary, _>(input.as_bytes());
        assert!(matches!(
            wrong,
            Err(ReportError::InvalidRecordShape { expected: 8, found: 9, .. })
        ));
    }
}
