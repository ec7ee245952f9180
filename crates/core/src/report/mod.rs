//! Report assembly.
//!
//! Records and results are rendered into a [`TsvReport`] after the run has
//! finished, then written to disk in one go.

mod tsv;

pub use tsv::{ReportError, TsvReport};

use crate::processor::{StagingResult, STAGING_REPORT_HEADER};
use crate::reconcile::{ReconciliationRecord, RECONCILE_REPORT_HEADER};

/// Builds the reconciliation report, one line per record.
pub fn reconciliation_report(records: &[ReconciliationRecord]) -> TsvReport {
    let mut report = TsvReport::new(&RECONCILE_REPORT_HEADER);
    for record in records {
        report.append_unchecked(&record.to_row());
    }
    report
}

/// Builds the staging report, one line per row.
pub fn staging_report(results: &[StagingResult]) -> TsvReport {
    let mut report = TsvReport::new(&STAGING_REPORT_HEADER);
    for result in results {
        report.append_unchecked(&result.to_row());
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_report_lines() {
        let results = vec![
            StagingResult {
                row_index: 0,
                worker_id: 1,
                component_id: "cuid001".to_string(),
                result: "staged 2 files (10 bytes) to /staging/cuid001".to_string(),
                error: String::new(),
            },
            StagingResult {
                row_index: 1,
                worker_id: 2,
                component_id: "cuid002".to_string(),
                result: "failed: io".to_string(),
                error: "Source package not found: /sip/cuid002".to_string(),
            },
        ];

        let report = staging_report(&results);

        assert_eq!(report.rows(), 2);
        assert_eq!(
            report.as_str(),
            "worker_id\tcomponent_id\tresult\terror\n\
             1\tcuid001\tstaged 2 files (10 bytes) to /staging/cuid001\t\n\
             2\tcuid002\tfailed: io\tSource package not found: /sip/cuid002\n"
        );
    }
}
