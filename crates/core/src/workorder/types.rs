//! Work order rows.

use serde::{Deserialize, Serialize};

use super::ParseError;

/// Header names of the work order columns, in export order.
pub const WORK_ORDER_COLUMNS: [&str; 8] = [
    "Resource ID",
    "Ref ID",
    "URI",
    "Container Indicator 1",
    "Container Indicator 2",
    "Container Indicator 3",
    "Title",
    "Component ID",
];

/// One archival object listed in a work order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkOrderRow {
    pub resource_id: String,
    pub ref_id: String,
    /// Archival object URI, e.g. `/repositories/2/archival_objects/100`.
    pub uri: String,
    pub container_indicator_1: String,
    pub container_indicator_2: String,
    pub container_indicator_3: String,
    pub title: String,
    /// Component id the linked digital object is expected to carry.
    pub component_id: String,
}

/// An ordered, immutable list of work order rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkOrder {
    rows: Vec<WorkOrderRow>,
}

impl WorkOrder {
    /// Builds a work order from already-validated rows.
    pub fn from_rows(rows: Vec<WorkOrderRow>) -> Self {
        Self { rows }
    }

    /// Parses a tab-separated work order export.
    ///
    /// The first non-blank line is the header; columns are located by name
    /// so column order and extra columns do not matter. Rows keep file order.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let text =
            std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidEncoding("Work order"))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty());

        let (header_line, header) = lines.next().ok_or(ParseError::Empty("Work order"))?;
        let header = split_fields(header, header_line)?;

        let mut positions = [0usize; WORK_ORDER_COLUMNS.len()];
        for (slot, name) in positions.iter_mut().zip(WORK_ORDER_COLUMNS) {
            *slot = header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or(ParseError::MissingColumn(name))?;
        }

        let mut rows = Vec::new();
        for (line, content) in lines {
            let fields = split_fields(content, line)?;
            if fields.len() < header.len() {
                return Err(ParseError::ShortRow {
                    line,
                    expected: header.len(),
                    found: fields.len(),
                });
            }

            let field = |col: usize| fields[positions[col]].trim().to_string();
            let row = WorkOrderRow {
                resource_id: field(0),
                ref_id: field(1),
                uri: field(2),
                container_indicator_1: field(3),
                container_indicator_2: field(4),
                container_indicator_3: field(5),
                title: field(6),
                component_id: field(7),
            };

            if row.uri.is_empty() {
                return Err(ParseError::EmptyUri { line });
            }
            rows.push(row);
        }

        Ok(Self { rows })
    }

    /// Rows in file order.
    pub fn rows(&self) -> &[WorkOrderRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Splits one tab-separated line, unquoting `"..."` fields.
fn split_fields(line: &str, line_no: usize) -> Result<Vec<String>, ParseError> {
    let mut fields = Vec::new();
    for raw in line.split('\t') {
        fields.push(raw.to_string());
    }

    // Quoted fields may themselves contain tabs; rejoin them.
    let mut merged: Vec<String> = Vec::with_capacity(fields.len());
    let mut pending: Option<String> = None;
    for field in fields {
        match pending.take() {
            Some(mut open) => {
                open.push('\t');
                open.push_str(&field);
                if closes_quote(&field) {
                    merged.push(unquote(&open));
                } else {
                    pending = Some(open);
                }
            }
            None if field.starts_with('"') && !(field.len() > 1 && closes_quote(&field[1..])) => {
                pending = Some(field);
            }
            None if field.starts_with('"') => merged.push(unquote(&field)),
            None => merged.push(field),
        }
    }

    if pending.is_some() {
        return Err(ParseError::UnterminatedQuote { line: line_no });
    }
    Ok(merged)
}

/// Whether `s` ends with an odd run of quotes, i.e. a closing quote.
fn closes_quote(s: &str) -> bool {
    let trailing = s.chars().rev().take_while(|c| *c == '"').count();
    trailing % 2 == 1
}

fn unquote(field: &str) -> String {
    field[1..field.len() - 1].replace("\"\"", "\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Resource ID\tRef ID\tURI\tContainer Indicator 1\tContainer Indicator 2\tContainer Indicator 3\tTitle\tComponent ID";

    fn work_order(body: &str) -> String {
        format!("{}\n{}", HEADER, body)
    }

    #[test]
    fn test_parse_rows_in_file_order() {
        let text = work_order(
            "MSS.318\tref1\t/repositories/2/archival_objects/100\t1\t\t\tLetters\tABC123\n\
             MSS.318\tref2\t/repositories/2/archival_objects/101\t1\t2\t\tDiaries\tABC124\n",
        );
        let wo = WorkOrder::parse(text.as_bytes()).unwrap();
        assert_eq!(wo.len(), 2);
        assert_eq!(wo.rows()[0].uri, "/repositories/2/archival_objects/100");
        assert_eq!(wo.rows()[0].component_id, "ABC123");
        assert_eq!(wo.rows()[1].container_indicator_2, "2");
        assert_eq!(wo.rows()[1].title, "Diaries");
    }

    #[test]
    fn test_parse_header_only_is_empty_work_order() {
        let wo = WorkOrder::parse(HEADER.as_bytes()).unwrap();
        assert!(wo.is_empty());
    }

    #[test]
    fn test_parse_empty_input_fails() {
        assert!(matches!(
            WorkOrder::parse(b""),
            Err(ParseError::Empty(_))
        ));
        assert!(matches!(
            WorkOrder::parse(b"\n\n"),
            Err(ParseError::Empty(_))
        ));
    }

    #[test]
    fn test_parse_missing_column_fails() {
        let text = "Resource ID\tRef ID\tURI\tTitle\n";
        let err = WorkOrder::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn("Container Indicator 1")));
    }

    #[test]
    fn test_parse_columns_by_name() {
        let text = "Component ID\tURI\tTitle\tResource ID\tRef ID\tContainer Indicator 1\tContainer Indicator 2\tContainer Indicator 3\tNotes\n\
                    XYZ999\t/repositories/3/archival_objects/9\tPhotos\tR1\tref9\t\t\t\tfragile\n";
        let wo = WorkOrder::parse(text.as_bytes()).unwrap();
        assert_eq!(wo.rows()[0].component_id, "XYZ999");
        assert_eq!(wo.rows()[0].uri, "/repositories/3/archival_objects/9");
    }

    #[test]
    fn test_parse_short_row_fails() {
        let text = work_order("MSS.318\tref1\t/repositories/2/archival_objects/100\n");
        let err = WorkOrder::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::ShortRow { line: 2, .. }));
    }

    #[test]
    fn test_parse_empty_uri_fails() {
        let text = work_order("MSS.318\tref1\t\t1\t\t\tLetters\tABC123\n");
        let err = WorkOrder::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::EmptyUri { line: 2 }));
    }

    #[test]
    fn test_parse_quoted_title_with_tab_and_quotes() {
        let text = work_order(
            "MSS.318\tref1\t/repositories/2/archival_objects/100\t1\t\t\t\"The \"\"Blue\"\"\tBook\"\tABC123\r\n",
        );
        let wo = WorkOrder::parse(text.as_bytes()).unwrap();
        assert_eq!(wo.rows()[0].title, "The \"Blue\"\tBook");
        assert_eq!(wo.rows()[0].component_id, "ABC123");
    }

    #[test]
    fn test_parse_unterminated_quote_fails() {
        let text = work_order("MSS.318\tref1\t/repositories/2/archival_objects/100\t1\t\t\t\"Letters\tABC123\n");
        let err = WorkOrder::parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedQuote { line: 2 }));
    }

    #[test]
    fn test_parse_skips_blank_lines_and_bom() {
        let text = format!(
            "\u{feff}{}\n\nMSS.318\tref1\t/repositories/2/archival_objects/100\t1\t\t\tLetters\tABC123\n\n",
            HEADER
        );
        let wo = WorkOrder::parse(text.as_bytes()).unwrap();
        assert_eq!(wo.len(), 1);
    }
}
