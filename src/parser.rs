//! Streaming parser for Jenkins test-report XML.
//!
//! Jenkins serves two structurally different documents from the same
//! `testReport/api/xml` endpoint. Plain jobs produce `<testResult>` with
//! summary counters followed by `<suite>` elements; matrix jobs produce
//! `<matrixTestResult>` whose `<childReport>` children each embed a whole
//! nested report using the very same tag names. The parser is a single
//! forward pass over quick-xml events with explicit context state, so a
//! tag like `name` or `failCount` is only captured in the role its nesting
//! gives it. Memory stays proportional to the retained failing cases, not
//! to the document.

use std::io::BufRead;
use std::num::ParseIntError;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::model::{CaseStatus, TestCase, TestReport};

/// Error from parsing one job's test-report document.
///
/// Either way the document yields no report; callers treat the job as
/// unprocessable instead of acting on partial counts.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not well-formed XML.
    #[error("malformed test report XML")]
    Xml(#[from] quick_xml::Error),
    /// The document ended while elements were still open.
    #[error("test report XML ends inside <{0}>")]
    Truncated(String),
    /// A counter element held text that is not a non-negative integer.
    #[error("invalid value {value:?} in <{field}>")]
    InvalidCount {
        field: &'static str,
        value: String,
        source: ParseIntError,
    },
}

/// Which schema variant the root element announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    /// `<matrixTestResult>`: aggregated counters, then nested child reports.
    Matrix,
    /// `<testResult>`: counters, then flat suite lists.
    Plain,
}

/// The scalar element currently accumulating character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenField {
    // Summary counters, only opened in root context.
    FailCount,
    SkipCount,
    PassCount,
    TotalCount,
    // Case fields, only opened while a case is being built.
    Status,
    Age,
    ClassName,
    MethodName,
    ErrorDetails,
    ErrorStackTrace,
}

fn field_for_tag(tag: &[u8]) -> Option<OpenField> {
    match tag {
        b"failCount" => Some(OpenField::FailCount),
        b"skipCount" => Some(OpenField::SkipCount),
        b"passCount" => Some(OpenField::PassCount),
        b"totalCount" => Some(OpenField::TotalCount),
        b"status" => Some(OpenField::Status),
        b"age" => Some(OpenField::Age),
        b"className" => Some(OpenField::ClassName),
        b"name" => Some(OpenField::MethodName),
        b"errorDetails" => Some(OpenField::ErrorDetails),
        b"errorStackTrace" => Some(OpenField::ErrorStackTrace),
        _ => None,
    }
}

/// Accumulator for the `<case>` element currently being read.
///
/// A fresh accumulator is allocated per case and moved out whole on the
/// closing tag, so field tags seen outside any case (a suite's own `name`,
/// for instance) can never touch an already committed case.
#[derive(Debug, Default)]
struct PendingCase {
    class_name: String,
    method_name: String,
    status: Option<CaseStatus>,
    age: u32,
    error_details: Option<String>,
    error_stack_trace: Option<String>,
}

impl PendingCase {
    fn into_case(self) -> Option<TestCase> {
        let status = self.status?;
        Some(TestCase {
            class_name: self.class_name,
            method_name: self.method_name,
            status,
            age: self.age,
            error_details: self.error_details,
            error_stack_trace: self.error_stack_trace,
        })
    }
}

/// State machine that folds XML events into a [`TestReport`].
#[derive(Debug, Default)]
struct ReportParser {
    report: TestReport,
    variant: Option<Variant>,
    /// Whether summary counters at this nesting level belong to the
    /// document root. Matrix child reports repeat the summary tags and
    /// must not feed the outer totals.
    in_root: bool,
    open: Option<OpenField>,
    case: Option<PendingCase>,
    text: String,
    open_elements: Vec<String>,
}

impl ReportParser {
    fn handle_event(&mut self, event: Event<'_>) -> Result<(), ParseError> {
        match event {
            Event::Start(ref e) => {
                let name = e.name();
                let tag = name.as_ref();
                self.open_elements
                    .push(String::from_utf8_lossy(tag).into_owned());
                self.on_start(tag);
            }
            Event::End(ref e) => {
                self.open_elements.pop();
                self.on_end(e.name().as_ref())?;
            }
            Event::Empty(ref e) => {
                // Start and end in one event, same transitions.
                let name = e.name();
                self.on_start(name.as_ref());
                self.on_end(name.as_ref())?;
            }
            Event::Text(ref e) => {
                if self.open.is_some() {
                    self.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(ref e) => {
                // CDATA sections may interleave with plain text fragments
                // inside one field; both feed the same buffer.
                if self.open.is_some() {
                    self.text.push_str(&String::from_utf8_lossy(e));
                }
            }
            // Comments, declarations and processing instructions carry
            // nothing we track; Eof is handled by the caller.
            _ => {}
        }
        Ok(())
    }

    fn on_start(&mut self, tag: &[u8]) {
        match tag {
            b"matrixTestResult" => {
                self.variant = Some(Variant::Matrix);
                self.in_root = true;
            }
            b"testResult" => {
                self.variant = Some(Variant::Plain);
                self.in_root = true;
            }
            b"childReport" => {
                // Everything below here repeats the report schema for one
                // matrix configuration; only its failing cases matter.
                if self.variant == Some(Variant::Matrix) {
                    self.in_root = false;
                }
            }
            b"suite" => {
                if self.variant == Some(Variant::Plain) {
                    self.in_root = false;
                    // Plain reports carry no totalCount element. Every
                    // summary counter precedes the first suite, so derive
                    // the total here, once.
                    if self.report.total_count == 0 {
                        self.report.total_count = self.report.pass_count
                            + self.report.fail_count
                            + self.report.skip_count;
                    }
                }
            }
            b"case" => self.case = Some(PendingCase::default()),
            b"failCount" if self.in_root => self.open_field(OpenField::FailCount),
            b"skipCount" if self.in_root => self.open_field(OpenField::SkipCount),
            b"passCount" if self.in_root => self.open_field(OpenField::PassCount),
            b"totalCount" if self.in_root => self.open_field(OpenField::TotalCount),
            b"status" if self.case.is_some() => self.open_field(OpenField::Status),
            b"age" if self.case.is_some() => self.open_field(OpenField::Age),
            b"className" if self.case.is_some() => self.open_field(OpenField::ClassName),
            b"name" if self.case.is_some() => self.open_field(OpenField::MethodName),
            b"errorDetails" if self.case.is_some() => self.open_field(OpenField::ErrorDetails),
            b"errorStackTrace" if self.case.is_some() => {
                self.open_field(OpenField::ErrorStackTrace)
            }
            _ => {}
        }
    }

    fn open_field(&mut self, field: OpenField) {
        self.open = Some(field);
        self.text.clear();
    }

    fn on_end(&mut self, tag: &[u8]) -> Result<(), ParseError> {
        match tag {
            b"matrixTestResult" | b"testResult" => self.in_root = false,
            b"case" => {
                if let Some(pending) = self.case.take() {
                    if let Some(case) = pending.into_case() {
                        if case.status.is_failing() {
                            self.report.test_cases.push(case);
                        }
                    }
                }
            }
            _ => {
                if let Some(field) = field_for_tag(tag) {
                    if self.open == Some(field) {
                        self.close_field(field)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn close_field(&mut self, field: OpenField) -> Result<(), ParseError> {
        let text = std::mem::take(&mut self.text);
        self.open = None;
        match field {
            OpenField::FailCount => self.report.fail_count = parse_count("failCount", &text)?,
            OpenField::SkipCount => self.report.skip_count = parse_count("skipCount", &text)?,
            OpenField::PassCount => self.report.pass_count = parse_count("passCount", &text)?,
            OpenField::TotalCount => self.report.total_count = parse_count("totalCount", &text)?,
            OpenField::Status => {
                if let Some(case) = self.case.as_mut() {
                    case.status = Some(CaseStatus::parse(text.trim()));
                }
            }
            OpenField::Age => {
                if let Some(case) = self.case.as_mut() {
                    case.age = parse_count("age", &text)?;
                }
            }
            OpenField::ClassName => {
                if let Some(case) = self.case.as_mut() {
                    case.class_name = text.trim().to_string();
                }
            }
            OpenField::MethodName => {
                if let Some(case) = self.case.as_mut() {
                    case.method_name = text.trim().to_string();
                }
            }
            OpenField::ErrorDetails => {
                if let Some(case) = self.case.as_mut() {
                    case.error_details = Some(text);
                }
            }
            OpenField::ErrorStackTrace => {
                if let Some(case) = self.case.as_mut() {
                    case.error_stack_trace = Some(text);
                }
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<TestReport, ParseError> {
        if let Some(tag) = self.open_elements.pop() {
            return Err(ParseError::Truncated(tag));
        }
        Ok(self.report)
    }
}

fn parse_count(field: &'static str, text: &str) -> Result<u32, ParseError> {
    let value = text.trim();
    value.parse::<u32>().map_err(|source| ParseError::InvalidCount {
        field,
        value: value.to_string(),
        source,
    })
}

/// Parse one job's complete test-report document.
pub fn parse_report<R: BufRead>(input: R) -> Result<TestReport, ParseError> {
    let mut reader = Reader::from_reader(input);

    let mut parser = ReportParser::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            event => parser.handle_event(event)?,
        }
        buf.clear();
    }
    parser.finish()
}

/// Parse a test-report document held in memory.
pub fn parse_report_string(xml: &str) -> Result<TestReport, ParseError> {
    parse_report(xml.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CaseStatus;

    #[test]
    fn test_parse_plain_report() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <testResult>
            <failCount>1</failCount>
            <skipCount>0</skipCount>
            <passCount>3</passCount>
            <suite>
                <case>
                    <className>pkg.Foo</className>
                    <name>testBar</name>
                    <status>FAILED</status>
                </case>
            </suite>
        </testResult>"#;

        let report = parse_report_string(xml).unwrap();
        assert_eq!(report.pass_count, 3);
        assert_eq!(report.fail_count, 1);
        assert_eq!(report.skip_count, 0);
        assert_eq!(report.total_count, 4);
        assert_eq!(report.test_cases.len(), 1);

        let case = &report.test_cases[0];
        assert_eq!(case.class_name, "pkg.Foo");
        assert_eq!(case.method_name, "testBar");
        assert_eq!(case.status, CaseStatus::Failed);
        assert_eq!(case.age, 0);
    }

    #[test]
    fn test_plain_report_keeps_explicit_total() {
        let xml = r#"<testResult>
            <failCount>1</failCount>
            <passCount>3</passCount>
            <totalCount>10</totalCount>
            <suite></suite>
        </testResult>"#;

        let report = parse_report_string(xml).unwrap();
        assert_eq!(report.total_count, 10);
    }

    #[test]
    fn test_summary_counters_after_first_suite_are_ignored() {
        let xml = r#"<testResult>
            <failCount>1</failCount>
            <passCount>2</passCount>
            <skipCount>0</skipCount>
            <suite></suite>
            <failCount>99</failCount>
        </testResult>"#;

        let report = parse_report_string(xml).unwrap();
        assert_eq!(report.fail_count, 1);
        assert_eq!(report.total_count, 3);
    }

    #[test]
    fn test_matrix_report_ignores_child_summaries() {
        let xml = r#"<matrixTestResult>
            <failCount>2</failCount>
            <skipCount>1</skipCount>
            <totalCount>12</totalCount>
            <childReport>
                <child>
                    <url>https://jenkins/job/m/AXIS=linux/</url>
                </child>
                <result>
                    <failCount>1</failCount>
                    <passCount>4</passCount>
                    <skipCount>0</skipCount>
                    <suite>
                        <case>
                            <className>pkg.M</className>
                            <name>testOne</name>
                            <status>FAILED</status>
                            <age>2</age>
                        </case>
                        <name>pkg.M</name>
                    </suite>
                </result>
            </childReport>
            <childReport>
                <result>
                    <failCount>1</failCount>
                    <suite>
                        <case>
                            <className>pkg.M</className>
                            <name>testTwo</name>
                            <status>REGRESSION</status>
                        </case>
                    </suite>
                </result>
            </childReport>
        </matrixTestResult>"#;

        let report = parse_report_string(xml).unwrap();
        assert_eq!(report.fail_count, 2);
        assert_eq!(report.skip_count, 1);
        assert_eq!(report.total_count, 12);
        assert_eq!(report.pass_count, 0);

        let names: Vec<&str> = report
            .test_cases
            .iter()
            .map(|c| c.method_name.as_str())
            .collect();
        assert_eq!(names, vec!["testOne", "testTwo"]);
        assert_eq!(report.test_cases[0].age, 2);
    }

    #[test]
    fn test_only_failing_cases_are_kept() {
        let xml = r#"<testResult>
            <failCount>2</failCount>
            <passCount>2</passCount>
            <skipCount>1</skipCount>
            <suite>
                <case><className>a.A</className><name>ok</name><status>PASSED</status></case>
                <case><className>a.A</className><name>broken</name><status>FAILED</status></case>
                <case/>
                <case><className>a.A</className><name>ignored</name><status>SKIPPED</status></case>
            </suite>
            <suite>
                <case><className>b.B</className><name>relapsed</name><status>REGRESSION</status></case>
                <case><className>b.B</className><name>healed</name><status>FIXED</status></case>
            </suite>
        </testResult>"#;

        let report = parse_report_string(xml).unwrap();
        let names: Vec<&str> = report
            .test_cases
            .iter()
            .map(|c| c.method_name.as_str())
            .collect();
        assert_eq!(names, vec!["broken", "relapsed"]);
    }

    #[test]
    fn test_unknown_status_is_not_failing() {
        let xml = r#"<testResult>
            <failCount>0</failCount>
            <passCount>1</passCount>
            <suite>
                <case><className>a.A</className><name>odd</name><status>FLAKY</status></case>
            </suite>
        </testResult>"#;

        let report = parse_report_string(xml).unwrap();
        assert!(report.test_cases.is_empty());
    }

    #[test]
    fn test_error_text_spans_fragments() {
        let xml = "<testResult><failCount>1</failCount><passCount>0</passCount><suite><case>\
<className>org.Foo</className><name>testBar</name><status>FAILED</status><age>3</age>\
<errorDetails>expected &lt;1&gt; but was: 2</errorDetails>\
<errorStackTrace>java.lang.AssertionError<![CDATA[
at org.Foo.testBar(Foo.java:42)]]></errorStackTrace>\
</case></suite></testResult>";

        let report = parse_report_string(xml).unwrap();
        let case = &report.test_cases[0];
        assert_eq!(case.age, 3);
        assert_eq!(
            case.error_details.as_deref(),
            Some("expected <1> but was: 2")
        );
        assert_eq!(
            case.error_stack_trace.as_deref(),
            Some("java.lang.AssertionError\nat org.Foo.testBar(Foo.java:42)")
        );
    }

    #[test]
    fn test_count_split_by_comment_accumulates() {
        let xml = "<testResult><failCount>4<!-- split -->2</failCount><suite></suite></testResult>";

        let report = parse_report_string(xml).unwrap();
        assert_eq!(report.fail_count, 42);
    }

    #[test]
    fn test_suite_name_does_not_leak_into_cases() {
        let xml = r#"<testResult>
            <failCount>1</failCount>
            <passCount>0</passCount>
            <suite>
                <case><className>pkg.Foo</className><name>testBar</name><status>FAILED</status></case>
                <name>pkg.Foo.Suite</name>
            </suite>
        </testResult>"#;

        let report = parse_report_string(xml).unwrap();
        assert_eq!(report.test_cases.len(), 1);
        assert_eq!(report.test_cases[0].method_name, "testBar");
    }

    #[test]
    fn test_non_numeric_count_is_rejected() {
        let xml = "<testResult><passCount>abc</passCount></testResult>";

        let err = parse_report_string(xml).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidCount {
                field: "passCount",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_count_element_is_rejected() {
        let xml = "<testResult><failCount/></testResult>";

        let err = parse_report_string(xml).unwrap_err();
        assert!(matches!(err, ParseError::InvalidCount { field: "failCount", .. }));
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let xml = "<testResult><skipCount>-1</skipCount></testResult>";

        assert!(parse_report_string(xml).is_err());
    }

    #[test]
    fn test_non_numeric_age_is_rejected() {
        let xml = r#"<testResult>
            <failCount>1</failCount>
            <suite>
                <case><name>t</name><status>FAILED</status><age>three</age></case>
            </suite>
        </testResult>"#;

        let err = parse_report_string(xml).unwrap_err();
        assert!(matches!(err, ParseError::InvalidCount { field: "age", .. }));
    }

    #[test]
    fn test_truncated_document_is_rejected() {
        let xml = "<testResult><failCount>1</failCount><suite><case>";

        assert!(parse_report_string(xml).is_err());
    }

    #[test]
    fn test_mismatched_tags_are_rejected() {
        let xml = "<testResult><suite></case></testResult>";

        assert!(parse_report_string(xml).is_err());
    }

    #[test]
    fn test_unrelated_document_parses_as_empty() {
        let xml = "<html><body>Not a report</body></html>";

        let report = parse_report_string(xml).unwrap();
        assert_eq!(report.total_count, 0);
        assert!(report.test_cases.is_empty());
    }
}
