//! Human-readable report rendering
//!
//! One section per service, one line per step with a colored glyph, then a
//! summary block with counts and a drill-down list of failures. Rendering
//! is pure string building so the output can be asserted on in tests.

use preflight_core::ServiceRun;
use schema::{Outcome, ProbeRecord, Report};

/// Green check mark
pub const PASS: &str = "\x1b[92m\u{2713}\x1b[0m";
/// Red cross
pub const FAIL: &str = "\x1b[91m\u{2717}\x1b[0m";
/// Yellow warning sign
pub const SKIP: &str = "\x1b[93m\u{26a0}\x1b[0m";

const RULE_WIDTH: usize = 52;

/// Opening banner
pub fn banner() -> String {
    let bar = "\u{2550}".repeat(RULE_WIDTH - 2);
    format!(
        "\u{2554}{bar}\u{2557}\n\u{2551}{:^width$}\u{2551}\n\u{255a}{bar}\u{255d}\n",
        "Preflight Connection Tests",
        width = RULE_WIDTH - 2,
    )
}

/// One service section: header, underline, one line per record
pub fn section(run: &ServiceRun) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(&run.service);
    out.push('\n');
    out.push_str(&"\u{2500}".repeat(run.service.chars().count()));
    out.push('\n');
    for record in &run.records {
        out.push_str(&line(record));
    }
    out
}

fn line(record: &ProbeRecord) -> String {
    match record.outcome.outcome {
        Outcome::Passed if record.outcome.detail.is_empty() => {
            format!("  {} {}\n", PASS, record.step)
        }
        Outcome::Passed => format!("  {} {}: {}\n", PASS, record.step, record.outcome.detail),
        Outcome::Failed => format!("  {} {}: {}\n", FAIL, record.step, record.outcome.detail),
        Outcome::Skipped => format!(
            "  {} {}: skipped \u{2014} {}\n",
            SKIP, record.step, record.outcome.detail
        ),
    }
}

/// Trailing summary with counts, failures, and the readiness verdict
pub fn summary(report: &Report) -> String {
    let bar = "\u{2550}".repeat(RULE_WIDTH);
    let mut out = String::new();
    out.push('\n');
    out.push_str(&bar);
    out.push_str("\n  SUMMARY\n");
    out.push_str(&bar);
    out.push('\n');

    out.push_str(&format!("  {} Passed:  {}\n", PASS, report.passed()));
    if report.failed() > 0 {
        out.push_str(&format!("  {} Failed:  {}\n", FAIL, report.failed()));
    }
    if report.skipped() > 0 {
        out.push_str(&format!("  {} Skipped: {}\n", SKIP, report.skipped()));
    }
    out.push('\n');

    if report.ready() {
        out.push_str("  All checks passed. The stack is ready to come up.\n");
    } else {
        out.push_str("  Failed checks:\n");
        for record in report.failures() {
            out.push_str(&format!(
                "    {} {}: {}\n",
                FAIL,
                record.label(),
                record.outcome.detail
            ));
        }
        out.push('\n');
        out.push_str("  Fix the failures above before bringing the stack up.\n");
    }

    out
}
