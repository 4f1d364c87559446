// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::dataset::{Descriptor, ExampleSource, Requirement};
use crate::error::DataError;

/// Severity level for a verification issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    /// The example can be built but will be degraded, e.g. all padding.
    Warning,
    /// Building the example will fail.
    Error,
}

/// A single verification issue found during checking.
#[derive(Debug, Clone)]
pub struct Issue {
    pub severity: Severity,
    pub category: &'static str,
    pub descriptor: String,
    pub message: String,
}

/// Result of verifying a list of descriptors.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub issues: Vec<Issue>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: VerificationReport) {
        self.issues.extend(other.issues);
    }
}

/// Checks a single requirement without building the example.
pub fn check_requirement(descriptor: &str, requirement: &Requirement) -> Option<Issue> {
    let issue = |severity, category, message| Issue {
        severity,
        category,
        descriptor: descriptor.to_string(),
        message,
    };

    match requirement {
        Requirement::Track {
            loader,
            split,
            track_id,
            start_time,
        } => match loader.track_len(split, track_id) {
            Ok(len) => {
                let start = loader.start_sample(*start_time);
                (start >= len).then(|| {
                    issue(
                        Severity::Warning,
                        "window",
                        format!(
                            "window at {}s starts past the end of {} ({} samples)",
                            start_time,
                            loader.store().locate(split, track_id).display(),
                            len
                        ),
                    )
                })
            }
            Err(e @ DataError::NotFound { .. }) => {
                Some(issue(Severity::Error, "missing-track", e.to_string()))
            }
            Err(e @ DataError::SampleRateMismatch { .. }) => {
                Some(issue(Severity::Error, "sample-rate", e.to_string()))
            }
            Err(e) => Some(issue(Severity::Error, "unreadable-track", e.to_string())),
        },
        Requirement::Archive { kind, path } => (!path.is_file()).then(|| {
            issue(
                Severity::Error,
                "missing-archive",
                format!("{} {} does not exist", kind, path.display()),
            )
        }),
    }
}

/// Checks every descriptor's requirements against the source's inputs.
pub fn verify<S: ExampleSource>(source: &S, descriptors: &[S::Descriptor]) -> VerificationReport {
    let mut report = VerificationReport::default();
    for descriptor in descriptors {
        let name = descriptor.describe();
        report.issues.extend(
            source
                .requirements(descriptor)
                .iter()
                .filter_map(|requirement| check_requirement(&name, requirement)),
        );
    }

    for issue in report.issues.iter().filter(|i| i.severity == Severity::Error) {
        warn!(
            descriptor = issue.descriptor,
            category = issue.category,
            "{}",
            issue.message
        );
    }
    info!(
        descriptors = descriptors.len(),
        issues = report.issues.len(),
        "Verified descriptors."
    );
    report
}

/// Prints a verification report grouped by descriptor.
pub fn print_report(report: &VerificationReport, checked: usize) {
    if report.is_clean() {
        println!(
            "\u{2705} All {} descriptor(s) passed verification.",
            checked
        );
        return;
    }

    let mut by_descriptor: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
    for issue in &report.issues {
        by_descriptor
            .entry(&issue.descriptor)
            .or_default()
            .push(issue);
    }

    for (descriptor, issues) in &by_descriptor {
        let has_errors = issues.iter().any(|i| i.severity == Severity::Error);
        let icon = if has_errors {
            "\u{274c}"
        } else {
            "\u{26a0}\u{fe0f} "
        };
        println!("{} {}", icon, descriptor);
        for issue in issues {
            let severity_icon = match issue.severity {
                Severity::Warning => "\u{26a0}\u{fe0f} ",
                Severity::Error => "\u{274c}",
            };
            println!(
                "   {} [{}] {}",
                severity_icon, issue.category, issue.message
            );
        }
    }

    let clean_count = checked.saturating_sub(by_descriptor.len());
    if clean_count > 0 {
        println!(
            "\n\u{2705} {} descriptor(s) passed all checks.",
            clean_count
        );
    }

    println!(
        "\nSummary: {} issue(s) found across {} descriptor(s).",
        report.issues.len(),
        by_descriptor.len()
    );
}
