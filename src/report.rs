//! Rendering of a finished run, as console lines or JSON.

use colored::{Color, Colorize};
use std::time::Duration;

use crate::config::DiffConfig;
use crate::reconcile::DiffResult;
use crate::sync::SyncStats;

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

fn serialize_opt_duration<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match duration {
        Some(d) => serializer.serialize_some(&d.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

/// Wall-clock time spent in each phase.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PhaseTimings {
    #[serde(serialize_with = "serialize_duration")]
    pub enumerate: Duration,
    #[serde(serialize_with = "serialize_duration")]
    pub compare: Duration,
    /// Shared keys compared per second
    pub compare_rate: f64,
    #[serde(serialize_with = "serialize_opt_duration")]
    pub sync: Option<Duration>,
}

/// Which key listings to print alongside the summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub unique: bool,
    pub shared: bool,
    pub different: bool,
}

impl From<&DiffConfig> for ReportOptions {
    fn from(config: &DiffConfig) -> Self {
        Self {
            unique: config.output_unique,
            shared: config.output_shared,
            different: config.output_different,
        }
    }
}

/// Result of a run plus what it took to get there.
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub result: DiffResult,
    pub sync: Option<SyncStats>,
    pub endpoint_a: String,
    pub endpoint_b: String,
    pub timings: PhaseTimings,
}

impl DiffReport {
    pub fn new(
        result: DiffResult,
        sync: Option<SyncStats>,
        endpoint_a: String,
        endpoint_b: String,
        timings: PhaseTimings,
    ) -> Self {
        Self {
            result,
            sync,
            endpoint_a,
            endpoint_b,
            timings,
        }
    }

    /// Print the report to stdout with colored tags.
    pub fn display(&self, options: ReportOptions) {
        print!("{}", self.render(options, true));
    }

    /// Format the report as plain text string
    pub fn to_plain_text(&self, options: ReportOptions) -> String {
        self.render(options, false)
    }

    fn render(&self, options: ReportOptions, color: bool) -> String {
        let tag = |label: &str, c: Color| -> String {
            let label = format!("[{}]", label);
            if color {
                label.color(c).bold().to_string()
            } else {
                label
            }
        };

        let mut output = String::new();
        let result = &self.result;

        if options.unique {
            for key in &result.unique_to_a {
                output.push_str(&format!("{} -> {} -> {}\n", tag("UNIQUE", Color::Yellow), self.endpoint_a, key));
            }
            for key in &result.unique_to_b {
                output.push_str(&format!("{} -> {} -> {}\n", tag("UNIQUE", Color::Yellow), self.endpoint_b, key));
            }
        }

        if options.shared {
            for key in &result.shared {
                output.push_str(&format!("{} -> {}\n", tag("SHARED", Color::Cyan), key));
            }
        }

        if options.different {
            for key in &result.different {
                output.push_str(&format!("{} -> {}\n", tag("DIFFERENT", Color::Red), key));
            }
            for key in &result.skipped {
                output.push_str(&format!("{} -> {}\n", tag("SKIPPED", Color::Magenta), key));
            }
        }

        let done = tag("DONE", Color::Green);
        output.push_str(&format!(
            "{} {} keys on A, {} keys on B\n",
            done, result.keys_a, result.keys_b
        ));
        output.push_str(&format!(
            "{} checked {} shared keys in {:.2}s ({:.0} keys/s)\n",
            done,
            result.shared.len(),
            self.timings.compare.as_secs_f64(),
            self.timings.compare_rate
        ));
        output.push_str(&format!(
            "{} unique: {} ({} only on A, {} only on B)\n",
            done,
            result.unique_count(),
            result.unique_to_a.len(),
            result.unique_to_b.len()
        ));
        output.push_str(&format!("{} different: {}\n", done, result.different.len()));
        output.push_str(&format!("{} skipped: {}\n", done, result.skipped.len()));

        if let Some(ref stats) = self.sync {
            output.push_str(&format!(
                "{} synced: {} deleted, {} copied, {} overwritten, {} skipped, {} failed\n",
                done, stats.deleted, stats.copied, stats.overwritten, stats.skipped, stats.failed
            ));
        }

        output
    }

    /// Format the report as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(serde::Serialize)]
        struct JsonOutput<'a> {
            metadata: Metadata<'a>,
            summary: Summary,
            unique_to_a: Vec<&'a str>,
            unique_to_b: Vec<&'a str>,
            different: Vec<&'a str>,
            skipped: Vec<&'a str>,
            timings: &'a PhaseTimings,
            #[serde(skip_serializing_if = "Option::is_none")]
            sync: Option<&'a SyncStats>,
        }

        #[derive(serde::Serialize)]
        struct Metadata<'a> {
            timestamp: String,
            endpoint_a: &'a str,
            endpoint_b: &'a str,
        }

        #[derive(serde::Serialize)]
        struct Summary {
            keys_a: usize,
            keys_b: usize,
            shared_count: usize,
            unique_a_count: usize,
            unique_b_count: usize,
            different_count: usize,
            skipped_count: usize,
            clean: bool,
        }

        let result = &self.result;
        let output = JsonOutput {
            metadata: Metadata {
                timestamp: chrono::Utc::now().to_rfc3339(),
                endpoint_a: &self.endpoint_a,
                endpoint_b: &self.endpoint_b,
            },
            summary: Summary {
                keys_a: result.keys_a,
                keys_b: result.keys_b,
                shared_count: result.shared.len(),
                unique_a_count: result.unique_to_a.len(),
                unique_b_count: result.unique_to_b.len(),
                different_count: result.different.len(),
                skipped_count: result.skipped.len(),
                clean: result.is_clean(),
            },
            unique_to_a: result.unique_to_a.iter().map(String::as_str).collect(),
            unique_to_b: result.unique_to_b.iter().map(String::as_str).collect(),
            different: result.different.iter().map(String::as_str).collect(),
            skipped: result.skipped.iter().map(String::as_str).collect(),
            timings: &self.timings,
            sync: self.sync.as_ref(),
        };

        serde_json::to_string_pretty(&output)
    }
}
