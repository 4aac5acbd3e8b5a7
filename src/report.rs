//! Results report
//!
//! Collects the scenario rows of every finalized test into one Markdown
//! table. Only concrete columns are shown, followed by the configured extra
//! report columns, left empty for the operator to fill in.

use std::fmt;

use crate::common::config::Config;
use crate::common::paths::SCENARIO_FILE;
use crate::common::{Error, Result};
use crate::lifecycle::TestTree;
use crate::scenario::{is_concrete_field, ScenarioStore};

/// Tabular view of the results root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Report {
    /// Gather every finalized test of the configured template
    ///
    /// Each result's header must equal the template's header.
    pub fn gather(config: &Config, store: &ScenarioStore) -> Result<Self> {
        let layout = config.layout();
        let schema = layout.scenarios_file(&config.template);
        let template_headers = store.headers(&schema)?;

        let mut headers: Vec<String> = template_headers
            .iter()
            .filter(|h| is_concrete_field(h))
            .cloned()
            .collect();
        for extra in &config.report_headers {
            if !headers.contains(extra) {
                headers.push(extra.clone());
            }
        }

        let mut rows = Vec::new();
        for test_dir in TestTree::new(&layout).completed_tests()? {
            let file = test_dir.join(SCENARIO_FILE);
            if !file.is_file() {
                tracing::warn!("{} has no {}, skipping", test_dir.display(), SCENARIO_FILE);
                continue;
            }
            let records = store.read_rows(&file)?;
            if records.headers() != template_headers.as_slice() {
                return Err(Error::schema(
                    &file,
                    format!(
                        "header {:?} does not match template header {:?}",
                        records.headers(),
                        template_headers
                    ),
                ));
            }
            for record in records {
                let record = record?.concrete();
                rows.push(
                    headers
                        .iter()
                        .map(|h| record.get(h).unwrap_or_default().to_string())
                        .collect(),
                );
            }
        }

        if rows.is_empty() {
            rows.push(vec![String::new(); headers.len()]);
        }
        Ok(Self { headers, rows })
    }

    /// Render as a Markdown pipe table
    pub fn to_markdown(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|c| c.chars().count())
                    .chain([h.chars().count(), 3])
                    .max()
                    .unwrap_or(3)
            })
            .collect();

        write_row(f, &self.headers, &widths)?;
        write!(f, "|")?;
        for width in &widths {
            write!(f, ":{}|", "-".repeat(width + 1))?;
        }
        writeln!(f)?;
        for row in &self.rows {
            write_row(f, row, &widths)?;
        }
        Ok(())
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    write!(f, "|")?;
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or_default();
        write!(f, " {cell:<width$} |")?;
    }
    writeln!(f)
}
