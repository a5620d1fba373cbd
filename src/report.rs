//! Machine-readable summary of a completed session

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordinator::CentralSummary;
use crate::error::{Error, Result};
use crate::peer::ExternalSummary;
use crate::protocol::{ExternalId, NUM_EXTERNALS};

/// Final value of one external as it saw the session end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalReport {
    pub index: ExternalId,
    pub initial: f32,
    #[serde(rename = "final")]
    pub final_value: f32,
    pub rounds: u64,
}

/// Everything worth keeping from one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rounds: u64,
    pub initial_central: f32,
    pub final_central: f32,
    pub externals: Vec<ExternalReport>,
}

impl SessionReport {
    /// Assemble a report from the central's summary and the externals' summaries
    pub fn new(
        started_at: DateTime<Utc>,
        initial_central: f32,
        initial_externals: [f32; NUM_EXTERNALS],
        central: &CentralSummary,
        externals: &[ExternalSummary],
    ) -> Self {
        let mut externals: Vec<ExternalReport> = externals
            .iter()
            .map(|e| ExternalReport {
                index: e.index,
                initial: initial_externals[e.index.slot()],
                final_value: e.final_external,
                rounds: e.rounds,
            })
            .collect();
        externals.sort_by_key(|e| e.index);

        Self {
            session_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            rounds: central.rounds,
            initial_central,
            final_central: central.final_central,
            externals,
        }
    }

    /// Largest gap between the central and any external at the end
    pub fn spread(&self) -> f32 {
        self.externals
            .iter()
            .map(|e| (e.final_value - self.final_central).abs())
            .fold(0.0, f32::max)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON, creating parent directories
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| Error::IoWrite {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        fs::write(path, self.to_json()?).map_err(|source| Error::IoWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}
