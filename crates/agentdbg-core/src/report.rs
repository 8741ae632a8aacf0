use serde::Serialize;

use crate::{DiagnosticResponse, DiagnosticStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    Healthy,
    Fair,
    Critical,
}

impl HealthBand {
    pub fn from_score(score: u32) -> Self {
        match score {
            80.. => HealthBand::Healthy,
            60..=79 => HealthBand::Fair,
            _ => HealthBand::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pass: usize,
    pub warning: usize,
    pub issue: usize,
}

pub fn status_counts(results: &DiagnosticResponse) -> StatusCounts {
    results
        .diagnostics
        .iter()
        .fold(StatusCounts::default(), |mut acc, d| {
            match d.status {
                DiagnosticStatus::Pass => acc.pass += 1,
                DiagnosticStatus::Warning => acc.warning += 1,
                DiagnosticStatus::Issue => acc.issue += 1,
            }
            acc
        })
}

/// Plain-text report: score, numbered recommendations, numbered priority actions.
pub fn render_report(results: &DiagnosticResponse) -> String {
    let recommendations = results
        .diagnostics
        .iter()
        .enumerate()
        .map(|(i, d)| format!("{}. {}\n   {}", i + 1, d.category, d.recommended_fix))
        .collect::<Vec<_>>()
        .join("\n\n");
    let actions = results
        .priority_actions()
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}. {}", i + 1, a))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "DIAGNOSTIC REPORT\nHealth Score: {}/100\n\nRECOMMENDATIONS:\n{}\n\nPRIORITY ACTIONS:\n{}\n",
        results.overall_health_score, recommendations, actions
    )
}
