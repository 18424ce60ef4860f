//! Dashboard aggregates derived from an organization's candidates.
//!
//! The computations are pure; `MetricsService` only loads the candidate set
//! and fixes the timezone used for week boundaries.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::candidate::Candidate;
use crate::models::stage::Stage;
use crate::services::candidate_service::CandidateService;
use crate::services::filter_compiler::CompiledFilter;
use crate::utils::time::{iso_week_bounds, now};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTotal {
    pub stage: Stage,
    pub label: String,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub total: usize,
    /// One entry per stage, in pipeline order.
    pub stage_totals: Vec<StageTotal>,
    pub new_this_week: usize,
    /// Hired share of all candidates as a whole percentage, rounded half up.
    pub conversion_rate: u32,
}

/// Candidates of one stage, for board rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageGroup {
    pub stage: Stage,
    pub label: String,
    pub candidates: Vec<Candidate>,
}

pub fn compute_metrics(candidates: &[Candidate], now: DateTime<Utc>) -> Metrics {
    compute_metrics_in(candidates, now, Utc.fix())
}

pub fn compute_metrics_in(candidates: &[Candidate], now: DateTime<Utc>, offset: FixedOffset) -> Metrics {
    let mut counts = [0usize; 6];
    for candidate in candidates {
        counts[candidate.stage.index()] += 1;
    }
    let stage_totals = Stage::ALL
        .into_iter()
        .map(|stage| StageTotal {
            stage,
            label: stage.label().to_string(),
            total: counts[stage.index()],
        })
        .collect();

    let (week_start, week_end) = iso_week_bounds(now, offset);
    let new_this_week = candidates
        .iter()
        .filter(|c| c.created_at >= week_start && c.created_at <= week_end)
        .count();

    let total = candidates.len();
    Metrics {
        total,
        stage_totals,
        new_this_week,
        conversion_rate: conversion_rate(counts[Stage::Hired.index()], total),
    }
}

/// `round(hired / total * 100)` with halves rounded up, in integer arithmetic.
fn conversion_rate(hired: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let hired = hired as u64;
    let total = total as u64;
    ((hired * 200 + total) / (2 * total)) as u32
}

/// Splits candidates into the six stage columns, keeping their input order.
pub fn group_by_stage(candidates: &[Candidate]) -> Vec<StageGroup> {
    Stage::ALL
        .into_iter()
        .map(|stage| StageGroup {
            stage,
            label: stage.label().to_string(),
            candidates: candidates.iter().filter(|c| c.stage == stage).cloned().collect(),
        })
        .collect()
}

#[derive(Clone)]
pub struct MetricsService {
    candidates: CandidateService,
    offset: FixedOffset,
}

impl MetricsService {
    pub fn new(candidates: CandidateService, utc_offset_minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            Error::Config(format!("METRICS_UTC_OFFSET_MINUTES out of range: {}", utc_offset_minutes))
        })?;
        Ok(Self { candidates, offset })
    }

    pub async fn organization_metrics(&self, organization_id: Uuid) -> Result<Metrics> {
        let list = self.candidates.list_candidates(organization_id, None).await?;
        Ok(compute_metrics_in(&list.items, now(), self.offset))
    }

    pub async fn organization_board(&self, organization_id: Uuid, filter: Option<&CompiledFilter>) -> Result<Vec<StageGroup>> {
        let list = self.candidates.list_candidates(organization_id, filter).await?;
        Ok(group_by_stage(&list.items))
    }
}
