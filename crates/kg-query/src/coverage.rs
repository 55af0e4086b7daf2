//! Coverage and gap analysis over active graph rows.
//!
//! Every analysis accepts an optional company: entities whose `company`
//! property names a different company are skipped, entities without one are
//! always counted.

use std::collections::{BTreeMap, HashMap};

use kg_core::entities::Entity;
use kg_core::enums::{EntityType, RelationshipType};
use kg_db::repos::EntityFilter;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::QueryEngine;
use crate::dependencies::DependencyReport;
use crate::error::QueryError;

const RISK_WEIGHT: f64 = 0.40;
const TESTING_WEIGHT: f64 = 0.35;
const OWNERSHIP_WEIGHT: f64 = 0.25;

// ---------------------------------------------------------------------------
// Report payloads
// ---------------------------------------------------------------------------

/// Identity of an entity as it appears in a report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EntitySummary {
    pub entity_key: String,
    pub source_name: String,
    pub label: String,
}

impl From<&Entity> for EntitySummary {
    fn from(entity: &Entity) -> Self {
        Self {
            entity_key: entity.entity_key.clone(),
            source_name: entity.source.name.clone(),
            label: entity.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RiskCoverageEntry {
    pub risk: EntitySummary,
    /// Keys of the controls mitigating this risk, in link order.
    pub control_keys: Vec<String>,
}

/// Risks bucketed by how many controls mitigate them: none, one, or several.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RiskCoverage {
    pub total_risks: usize,
    pub fully_covered: usize,
    pub partially_covered: usize,
    pub uncovered: usize,
    /// Share of risks with at least one control, 0-100.
    pub coverage_percentage: f64,
    pub uncovered_risks: Vec<RiskCoverageEntry>,
    pub partially_covered_risks: Vec<RiskCoverageEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ControlTestingEntry {
    pub control: EntitySummary,
    pub is_key_control: bool,
    pub evidence_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ControlTesting {
    pub total_controls: usize,
    pub tested: usize,
    pub untested: usize,
    pub key_controls_untested: usize,
    pub testing_coverage_percentage: f64,
    pub untested_controls: Vec<ControlTestingEntry>,
    /// Untested key controls.
    pub critical_gaps: Vec<ControlTestingEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct OwnerWorkload {
    pub owner_key: String,
    pub control_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Ownership {
    pub total_controls: usize,
    pub owned: usize,
    pub unowned: usize,
    pub ownership_coverage_percentage: f64,
    pub unowned_controls: Vec<EntitySummary>,
    /// Owners by number of owned controls, busiest first.
    pub owner_workload: Vec<OwnerWorkload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct OrphanedEntities {
    pub orphaned_by_type: BTreeMap<String, Vec<EntitySummary>>,
    pub total_orphaned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::A
        } else if score >= 80.0 {
            Self::B
        } else if score >= 70.0 {
            Self::C
        } else if score >= 60.0 {
            Self::D
        } else {
            Self::F
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Recommendation {
    pub area: String,
    pub priority: Priority,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ScoreBreakdown {
    pub risk_coverage: f64,
    pub testing_coverage: f64,
    pub ownership_coverage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ComplianceScore {
    pub overall_score: f64,
    pub grade: Grade,
    pub breakdown: ScoreBreakdown,
    pub recommendations: Vec<Recommendation>,
}

impl ComplianceScore {
    /// Weighted 40/35/25 score over the three coverage percentages.
    #[must_use]
    pub fn from_breakdown(breakdown: ScoreBreakdown) -> Self {
        let overall = round2(
            breakdown.ownership_coverage.mul_add(
                OWNERSHIP_WEIGHT,
                breakdown.testing_coverage.mul_add(
                    TESTING_WEIGHT,
                    breakdown.risk_coverage * RISK_WEIGHT,
                ),
            ),
        );
        Self {
            overall_score: overall,
            grade: Grade::from_score(overall),
            breakdown,
            recommendations: recommendations(&breakdown),
        }
    }
}

/// Every analysis in one payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CoverageReport {
    pub compliance_score: ComplianceScore,
    pub risk_coverage: RiskCoverage,
    pub control_testing: ControlTesting,
    pub ownership: Ownership,
    pub orphaned_entities: OrphanedEntities,
    pub dependencies: DependencyReport,
}

// ---------------------------------------------------------------------------
// Analyses
// ---------------------------------------------------------------------------

impl QueryEngine<'_> {
    /// # Errors
    ///
    /// Returns `QueryError::Database` if a read fails.
    pub async fn analyze_risk_coverage(
        &self,
        company: Option<&str>,
    ) -> Result<RiskCoverage, QueryError> {
        let risks = self.active_of_type(EntityType::Risk, company).await?;
        let mitigators = self
            .sources_by_target(RelationshipType::Mitigates)
            .await?;

        let mut report = RiskCoverage {
            total_risks: risks.len(),
            ..RiskCoverage::default()
        };
        for risk in &risks {
            let control_keys = mitigators.get(&risk.entity_key).cloned().unwrap_or_default();
            let entry = RiskCoverageEntry {
                risk: EntitySummary::from(risk),
                control_keys,
            };
            match entry.control_keys.len() {
                0 => report.uncovered_risks.push(entry),
                1 => report.partially_covered_risks.push(entry),
                _ => report.fully_covered += 1,
            }
        }
        report.uncovered = report.uncovered_risks.len();
        report.partially_covered = report.partially_covered_risks.len();
        report.coverage_percentage = percentage(
            report.fully_covered + report.partially_covered,
            report.total_risks,
        );
        Ok(report)
    }

    /// # Errors
    ///
    /// Returns `QueryError::Database` if a read fails.
    pub async fn analyze_control_testing(
        &self,
        company: Option<&str>,
    ) -> Result<ControlTesting, QueryError> {
        let controls = self.active_of_type(EntityType::Control, company).await?;
        let evidence = self.sources_by_target(RelationshipType::Tests).await?;

        let mut report = ControlTesting {
            total_controls: controls.len(),
            ..ControlTesting::default()
        };
        for control in &controls {
            let evidence_keys = evidence.get(&control.entity_key).cloned().unwrap_or_default();
            if !evidence_keys.is_empty() {
                report.tested += 1;
                continue;
            }
            let entry = ControlTestingEntry {
                control: EntitySummary::from(control),
                is_key_control: is_key_control(control),
                evidence_keys,
            };
            if entry.is_key_control {
                report.critical_gaps.push(entry.clone());
            }
            report.untested_controls.push(entry);
        }
        report.untested = report.untested_controls.len();
        report.key_controls_untested = report.critical_gaps.len();
        report.testing_coverage_percentage = percentage(report.tested, report.total_controls);
        Ok(report)
    }

    /// # Errors
    ///
    /// Returns `QueryError::Database` if a read fails.
    pub async fn analyze_ownership(&self, company: Option<&str>) -> Result<Ownership, QueryError> {
        let controls = self.active_of_type(EntityType::Control, company).await?;
        let owners = self.sources_by_target(RelationshipType::Owns).await?;

        let mut report = Ownership {
            total_controls: controls.len(),
            ..Ownership::default()
        };
        let mut workload: BTreeMap<String, usize> = BTreeMap::new();
        for control in &controls {
            match owners.get(&control.entity_key) {
                Some(keys) if !keys.is_empty() => {
                    report.owned += 1;
                    for owner in keys {
                        *workload.entry(owner.clone()).or_default() += 1;
                    }
                }
                _ => report.unowned_controls.push(EntitySummary::from(control)),
            }
        }
        report.unowned = report.unowned_controls.len();
        report.ownership_coverage_percentage = percentage(report.owned, report.total_controls);

        report.owner_workload = workload
            .into_iter()
            .map(|(owner_key, control_count)| OwnerWorkload {
                owner_key,
                control_count,
            })
            .collect();
        // Stable sort keeps key order among equal counts.
        report
            .owner_workload
            .sort_by(|a, b| b.control_count.cmp(&a.control_count));
        Ok(report)
    }

    /// Active entities with no relationships, grouped by storage type name.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Database` if the read fails.
    pub async fn find_orphaned_entities(&self) -> Result<OrphanedEntities, QueryError> {
        let orphans = self.service().list_orphaned_entities().await?;
        let mut report = OrphanedEntities {
            total_orphaned: orphans.len(),
            ..OrphanedEntities::default()
        };
        for entity in &orphans {
            report
                .orphaned_by_type
                .entry(entity.entity_type.as_str().to_string())
                .or_default()
                .push(EntitySummary::from(entity));
        }
        Ok(report)
    }

    /// # Errors
    ///
    /// Returns `QueryError::Database` if a read fails.
    pub async fn get_compliance_score(
        &self,
        company: Option<&str>,
    ) -> Result<ComplianceScore, QueryError> {
        let risk = self.analyze_risk_coverage(company).await?;
        let testing = self.analyze_control_testing(company).await?;
        let ownership = self.analyze_ownership(company).await?;
        Ok(ComplianceScore::from_breakdown(ScoreBreakdown {
            risk_coverage: risk.coverage_percentage,
            testing_coverage: testing.testing_coverage_percentage,
            ownership_coverage: ownership.ownership_coverage_percentage,
        }))
    }

    /// # Errors
    ///
    /// Returns `QueryError::Database` if a read fails.
    pub async fn get_full_analysis(
        &self,
        company: Option<&str>,
    ) -> Result<CoverageReport, QueryError> {
        let risk_coverage = self.analyze_risk_coverage(company).await?;
        let control_testing = self.analyze_control_testing(company).await?;
        let ownership = self.analyze_ownership(company).await?;
        let compliance_score = ComplianceScore::from_breakdown(ScoreBreakdown {
            risk_coverage: risk_coverage.coverage_percentage,
            testing_coverage: control_testing.testing_coverage_percentage,
            ownership_coverage: ownership.ownership_coverage_percentage,
        });
        debug!(
            company = company.unwrap_or("-"),
            score = compliance_score.overall_score,
            "coverage analysis"
        );
        Ok(CoverageReport {
            compliance_score,
            risk_coverage,
            control_testing,
            ownership,
            orphaned_entities: self.find_orphaned_entities().await?,
            dependencies: self.analyze_control_dependencies().await?,
        })
    }

    async fn active_of_type(
        &self,
        entity_type: EntityType,
        company: Option<&str>,
    ) -> Result<Vec<Entity>, QueryError> {
        let entities = self
            .service()
            .list_entities(&EntityFilter {
                entity_type: Some(entity_type),
                ..EntityFilter::default()
            })
            .await?;
        Ok(entities
            .into_iter()
            .filter(|e| in_company(e, company))
            .collect())
    }

    /// target key -> source keys, for every edge of one type.
    async fn sources_by_target(
        &self,
        relationship_type: RelationshipType,
    ) -> Result<HashMap<String, Vec<String>>, QueryError> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for rel in self
            .service()
            .list_relationships_by_type(relationship_type)
            .await?
        {
            map.entry(rel.target_key).or_default().push(rel.source_key);
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn in_company(entity: &Entity, company: Option<&str>) -> bool {
    let Some(company) = company else {
        return true;
    };
    match entity
        .properties
        .as_ref()
        .and_then(|p| p.get("company"))
        .and_then(Value::as_str)
    {
        Some(own) if !own.is_empty() => own == company,
        _ => true,
    }
}

/// Source systems store check fields as booleans, 0/1, or "0"/"1".
fn is_key_control(entity: &Entity) -> bool {
    match entity.properties.as_ref().and_then(|p| p.get("is_key_control")) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "true" | "Yes"),
        _ => false,
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn recommendations(scores: &ScoreBreakdown) -> Vec<Recommendation> {
    let tiered = |score: f64| {
        if score < 60.0 {
            Priority::High
        } else {
            Priority::Medium
        }
    };
    let mut out = Vec::new();
    if scores.risk_coverage < 80.0 {
        out.push(Recommendation {
            area: "Risk Coverage".to_string(),
            priority: tiered(scores.risk_coverage),
            recommendation: "Review uncovered risks and assign mitigating controls".to_string(),
        });
    }
    if scores.testing_coverage < 80.0 {
        out.push(Recommendation {
            area: "Control Testing".to_string(),
            priority: tiered(scores.testing_coverage),
            recommendation: "Establish testing procedures for untested controls".to_string(),
        });
    }
    if scores.ownership_coverage < 90.0 {
        out.push(Recommendation {
            area: "Control Ownership".to_string(),
            priority: Priority::Medium,
            recommendation: "Assign owners to unowned controls".to_string(),
        });
    }
    out
}
