use chrono::NaiveDate;
use entity::{Deal, Stage};
use serde::Serialize;
use tracing::{debug, info_span};

use super::{is_blank, round1};
use crate::lookup::LookupTables;
use crate::settings::{HygieneSettings, PipelineSettings};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IssueType {
    MissingAmount,
    MissingCloseDate,
    StageProbabilityMismatch,
    MissingPostcode,
    MissingContactInfo,
    MissingOwner,
    MissingNextStep,
}

impl IssueType {
    pub const ALL: [IssueType; 7] = [
        IssueType::MissingAmount,
        IssueType::MissingCloseDate,
        IssueType::StageProbabilityMismatch,
        IssueType::MissingPostcode,
        IssueType::MissingContactInfo,
        IssueType::MissingOwner,
        IssueType::MissingNextStep,
    ];

    pub fn label(self) -> &'static str {
        match self {
            IssueType::MissingAmount => "Missing amount",
            IssueType::MissingCloseDate => "Missing close date",
            IssueType::StageProbabilityMismatch => "Stage/probability mismatch",
            IssueType::MissingPostcode => "Missing postcode",
            IssueType::MissingContactInfo => "Missing contact info",
            IssueType::MissingOwner => "Missing owner",
            IssueType::MissingNextStep => "Missing next step",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HygieneIssue {
    pub deal_id: String,
    pub deal_name: String,
    pub owner: Option<String>,
    pub stage: Stage,
    pub issue: IssueType,
    pub severity: Severity,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTypeCount {
    pub issue: IssueType,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HygieneReport {
    pub as_of: NaiveDate,
    pub total_deals: usize,
    pub deals_with_issues: usize,
    /// Percentage of deals with no issues, one decimal place.
    pub health_score: f64,
    pub issues: Vec<HygieneIssue>,
    pub issues_by_type: Vec<IssueTypeCount>,
    pub issues_by_severity: SeverityCounts,
}

pub fn hygiene_report(
    deals: &[Deal],
    today: NaiveDate,
    settings: &PipelineSettings,
    lookup: &LookupTables,
) -> HygieneReport {
    let span = info_span!("crm.hygieneReport", deals = deals.len(), as_of = %today);
    let _guard = span.enter();

    let mut issues = Vec::new();
    let mut deals_with_issues = 0;
    for deal in deals {
        let before = issues.len();
        check_deal(deal, &settings.hygiene, lookup, &mut issues);
        if issues.len() > before {
            deals_with_issues += 1;
        }
    }
    issues.sort_by(|a: &HygieneIssue, b: &HygieneIssue| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.deal_id.cmp(&b.deal_id))
            .then_with(|| a.issue.cmp(&b.issue))
    });

    let issues_by_type = IssueType::ALL
        .iter()
        .map(|kind| IssueTypeCount {
            issue: *kind,
            label: kind.label(),
            count: issues.iter().filter(|i| i.issue == *kind).count(),
        })
        .filter(|entry| entry.count > 0)
        .collect();

    let mut by_severity = SeverityCounts::default();
    for issue in &issues {
        match issue.severity {
            Severity::High => by_severity.high += 1,
            Severity::Medium => by_severity.medium += 1,
            Severity::Low => by_severity.low += 1,
        }
    }

    let health_score = health_score(deals.len(), deals_with_issues);
    debug!(issues = issues.len(), deals_with_issues, health_score, "hygiene report computed");

    HygieneReport {
        as_of: today,
        total_deals: deals.len(),
        deals_with_issues,
        health_score,
        issues,
        issues_by_type,
        issues_by_severity: by_severity,
    }
}

/// `(1 - flagged / total) * 100` to one decimal; 100 with no deals.
pub fn health_score(total_deals: usize, deals_with_issues: usize) -> f64 {
    if total_deals == 0 {
        return 100.0;
    }
    round1((1.0 - deals_with_issues as f64 / total_deals as f64) * 100.0)
}

/// Severity of a stage/probability deviation, `None` within tolerance.
pub fn mismatch_severity(deviation: u8, bands: &HygieneSettings) -> Option<Severity> {
    if deviation <= bands.probability_tolerance {
        None
    } else if deviation <= bands.medium_deviation {
        Some(Severity::Low)
    } else if deviation <= bands.high_deviation {
        Some(Severity::Medium)
    } else {
        Some(Severity::High)
    }
}

fn check_deal(
    deal: &Deal,
    bands: &HygieneSettings,
    lookup: &LookupTables,
    out: &mut Vec<HygieneIssue>,
) {
    let mut flag = |issue: IssueType, severity: Severity, detail: String| {
        out.push(HygieneIssue {
            deal_id: deal.deal_id.clone(),
            deal_name: deal.deal_name.clone(),
            owner: deal.owner.clone(),
            stage: deal.stage,
            issue,
            severity,
            detail,
        });
    };

    if deal.amount_gbp.is_none_or(|a| a.is_zero()) {
        flag(IssueType::MissingAmount, Severity::Medium, "no amount recorded".into());
    }

    if matches!(deal.stage, Stage::Proposal | Stage::Negotiation) && deal.close_date.is_none() {
        flag(
            IssueType::MissingCloseDate,
            Severity::High,
            format!("{} deal has no close date", deal.stage.label()),
        );
    }

    let expected = lookup.probability_for_stage(deal.stage);
    let deviation = deal.probability.abs_diff(expected);
    if let Some(severity) = mismatch_severity(deviation, bands) {
        flag(
            IssueType::StageProbabilityMismatch,
            severity,
            format!(
                "probability {}% is {deviation} points from the {} default of {expected}%",
                deal.probability,
                deal.stage.label()
            ),
        );
    }

    if is_blank(deal.postcode.as_deref()) {
        let severity = if deal.is_open() { Severity::Medium } else { Severity::Low };
        flag(IssueType::MissingPostcode, severity, "no postcode".into());
    }

    if is_blank(deal.email.as_deref()) && is_blank(deal.phone.as_deref()) {
        flag(IssueType::MissingContactInfo, Severity::Medium, "no email or phone".into());
    }

    if is_blank(deal.owner.as_deref()) {
        flag(IssueType::MissingOwner, Severity::High, "no owner assigned".into());
    }

    if deal.is_open() && is_blank(deal.next_step.as_deref()) {
        flag(IssueType::MissingNextStep, Severity::Medium, "open deal has no next step".into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    /// A deal with nothing to complain about.
    fn tidy(id: &str) -> Deal {
        let mut deal = Deal::new("Tidy", "Acme");
        deal.deal_id = id.into();
        deal.stage = Stage::Proposal;
        deal.probability = 60;
        deal.amount_gbp = Some(Decimal::from(10_000));
        deal.close_date = Some(today());
        deal.postcode = Some("SW1A 1AA".into());
        deal.email = Some("jo@example.com".into());
        deal.owner = Some("Sam".into());
        deal.next_step = Some("Call".into());
        deal
    }

    fn report(deals: &[Deal]) -> HygieneReport {
        hygiene_report(deals, today(), &PipelineSettings::default(), &LookupTables::uk_defaults())
    }

    fn kinds(report: &HygieneReport, id: &str) -> Vec<IssueType> {
        let mut kinds: Vec<IssueType> = report
            .issues
            .iter()
            .filter(|i| i.deal_id == id)
            .map(|i| i.issue)
            .collect();
        kinds.sort();
        kinds
    }

    #[test]
    fn tidy_deal_has_no_issues() {
        let report = report(&[tidy("T")]);
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert_eq!(report.health_score, 100.0);
    }

    #[test]
    fn each_rule_fires_with_its_severity() {
        let mut bare = Deal::new("Bare", "Acme");
        bare.deal_id = "B".into();
        bare.stage = Stage::Negotiation;
        bare.probability = 80;

        let report = report(&[bare]);
        assert_eq!(
            kinds(&report, "B"),
            vec![
                IssueType::MissingAmount,
                IssueType::MissingCloseDate,
                IssueType::MissingPostcode,
                IssueType::MissingContactInfo,
                IssueType::MissingOwner,
                IssueType::MissingNextStep,
            ]
        );
        let severities: Vec<Severity> = report.issues.iter().map(|i| i.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::High,
                Severity::High,
                Severity::Medium,
                Severity::Medium,
                Severity::Medium,
                Severity::Medium
            ]
        );
        assert_eq!(report.issues_by_severity, SeverityCounts { high: 2, medium: 4, low: 0 });
    }

    #[test]
    fn closed_deal_missing_postcode_is_low() {
        let mut won = tidy("W");
        won.stage = Stage::ClosedWon;
        won.probability = 100;
        won.postcode = None;
        won.next_step = None;
        let report = report(&[won]);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].issue, IssueType::MissingPostcode);
        assert_eq!(report.issues[0].severity, Severity::Low);
    }

    #[test]
    fn mismatch_severity_scales_with_deviation() {
        let bands = HygieneSettings::default();
        assert_eq!(mismatch_severity(30, &bands), None);
        assert_eq!(mismatch_severity(31, &bands), Some(Severity::Low));
        assert_eq!(mismatch_severity(45, &bands), Some(Severity::Low));
        assert_eq!(mismatch_severity(46, &bands), Some(Severity::Medium));
        assert_eq!(mismatch_severity(60, &bands), Some(Severity::Medium));
        assert_eq!(mismatch_severity(61, &bands), Some(Severity::High));

        let mut off = tidy("M");
        off.probability = 5;
        let report = report(&[off]);
        assert_eq!(kinds(&report, "M"), vec![IssueType::StageProbabilityMismatch]);
        assert_eq!(report.issues[0].severity, Severity::Medium);
    }

    #[test]
    fn health_score_counts_flagged_deals() {
        assert_eq!(health_score(0, 0), 100.0);
        assert_eq!(health_score(3, 1), 66.7);
        assert_eq!(health_score(4, 4), 0.0);

        let mut last = report(&[tidy("A"), tidy("B"), tidy("C")]).health_score;
        for flagged in 1..=3 {
            let mut deals = vec![tidy("A"), tidy("B"), tidy("C")];
            for deal in deals.iter_mut().take(flagged) {
                deal.owner = None;
            }
            let report = report(&deals);
            assert!(report.health_score < last, "{} !< {last}", report.health_score);
            assert_eq!(report.issues_by_type.len(), 1);
            assert_eq!(report.issues_by_type[0].count, flagged);
            last = report.health_score;
        }
        assert_eq!(last, 0.0);
    }
}
