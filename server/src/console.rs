//! Numbered console menu over the same CRM operations the tool layer exposes.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use entity::Deal;
use platform_db::DealStore;
use products_crm::{
    CrmModule, DailyBrief, DealFilter, ForecastSnapshot, HygieneReport, PipelineStats,
};
use rust_decimal::Decimal;

const MENU: &[&str] = &[
    "Pipeline stats",
    "Daily brief",
    "Hygiene report",
    "Forecast",
    "Open deals",
];

#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Show(usize),
    Quit,
    Unknown,
}

fn parse_choice(input: &str) -> Choice {
    let input = input.trim();
    if input.eq_ignore_ascii_case("q") || input == "0" {
        return Choice::Quit;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=MENU.len()).contains(&n) => Choice::Show(n),
        _ => Choice::Unknown,
    }
}

/// Prompt loop. Ends on `q`, `0`, or end of input.
pub fn run<S, R, W>(crm: &CrmModule<S>, today: NaiveDate, input: R, mut out: W) -> Result<()>
where
    S: DealStore,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        write!(out, "{}", menu_text(today)).context("writing menu")?;
        out.flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let rendered = match parse_choice(&line.context("reading choice")?) {
            Choice::Quit => break,
            Choice::Unknown => "Unknown option\n".to_string(),
            Choice::Show(n) => render(crm, n, today)?,
        };
        writeln!(out, "{rendered}")?;
    }
    writeln!(out, "Bye")?;
    Ok(())
}

fn render<S: DealStore>(crm: &CrmModule<S>, choice: usize, today: NaiveDate) -> Result<String> {
    let text = match choice {
        1 => stats_table(&crm.stats()?).to_string(),
        2 => brief_text(&crm.daily_brief(today)?),
        3 => hygiene_text(&crm.hygiene_report(today)?),
        4 => forecast_table(&crm.forecast_snapshot(today)?).to_string(),
        _ => {
            let mut filter = DealFilter::new();
            filter.stages = entity::Stage::ALL.into_iter().filter(|s| s.is_open()).collect();
            deals_table(&crm.list_deals(&filter, today)?).to_string()
        }
    };
    Ok(text)
}

fn menu_text(today: NaiveDate) -> String {
    let mut text = format!("\nDeal desk ({today})\n");
    for (i, item) in MENU.iter().enumerate() {
        text.push_str(&format!("  {}. {item}\n", i + 1));
    }
    text.push_str("  q. Quit\n> ");
    text
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

fn money(value: Option<Decimal>) -> String {
    value.map(|v| format!("£{}", v.round_dp(2))).unwrap_or_else(|| "-".into())
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

pub fn stats_table(stats: &PipelineStats) -> Table {
    let mut t = table(&["Metric", "Value"]);
    t.add_row(vec!["Deals".to_string(), stats.total_deals.to_string()]);
    t.add_row(vec!["Open".to_string(), stats.open_deals.to_string()]);
    t.add_row(vec!["Won".to_string(), stats.closed_won.to_string()]);
    t.add_row(vec!["Lost".to_string(), stats.closed_lost.to_string()]);
    t.add_row(vec!["Pipeline".to_string(), money(Some(stats.total_pipeline))]);
    t.add_row(vec!["Weighted".to_string(), money(Some(stats.weighted_pipeline))]);
    t.add_row(vec!["Won value".to_string(), money(Some(stats.closed_won_value))]);
    t.add_row(vec!["Average deal".to_string(), money(Some(stats.average_deal_value))]);
    t.add_row(vec!["Owners".to_string(), stats.owners.join(", ")]);
    t
}

pub fn brief_text(brief: &DailyBrief) -> String {
    let mut due = table(&["Deal", "Account", "Owner", "Next step"]);
    for d in &brief.due_today {
        due.add_row(vec![
            d.deal_name.clone(),
            d.account_name.clone(),
            text(d.owner.as_deref()),
            text(d.next_step.as_deref()),
        ]);
    }
    let mut overdue = table(&["Deal", "Owner", "Days overdue"]);
    for item in &brief.overdue {
        overdue.add_row(vec![
            item.deal.deal_name.clone(),
            text(item.deal.owner.as_deref()),
            item.days_overdue.to_string(),
        ]);
    }
    let mut silent = table(&["Deal", "Owner", "Days since contact"]);
    for item in &brief.no_contact {
        silent.add_row(vec![
            item.deal.deal_name.clone(),
            text(item.deal.owner.as_deref()),
            item.days_since_contact.map_or_else(|| "never".into(), |d| d.to_string()),
        ]);
    }
    let mut risk = table(&["Deal", "Amount", "Reason"]);
    for item in &brief.high_value_at_risk {
        risk.add_row(vec![
            item.deal.deal_name.clone(),
            money(item.deal.amount_gbp),
            item.risk_reason.clone(),
        ]);
    }
    let heading = format!(
        "Daily brief for {} ({} action items, {} at risk)",
        brief.as_of,
        brief.total_action_items,
        money(Some(brief.total_at_risk_value)),
    );
    [
        heading,
        format!("Due today\n{due}"),
        format!("Overdue\n{overdue}"),
        format!("No recent contact\n{silent}"),
        format!("High value at risk\n{risk}"),
    ]
    .join("\n\n")
}

pub fn hygiene_text(report: &HygieneReport) -> String {
    let mut t = table(&["Deal", "Owner", "Issue", "Severity", "Detail"]);
    for issue in &report.issues {
        t.add_row(vec![
            format!("{} ({})", issue.deal_name, issue.deal_id),
            text(issue.owner.as_deref()),
            issue.issue.label().to_string(),
            format!("{:?}", issue.severity),
            issue.detail.clone(),
        ]);
    }
    format!(
        "Health score {:.1} ({} of {} deals need attention)\n{t}",
        report.health_score, report.deals_with_issues, report.total_deals
    )
}

pub fn forecast_table(forecast: &ForecastSnapshot) -> Table {
    let mut t = table(&["Stage", "Deals", "Total", "Weighted", "% of pipeline"]);
    for stage in &forecast.by_stage {
        t.add_row(vec![
            stage.label.to_string(),
            stage.count.to_string(),
            money(Some(stage.total)),
            money(Some(stage.weighted)),
            format!("{:.1}", stage.percentage_of_pipeline),
        ]);
    }
    t.add_row(vec![
        "Total".to_string(),
        forecast.open_deals.to_string(),
        money(Some(forecast.total_pipeline)),
        money(Some(forecast.weighted_pipeline)),
        String::new(),
    ]);
    t
}

pub fn deals_table(deals: &[Deal]) -> Table {
    let mut t = table(&["Id", "Deal", "Account", "Stage", "Amount", "Owner", "Region"]);
    for deal in deals {
        t.add_row(vec![
            deal.deal_id.clone(),
            deal.deal_name.clone(),
            deal.account_name.clone(),
            deal.stage.label().to_string(),
            money(deal.amount_gbp),
            text(deal.owner.as_deref()),
            text(deal.region.as_deref()),
        ]);
    }
    t
}
