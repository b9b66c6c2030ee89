use crate::aggregate::ReplyRate;
use crate::excerpt::Excerpt;
use crate::models::MAX_STARS;
use crate::report::ReportSummary;

const BAR_WIDTH: usize = 30;

fn fmt_avg(avg: Option<f64>) -> String {
    avg.map(|a| format!("{a:.2}")).unwrap_or_else(|| "n/a".to_string())
}

/// Proportional `#` bar; any non-zero count gets at least one mark.
fn bar(count: u32, max: u32) -> String {
    if count == 0 || max == 0 {
        return String::new();
    }
    let len = (count as usize * BAR_WIDTH).div_ceil(max as usize);
    "#".repeat(len.max(1))
}

fn push_excerpts(md: &mut String, heading: &str, items: &[Excerpt]) {
    if items.is_empty() {
        return;
    }
    md.push_str(&format!("## {heading}\n"));
    for e in items {
        md.push_str(&format!("- {} ({}★): {}\n", e.date, e.rating, e.comment));
    }
    md.push('\n');
}

/// Console summary of a report.
pub fn render_markdown(r: &ReportSummary) -> String {
    let mut md = String::new();
    md.push_str(&format!("# {} Review Report\n\n", r.title));

    match r.date_range {
        Some(range) => md.push_str(&format!(
            "{} to {} ({} buckets, {})\n\n",
            range.first,
            range.last,
            r.buckets.len(),
            r.scope_label
        )),
        None => md.push_str("No reviews.\n\n"),
    }

    md.push_str("## Totals\n");
    md.push_str(&format!(
        "- Reviews: {} ({} rated, {} unrated)\n",
        r.totals.reviews, r.totals.rated, r.totals.unrated
    ));
    md.push_str(&format!("- Average rating: {}\n", fmt_avg(r.average_rating)));
    md.push_str(&format!(
        "- Replies: {} ({:.1}%)\n",
        r.totals.with_replies, r.totals.reply_rate_pct
    ));
    if !r.recent.bucket_keys.is_empty() {
        md.push_str(&format!(
            "- Recent ({}): {} reviews, average {}\n",
            r.recent.bucket_keys.join(", "),
            r.recent.reviews,
            fmt_avg(r.recent.average_rating)
        ));
    }
    md.push('\n');

    md.push_str("## Stars\n```\n");
    let max = r.rating_distribution.values().copied().max().unwrap_or(0);
    for star in (1..=MAX_STARS).rev() {
        let n = r.rating_distribution.get(&star).copied().unwrap_or(0);
        let replied = reply_pct(&r.reply_rates, star);
        md.push_str(&format!("{star}★ {n:>6} {replied:>7} {}\n", bar(n, max)));
    }
    let unrated = r.rating_distribution.get(&0).copied().unwrap_or(0);
    md.push_str(&format!("-  {unrated:>6} {:>7} {}\n", reply_pct(&r.reply_rates, 0), bar(unrated, max)));
    md.push_str("```\n\n");

    if !r.categories.is_empty() {
        md.push_str(&format!("## Categories ({:?})\n", r.classification_mode));
        for c in &r.categories {
            md.push_str(&format!(
                "- {}: {} reviews, average {}\n",
                c.name,
                c.count,
                fmt_avg(c.average_rating)
            ));
        }
        md.push('\n');
    }

    push_excerpts(&mut md, "Recent Negative", &r.recent_negative);
    push_excerpts(&mut md, "Recent Positive", &r.recent_positive);

    md
}

fn reply_pct(rates: &[ReplyRate], stars: u8) -> String {
    rates
        .iter()
        .find(|x| x.stars == stars)
        .map(|x| format!("{:.0}%", x.rate_pct))
        .unwrap_or_default()
}
