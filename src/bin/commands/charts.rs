use super::KindArg;
use scrobble_harvest::{LastFmClient, Period};

/// Handle the top command
pub async fn handle_top(
    client: &LastFmClient,
    kind: KindArg,
    period: Period,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<String> = match kind {
        KindArg::Tracks => client
            .top_tracks(period, None, limit)
            .await?
            .iter()
            .map(|t| format!("{t} ({} plays)", t.play_count.unwrap_or_default()))
            .collect(),
        KindArg::Albums => client
            .top_albums(period, None, limit)
            .await?
            .iter()
            .map(|a| format!("{a} ({} plays)", a.user_scrobbles.unwrap_or_default()))
            .collect(),
        KindArg::Artists => client
            .top_artists(period, None, limit)
            .await?
            .iter()
            .map(|a| format!("{a} ({} plays)", a.user_scrobbles.unwrap_or_default()))
            .collect(),
    };

    for (index, label) in labels.iter().enumerate() {
        println!("{:>4}. {label}", index + 1);
    }

    Ok(())
}

/// Handle the weekly command
pub async fn handle_weekly(
    client: &LastFmClient,
    kind: Option<KindArg>,
    weeks_back: usize,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let charts = client.weekly_charts(None).await?;

    let Some(kind) = kind else {
        for chart in &charts {
            match (chart.from_date(), chart.to_date()) {
                (Some(from), Some(to)) => {
                    println!("{} -> {}", from.date_naive(), to.date_naive())
                }
                _ => println!("{chart}"),
            }
        }
        return Ok(());
    };

    let Some(chart) = charts.iter().rev().nth(weeks_back) else {
        return Err(format!("only {} weekly charts available", charts.len()).into());
    };

    let entries = client.weekly_chart(kind.into(), *chart, None, limit).await?;
    for (index, label) in entries.labels().iter().enumerate() {
        println!("{:>4}. {label}", index + 1);
    }

    Ok(())
}
