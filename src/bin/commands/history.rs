use chrono::{NaiveDate, NaiveTime, Utc};
use scrobble_harvest::{LastFmClient, RecentTracksQuery};

/// Handle the recent command
pub async fn handle_recent(
    client: &LastFmClient,
    limit: Option<usize>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut query = RecentTracksQuery::default();
    query.limit = limit;
    query.from = from.map(|d| d.and_time(NaiveTime::MIN).and_utc());
    query.to = to.map(|d| d.and_time(NaiveTime::MIN).and_utc());

    let scrobbles = client.recent_tracks(query).await?;
    for scrobble in &scrobbles {
        println!("{scrobble}");
    }
    println!();
    println!("{} scrobbles", scrobbles.len());

    Ok(())
}

/// Handle the count command
pub async fn handle_count(
    client: &LastFmClient,
    date: Option<NaiveDate>,
    total: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if total {
        let count = client.user_scrobble_count(None).await?;
        println!("{} has {count} scrobbles", client.config().username);
        return Ok(());
    }

    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let count = client.count_scrobbles_from_date(date, None, None).await?;
    println!("{date}: {count} scrobbles");

    Ok(())
}

/// Handle the duplicates command
pub async fn handle_duplicates(
    client: &LastFmClient,
    limit: Option<usize>,
    window: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let username = client.config().username.clone();
    let duplicates = client.duplicate_scrobbles(limit, window).await?;

    println!("Found {} duplicates", duplicates.len());
    println!();

    for duplicate in &duplicates {
        println!("{duplicate}");
        println!("  {:.1} minutes apart", duplicate.minutes_apart());
        if let Some(url) = duplicate.track_library_url(&username) {
            println!("  {url}");
        }
        println!("  {}", duplicate.scrobbles_url(&username));
        println!();
    }

    Ok(())
}
