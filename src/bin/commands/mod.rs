pub mod charts;
pub mod history;

use clap::{Subcommand, ValueEnum};
use scrobble_harvest::{ChartKind, LastFmClient, Period};

#[derive(ValueEnum, Clone, Copy)]
pub enum PeriodArg {
    Overall,
    Week,
    Month,
    Quarter,
    HalfYear,
    Year,
}

impl From<PeriodArg> for Period {
    fn from(period: PeriodArg) -> Self {
        match period {
            PeriodArg::Overall => Period::Overall,
            PeriodArg::Week => Period::Week,
            PeriodArg::Month => Period::Month,
            PeriodArg::Quarter => Period::Quarter,
            PeriodArg::HalfYear => Period::HalfYear,
            PeriodArg::Year => Period::Year,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
pub enum KindArg {
    /// Tracks
    Tracks,
    /// Albums
    Albums,
    /// Artists
    Artists,
}

impl From<KindArg> for ChartKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Tracks => ChartKind::Track,
            KindArg::Albums => ChartKind::Album,
            KindArg::Artists => ChartKind::Artist,
        }
    }
}

/// `0` on the command line means "no limit".
fn optional_limit(limit: usize) -> Option<usize> {
    (limit > 0).then_some(limit)
}

#[derive(Subcommand)]
pub enum Commands {
    /// List recent scrobbles, newest first
    ///
    /// Usage examples:
    /// # Last 20 scrobbles
    /// scrobble-harvest recent --limit 20
    ///
    /// # Everything scrobbled in March 2024
    /// scrobble-harvest recent --from 2024-03-01 --to 2024-04-01
    Recent {
        /// Maximum number of scrobbles (0 for no limit)
        #[arg(long, default_value = "50")]
        limit: usize,

        /// Start date (YYYY-MM-DD, UTC)
        #[arg(long)]
        from: Option<chrono::NaiveDate>,

        /// End date (YYYY-MM-DD, UTC, exclusive)
        #[arg(long)]
        to: Option<chrono::NaiveDate>,
    },

    /// Count scrobbles on a single day, or in total
    ///
    /// Usage examples:
    /// # Scrobbles made today
    /// scrobble-harvest count
    ///
    /// # Scrobbles on a specific day
    /// scrobble-harvest count --date 2024-03-01
    ///
    /// # Lifetime scrobble count
    /// scrobble-harvest count --total
    Count {
        /// Day to count (YYYY-MM-DD, UTC); today when omitted
        #[arg(long)]
        date: Option<chrono::NaiveDate>,

        /// Report the lifetime scrobble count instead
        #[arg(long, conflicts_with = "date")]
        total: bool,
    },

    /// Show top tracks, albums or artists
    ///
    /// Usage examples:
    /// # Top 10 artists this month
    /// scrobble-harvest top artists --period month --limit 10
    Top {
        /// What to rank
        #[arg(value_enum)]
        kind: KindArg,

        /// Ranking period
        #[arg(long, value_enum, default_value = "overall")]
        period: PeriodArg,

        /// Maximum number of entries (0 for no limit)
        #[arg(long, default_value = "50")]
        limit: usize,

        /// Pages fetched at once after the first
        #[arg(long, default_value = "1")]
        concurrency: usize,
    },

    /// List weekly chart ranges, or show one weekly chart
    ///
    /// Usage examples:
    /// # All available chart ranges
    /// scrobble-harvest weekly
    ///
    /// # Top tracks of the most recent chart week
    /// scrobble-harvest weekly --kind tracks
    ///
    /// # Top albums of the week before that
    /// scrobble-harvest weekly --kind albums --weeks-back 1
    Weekly {
        /// Show this chart instead of listing ranges
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        /// How many chart weeks to go back from the latest
        #[arg(long, default_value = "0")]
        weeks_back: usize,

        /// Maximum number of entries (0 for no limit)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Find scrobbles of the same track recorded close together
    ///
    /// Usage examples:
    /// # Check the last 1000 scrobbles
    /// scrobble-harvest duplicates --limit 1000
    Duplicates {
        /// Number of recent scrobbles to check (0 for all)
        #[arg(long, default_value = "1000")]
        limit: usize,

        /// Number of consecutive scrobbles compared at once
        #[arg(long, default_value_t = scrobble_harvest::duplicates::DEFAULT_WINDOW_SIZE)]
        window: usize,
    },
}

pub async fn execute_command(
    command: Commands,
    client: &LastFmClient,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Recent { limit, from, to } => {
            history::handle_recent(client, optional_limit(limit), from, to).await
        }
        Commands::Count { date, total } => history::handle_count(client, date, total).await,
        Commands::Top {
            kind,
            period,
            limit,
            concurrency,
        } => {
            let client = client.clone().with_max_in_flight(concurrency);
            charts::handle_top(&client, kind, period.into(), optional_limit(limit)).await
        }
        Commands::Weekly {
            kind,
            weeks_back,
            limit,
        } => charts::handle_weekly(client, kind, weeks_back, optional_limit(limit)).await,
        Commands::Duplicates { limit, window } => {
            history::handle_duplicates(client, optional_limit(limit), window).await
        }
    }
}
