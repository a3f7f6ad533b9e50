use crate::adapters::providers::{AssetLayout, FinesScraper, NflverseAdapter};
use crate::config::SourcesConfig;
use crate::domain::model::DatasetDescriptor;
use crate::domain::ports::DatasetAdapter;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 已註冊的資料集：描述 + 抓取實作
#[derive(Clone)]
pub struct RegisteredDataset {
    pub descriptor: DatasetDescriptor,
    pub adapter: Arc<dyn DatasetAdapter>,
}

/// Known dataset types, keyed by id.
#[derive(Clone, Default)]
pub struct DatasetRegistry {
    datasets: BTreeMap<String, RegisteredDataset>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: DatasetDescriptor,
        adapter: Arc<dyn DatasetAdapter>,
    ) -> Result<()> {
        if self.datasets.contains_key(&descriptor.id) {
            return Err(EtlError::config(format!(
                "dataset '{}' is already registered",
                descriptor.id
            )));
        }
        self.datasets.insert(
            descriptor.id.clone(),
            RegisteredDataset {
                descriptor,
                adapter,
            },
        );
        Ok(())
    }

    pub fn get(&self, data_type: &str) -> Option<&RegisteredDataset> {
        self.datasets.get(data_type)
    }

    pub fn descriptor(&self, data_type: &str) -> Result<&DatasetDescriptor> {
        self.get(data_type)
            .map(|d| &d.descriptor)
            .ok_or_else(|| self.unknown(data_type))
    }

    pub fn ids(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.values().map(|d| &d.descriptor)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub(crate) fn unknown(&self, data_type: &str) -> EtlError {
        EtlError::UnknownDatasetError {
            data_type: data_type.to_string(),
            available: self.ids(),
        }
    }

    /// The nflverse datasets plus the fines page. Most assets are nflverse-data
    /// releases; the fantasy datasets and trades live on their own hosts.
    pub fn nflverse(client: Client, sources: &SourcesConfig) -> Result<Self> {
        use AssetLayout::{PerSeason, Single};

        let nflverse = sources.nflverse_base_url.as_str();
        let ffopportunity = sources.ffopportunity_base_url.as_str();
        let dynastyprocess = sources.dynastyprocess_base_url.as_str();
        let nfldata = sources.nfldata_base_url.as_str();

        let mut registry = Self::new();
        #[rustfmt::skip]
        let layouts: [(&str, bool, &str, AssetLayout); 23] = [
            ("pbp", true, nflverse, PerSeason { tag: "pbp", stem: "play_by_play" }),
            ("play_by_play", true, nflverse, PerSeason { tag: "pbp", stem: "play_by_play" }),
            ("schedules", true, nflverse, Single { tag: "schedules", file: "games.csv", season_column: Some("season") }),
            ("rosters", true, nflverse, PerSeason { tag: "rosters", stem: "roster" }),
            ("rosters_weekly", true, nflverse, PerSeason { tag: "weekly_rosters", stem: "roster_weekly" }),
            ("player_stats", true, nflverse, PerSeason { tag: "stats_player", stem: "stats_player_week" }),
            ("players", true, nflverse, Single { tag: "players", file: "players.csv", season_column: None }),
            ("teams", false, nflverse, Single { tag: "teams", file: "teams_colors_logos.csv", season_column: None }),
            ("team_stats", true, nflverse, PerSeason { tag: "stats_team", stem: "stats_team_week" }),
            ("depth_charts", true, nflverse, PerSeason { tag: "depth_charts", stem: "depth_charts" }),
            ("officials", true, nflverse, Single { tag: "officials", file: "officials.csv", season_column: Some("season") }),
            ("injuries", true, nflverse, PerSeason { tag: "injuries", stem: "injuries" }),
            ("snap_counts", true, nflverse, PerSeason { tag: "snap_counts", stem: "snap_counts" }),
            ("nextgen_stats", true, nflverse, Single { tag: "nextgen_stats", file: "ngs_passing.csv", season_column: Some("season") }),
            ("participation", true, nflverse, PerSeason { tag: "pbp_participation", stem: "pbp_participation" }),
            ("combine", true, nflverse, Single { tag: "combine", file: "combine.csv", season_column: Some("season") }),
            ("draft_picks", true, nflverse, Single { tag: "draft_picks", file: "draft_picks.csv", season_column: Some("season") }),
            ("contracts", false, nflverse, Single { tag: "contracts", file: "historical_contracts.csv", season_column: None }),
            ("trades", false, nfldata, Single { tag: "data", file: "trades.csv", season_column: None }),
            ("ftn_charting", true, nflverse, PerSeason { tag: "ftn_charting", stem: "ftn_charting" }),
            ("ff_opportunity", true, ffopportunity, PerSeason { tag: "latest-data", stem: "ep_weekly" }),
            ("ff_playerids", true, dynastyprocess, Single { tag: "files", file: "db_playerids.csv", season_column: None }),
            ("ff_rankings", true, dynastyprocess, Single { tag: "files", file: "db_fpecr_latest.csv", season_column: None }),
        ];

        for (id, accepts_seasons, base_url, layout) in layouts {
            registry.register(
                DatasetDescriptor::tabular(id, accepts_seasons),
                Arc::new(NflverseAdapter::new(client.clone(), base_url, layout)),
            )?;
        }

        registry.register(
            DatasetDescriptor::records("fines"),
            Arc::new(FinesScraper::new(client, &sources.fines_url)),
        )?;

        Ok(registry)
    }
}
