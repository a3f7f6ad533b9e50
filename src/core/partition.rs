use crate::domain::model::PartitionKeySet;

pub const RAW_ZONE_ROOT: &str = "raw";

/// Canonical raw-zone paths: `raw/{source}/{data_type}[/{key}={value}]*`.
pub struct PartitionPathBuilder;

impl PartitionPathBuilder {
    pub fn build(source: &str, data_type: &str, partition_keys: &PartitionKeySet) -> String {
        let mut path_parts = vec![
            RAW_ZONE_ROOT.to_string(),
            source.to_string(),
            data_type.to_string(),
        ];

        // PartitionKeySet iterates in key order
        for (key, value) in partition_keys.iter() {
            path_parts.push(format!("{}={}", key, value));
        }

        path_parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_partitions() {
        let path = PartitionPathBuilder::build("nfl", "teams", &PartitionKeySet::new());
        assert_eq!(path, "raw/nfl/teams");
    }

    #[test]
    fn test_build_with_season_partition() {
        let keys = PartitionKeySet::new().with("season", 2025);
        let path = PartitionPathBuilder::build("nfl", "play_by_play", &keys);
        assert_eq!(path, "raw/nfl/play_by_play/season=2025");
    }

    #[test]
    fn test_build_is_insertion_order_independent() {
        let ba = PartitionKeySet::new().with("b", 2).with("a", 1);
        let ab = PartitionKeySet::new().with("a", 1).with("b", 2);

        assert_eq!(
            PartitionPathBuilder::build("nfl", "pbp", &ba),
            PartitionPathBuilder::build("nfl", "pbp", &ab)
        );
        assert_eq!(PartitionPathBuilder::build("nfl", "pbp", &ab), "raw/nfl/pbp/a=1/b=2");
    }
}
