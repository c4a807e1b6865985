//! Grouping timestamped items into bursts of activity.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy)]
pub struct ClusterOptions {
    /// Largest allowed gap between consecutive items of one cluster.
    pub max_gap: Duration,
    /// Clusters covering less time than this are dropped.
    pub min_span: Duration,
    /// Clusters with fewer items than this are dropped.
    pub min_size: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            max_gap: Duration::days(1),
            min_span: Duration::days(1),
            min_size: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimePoint<T> {
    pub item: T,
    pub at: DateTime<Utc>,
}

/// A run of items, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster<T> {
    pub points: Vec<TimePoint<T>>,
}

impl<T> Cluster<T> {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.at)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.at)
    }

    pub fn span(&self) -> Duration {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => end - start,
            _ => Duration::zero(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.points.iter().map(|p| &p.item)
    }
}

/// Split `points` wherever consecutive items are more than `max_gap`
/// apart, keeping the clusters that pass the span and size thresholds.
pub fn find_clusters<T>(
    mut points: Vec<TimePoint<T>>,
    options: &ClusterOptions,
) -> Vec<Cluster<T>> {
    points.sort_by_key(|p| p.at);

    let mut clusters = Vec::new();
    let mut current: Vec<TimePoint<T>> = Vec::new();

    for point in points {
        if let Some(last) = current.last() {
            if point.at - last.at > options.max_gap {
                clusters.push(Cluster {
                    points: std::mem::take(&mut current),
                });
            }
        }
        current.push(point);
    }
    if !current.is_empty() {
        clusters.push(Cluster { points: current });
    }

    clusters
        .into_iter()
        .filter(|c| c.len() >= options.min_size && c.span() >= options.min_span)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 6, day, hour, 0, 0).unwrap()
    }

    fn point(id: u32, day: u32, hour: u32) -> TimePoint<u32> {
        TimePoint { item: id, at: at(day, hour) }
    }

    #[test]
    fn test_splits_on_large_gap() {
        let options = ClusterOptions {
            max_gap: Duration::days(1),
            min_span: Duration::zero(),
            min_size: 1,
        };
        let clusters = find_clusters(
            vec![point(3, 10, 9), point(1, 1, 9), point(2, 1, 20), point(4, 11, 8)],
            &options,
        );
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].items().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(clusters[1].items().copied().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(clusters[0].start(), Some(at(1, 9)));
        assert_eq!(clusters[0].end(), Some(at(1, 20)));
    }

    #[test]
    fn test_gap_equal_to_max_stays_together() {
        let options = ClusterOptions {
            max_gap: Duration::days(1),
            min_span: Duration::zero(),
            min_size: 1,
        };
        let clusters = find_clusters(vec![point(1, 1, 9), point(2, 2, 9)], &options);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_small_and_short_clusters_are_dropped() {
        let options = ClusterOptions::default();

        // five photos over two days survive
        let trip: Vec<_> = (0..5).map(|i| point(i, 1 + i / 2, 12)).collect();
        // five photos in one afternoon are too short
        let afternoon: Vec<_> = (0..5).map(|i| point(10 + i, 20, 12 + i)).collect();
        // three photos over three days are too few
        let sparse: Vec<_> = (0..3).map(|i| point(20 + i, 25 + i, 12)).collect();

        let points = trip.into_iter().chain(afternoon).chain(sparse).collect();
        let clusters = find_clusters(points, &options);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 5);
        assert_eq!(clusters[0].span(), Duration::days(2));
    }

    #[test]
    fn test_empty_input() {
        assert!(find_clusters::<u32>(Vec::new(), &ClusterOptions::default()).is_empty());
    }
}
