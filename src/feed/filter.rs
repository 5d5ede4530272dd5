use super::entry::FeedEntry;

/// Drops entries that are known to lie further than `radius` km from home.
///
/// Entries without a distance (no usable geometry) cannot be evaluated and
/// pass through untouched. `None` disables the filter. Source order is kept.
pub fn filter_by_radius<E: FeedEntry>(entries: Vec<E>, radius: Option<f64>) -> Vec<E> {
    let Some(radius) = radius else {
        return entries;
    };

    entries
        .into_iter()
        .filter(|entry| match entry.distance_to_home() {
            Some(distance) => distance <= radius,
            None => true,
        })
        .collect()
}

/// Allowed values for one categorical attribute.
///
/// An unset or empty list allows everything. Otherwise a value must be
/// present and listed; an absent value never passes a non-empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList(Option<Vec<String>>);

impl AllowList {
    pub fn new(values: Option<Vec<String>>) -> Self {
        Self(values)
    }

    pub fn is_active(&self) -> bool {
        self.0.as_ref().is_some_and(|values| !values.is_empty())
    }

    pub fn permits(&self, value: Option<&str>) -> bool {
        match &self.0 {
            Some(allowed) if !allowed.is_empty() => {
                value.is_some_and(|v| allowed.iter().any(|a| a == v))
            }
            _ => true,
        }
    }

    pub fn values(&self) -> Option<&[String]> {
        self.0.as_deref()
    }
}

impl<S: Into<String>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(Some(iter.into_iter().map(Into::into).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Probe {
        id: String,
        distance: Option<f64>,
    }

    impl FeedEntry for Probe {
        fn external_id(&self) -> &str {
            &self.id
        }
        fn coordinates(&self) -> Option<Coordinate> {
            None
        }
        fn distance_to_home(&self) -> Option<f64> {
            self.distance
        }
        fn changed(&self) -> Option<DateTime<Utc>> {
            None
        }
    }

    fn probe(id: &str, distance: Option<f64>) -> Probe {
        Probe {
            id: id.to_string(),
            distance,
        }
    }

    #[test]
    fn test_radius_none_keeps_everything() {
        let entries = vec![probe("a", Some(500.0)), probe("b", None)];
        assert_eq!(filter_by_radius(entries.clone(), None), entries);
    }

    #[test]
    fn test_radius_drops_far_entries() {
        let entries = vec![
            probe("near", Some(5.0)),
            probe("far", Some(52.0)),
            probe("edge", Some(10.0)),
        ];
        let kept: Vec<_> = filter_by_radius(entries, Some(10.0))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(kept, vec!["near", "edge"]);
    }

    #[test]
    fn test_radius_passes_entries_without_geometry() {
        let kept = filter_by_radius(vec![probe("nowhere", None)], Some(1.0));
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_allow_list_unset_or_empty_permits_all() {
        assert!(AllowList::default().permits(None));
        assert!(AllowList::new(Some(vec![])).permits(None));
        assert!(!AllowList::new(Some(vec![])).is_active());
    }

    #[test]
    fn test_allow_list_matches_exact_values() {
        let list: AllowList = ["warning", "incident"].into_iter().collect();
        assert!(list.is_active());
        assert!(list.permits(Some("warning")));
        assert!(!list.permits(Some("Warning")));
        assert!(!list.permits(None));
    }

    proptest! {
        #[test]
        fn prop_radius_output_is_subset_within_radius(
            distances in proptest::collection::vec(proptest::option::of(0.0f64..1000.0), 0..40),
            radius in 0.0f64..1000.0,
        ) {
            let entries: Vec<Probe> = distances
                .iter()
                .enumerate()
                .map(|(i, d)| probe(&i.to_string(), *d))
                .collect();
            let kept = filter_by_radius(entries.clone(), Some(radius));
            for entry in &kept {
                prop_assert!(entries.contains(entry));
                if let Some(d) = entry.distance {
                    prop_assert!(d <= radius);
                }
            }
            let expected = entries
                .iter()
                .filter(|e| e.distance.map_or(true, |d| d <= radius))
                .count();
            prop_assert_eq!(kept.len(), expected);
        }
    }
}
