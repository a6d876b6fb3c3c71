use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::PollsError,
    models::{
        aggregate::{percentage, AggregateResult, FilterSet, OptionTally},
        poll::PollCatalog,
        response::{DemographicRecord, PollResponse},
        stats::{CountryCount, PollStatistics, TimelinePoint},
    },
    repositories::response_repository::SessionIndex,
};

const TOP_COUNTRIES: usize = 10;

/// Turns raw responses into display-ready breakdowns. Pure: the same inputs
/// and `now` always give the same output.
pub struct Aggregator<'a> {
    catalog: &'a PollCatalog,
    index: &'a SessionIndex,
    now: DateTime<Utc>,
}

impl<'a> Aggregator<'a> {
    pub fn new(catalog: &'a PollCatalog, index: &'a SessionIndex) -> Self {
        Self::at(catalog, index, Utc::now())
    }

    pub fn at(catalog: &'a PollCatalog, index: &'a SessionIndex, now: DateTime<Utc>) -> Self {
        Self {
            catalog,
            index,
            now,
        }
    }

    fn matches(&self, response: &PollResponse, filters: &FilterSet) -> bool {
        if let Some(country) = &filters.country {
            if response.context.user_country.as_deref() != Some(country.as_str()) {
                return false;
            }
        }
        if let Some(category) = &filters.category {
            if &response.category != category {
                return false;
            }
        }
        if let Some(window) = filters.time {
            if age_in_days(self.now - response.timestamp) > window.max_days() {
                return false;
            }
        }

        let demographics = self.catalog.demographics();
        let joins = [
            (&filters.age, &demographics.age),
            (&filters.residence, &demographics.residence),
            (&filters.affiliation, &demographics.affiliation),
        ];
        joins.iter().all(|(wanted, poll_id)| match wanted {
            Some(option) => self.index.has_answer(&response.session_id, poll_id, option),
            None => true,
        })
    }

    pub fn filter<'r>(
        &self,
        responses: &'r [PollResponse],
        filters: &FilterSet,
    ) -> Vec<&'r PollResponse> {
        responses
            .iter()
            .filter(|r| self.matches(r, filters))
            .collect()
    }

    pub fn aggregate(
        &self,
        poll_id: &str,
        responses: &[PollResponse],
        filters: &FilterSet,
    ) -> Result<AggregateResult, PollsError> {
        let poll = self.catalog.get(poll_id).ok_or(PollsError::PollNotFound)?;

        let mut counts: Vec<(String, u64)> = Vec::new();
        for response in responses
            .iter()
            .filter(|r| r.poll_id == poll_id && self.matches(r, filters))
        {
            match counts.iter_mut().find(|(o, _)| *o == response.selected_option) {
                Some((_, n)) => *n += 1,
                None => counts.push((response.selected_option.clone(), 1)),
            }
        }
        let total: u64 = counts.iter().map(|(_, n)| n).sum();

        // Age groups always come out in their defined order; other polls list
        // options as they first appear, or every option when nothing matched.
        let ordered: Vec<(String, u64)> = if poll_id == self.catalog.demographics().age {
            let mut fixed: Vec<(String, u64)> = poll
                .options
                .iter()
                .map(|option| {
                    let n = counts
                        .iter()
                        .find(|(o, _)| o == option)
                        .map_or(0, |(_, n)| *n);
                    (option.clone(), n)
                })
                .collect();
            fixed.extend(counts.into_iter().filter(|(o, _)| !poll.has_option(o)));
            fixed
        } else if total == 0 {
            poll.options.iter().map(|o| (o.clone(), 0)).collect()
        } else {
            counts
        };

        Ok(AggregateResult {
            poll_id: poll.id.clone(),
            question: poll.question.clone(),
            category: poll.category.clone(),
            total,
            options: ordered
                .into_iter()
                .map(|(option, count)| OptionTally {
                    percentage: percentage(count, total),
                    option,
                    count,
                })
                .collect(),
        })
    }

    /// Top countries by response count over every poll.
    pub fn country_histogram(
        &self,
        responses: &[PollResponse],
        filters: &FilterSet,
    ) -> Vec<CountryCount> {
        let filtered = self.filter(responses, filters);
        let mut counts: Vec<(String, u64)> = Vec::new();
        for response in &filtered {
            let country = response.country();
            match counts.iter_mut().find(|(c, _)| c == country) {
                Some((_, n)) => *n += 1,
                None => counts.push((country.to_string(), 1)),
            }
        }
        // Stable sort keeps first-appearance order among equal counts.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        let total = filtered.len() as u64;

        counts
            .into_iter()
            .take(TOP_COUNTRIES)
            .map(|(country, count)| CountryCount {
                percentage: percentage(count, total),
                country,
                count,
            })
            .collect()
    }

    pub fn statistics(
        &self,
        responses: &[PollResponse],
        demographics: &[DemographicRecord],
    ) -> PollStatistics {
        let mut stats = PollStatistics {
            total_responses: responses.len() as u64,
            total_demographics: demographics.len() as u64,
            ..PollStatistics::default()
        };

        let mut timeline: BTreeMap<_, u64> = BTreeMap::new();
        for response in responses {
            *stats
                .polls_by_category
                .entry(response.category.clone())
                .or_default() += 1;
            *stats
                .responses_by_country
                .entry(response.country().to_string())
                .or_default() += 1;
            *timeline.entry(response.timestamp.date_naive()).or_default() += 1;
        }
        stats.response_timeline = timeline
            .into_iter()
            .map(|(date, count)| TimelinePoint { date, count })
            .collect();

        for demo in demographics {
            *stats
                .responses_by_age
                .entry(demo.age_group.clone())
                .or_default() += 1;
            *stats
                .responses_by_affiliation
                .entry(demo.affiliation.clone())
                .or_default() += 1;
            *stats
                .responses_by_residence
                .entry(demo.residence.clone())
                .or_default() += 1;
        }
        stats
    }
}

/// Whole days, rounded up, that a response is old.
fn age_in_days(elapsed: Duration) -> i64 {
    let millis = elapsed.num_milliseconds().max(0);
    let day = Duration::days(1).num_milliseconds();
    (millis + day - 1) / day
}
