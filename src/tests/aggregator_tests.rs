use chrono::{Duration, Utc};

use super::test_utils::{response, response_at, test_catalog, AGE_GROUPS};
use crate::{
    error::PollsError,
    models::{
        aggregate::{FilterSet, TimeWindow},
        response::PollResponse,
    },
    repositories::response_repository::SessionIndex,
    services::aggregator::Aggregator,
};

fn index_for(responses: &[PollResponse]) -> SessionIndex {
    SessionIndex::build(test_catalog().demographics(), responses)
}

fn tallies(result: &crate::models::aggregate::AggregateResult) -> Vec<(String, u64, f64)> {
    result
        .options
        .iter()
        .map(|t| (t.option.clone(), t.count, t.percentage))
        .collect()
}

#[test]
fn counts_and_rounds_to_one_decimal() {
    let catalog = test_catalog();
    let responses = vec![
        response("p1", "A", "s1"),
        response("p1", "A", "s2"),
        response("p1", "B", "s3"),
    ];
    let index = index_for(&responses);

    let result = Aggregator::new(&catalog, &index)
        .aggregate("p1", &responses, &FilterSet::default())
        .unwrap();

    assert_eq!(result.total, 3);
    assert_eq!(
        tallies(&result),
        vec![("A".to_string(), 2, 66.7), ("B".to_string(), 1, 33.3)]
    );
}

#[test]
fn no_matches_reports_every_option_at_zero() {
    let catalog = test_catalog();
    let responses = vec![response("p2", "Yes", "s1")];
    let index = index_for(&responses);

    let result = Aggregator::new(&catalog, &index)
        .aggregate("p1", &responses, &FilterSet::default())
        .unwrap();

    assert_eq!(result.total, 0);
    assert_eq!(
        tallies(&result),
        vec![("A".to_string(), 0, 0.0), ("B".to_string(), 0, 0.0)]
    );
    assert_eq!(result.percentage_sum(), 0.0);
}

#[test]
fn options_follow_first_appearance() {
    let catalog = test_catalog();
    let responses = vec![
        response("p2", "Maybe", "s1"),
        response("p2", "Yes", "s2"),
        response("p2", "Maybe", "s3"),
    ];
    let index = index_for(&responses);

    let result = Aggregator::new(&catalog, &index)
        .aggregate("p2", &responses, &FilterSet::default())
        .unwrap();

    let order: Vec<&str> = result.options.iter().map(|t| t.option.as_str()).collect();
    assert_eq!(order, vec!["Maybe", "Yes"]);
}

#[test]
fn age_poll_reports_in_fixed_order() {
    let catalog = test_catalog();
    let responses = vec![
        response("age", "18-24", "s1"),
        response("age", "50+", "s2"),
        response("age", "18-24", "s3"),
    ];
    let index = index_for(&responses);

    let result = Aggregator::new(&catalog, &index)
        .aggregate("age", &responses, &FilterSet::default())
        .unwrap();

    let order: Vec<&str> = result.options.iter().map(|t| t.option.as_str()).collect();
    assert_eq!(order, AGE_GROUPS.to_vec());
    let percentages: Vec<f64> = result.options.iter().map(|t| t.percentage).collect();
    assert_eq!(percentages, vec![0.0, 66.7, 0.0, 0.0, 33.3]);
}

#[test]
fn percentages_sum_to_one_hundred() {
    let catalog = test_catalog();
    let responses = vec![
        response("p2", "Yes", "s1"),
        response("p2", "No", "s2"),
        response("p2", "Maybe", "s3"),
    ];
    let index = index_for(&responses);

    let result = Aggregator::new(&catalog, &index)
        .aggregate("p2", &responses, &FilterSet::default())
        .unwrap();

    assert!((result.percentage_sum() - 100.0).abs() <= 0.1 + 1e-9);
}

#[test]
fn aggregation_is_idempotent() {
    let catalog = test_catalog();
    let now = Utc::now();
    let responses = vec![
        response("p1", "B", "s1"),
        response("p1", "A", "s2"),
        response("age", "25-34", "s1"),
    ];
    let index = index_for(&responses);
    let aggregator = Aggregator::at(&catalog, &index, now);
    let filters = FilterSet {
        age: Some("25-34".to_string()),
        ..FilterSet::default()
    };

    let first = aggregator.aggregate("p1", &responses, &filters).unwrap();
    let second = aggregator.aggregate("p1", &responses, &filters).unwrap();

    assert_eq!(first, second);
}

#[test]
fn demographic_filters_join_on_session() {
    let catalog = test_catalog();
    let responses = vec![
        response("age", "18-24", "young"),
        response("residence", "Urban", "young"),
        response("p1", "A", "young"),
        response("age", "50+", "older"),
        response("residence", "Urban", "older"),
        response("p1", "B", "older"),
        response("p1", "B", "anonymous"),
    ];
    let index = index_for(&responses);
    let aggregator = Aggregator::new(&catalog, &index);

    let young = aggregator
        .aggregate(
            "p1",
            &responses,
            &FilterSet {
                age: Some("18-24".to_string()),
                ..FilterSet::default()
            },
        )
        .unwrap();
    assert_eq!(young.total, 1);
    assert_eq!(young.get("A").map(|t| t.count), Some(1));

    let urban = aggregator
        .aggregate(
            "p1",
            &responses,
            &FilterSet {
                residence: Some("Urban".to_string()),
                ..FilterSet::default()
            },
        )
        .unwrap();
    assert_eq!(urban.total, 2);

    let nobody = aggregator
        .aggregate(
            "p1",
            &responses,
            &FilterSet {
                age: Some("18-24".to_string()),
                affiliation: Some("Party X".to_string()),
                ..FilterSet::default()
            },
        )
        .unwrap();
    assert_eq!(nobody.total, 0);
}

#[test]
fn country_and_time_filters_use_record_fields() {
    let catalog = test_catalog();
    let now = Utc::now();
    let responses = vec![
        response_at("p1", "A", "s1", "Nepal", now - Duration::hours(2)),
        response_at("p1", "B", "s2", "India", now - Duration::days(3)),
        response_at("p1", "B", "s3", "Nepal", now - Duration::days(20)),
        response_at("p1", "A", "s4", "Nepal", now - Duration::days(45)),
    ];
    let index = index_for(&responses);
    let aggregator = Aggregator::at(&catalog, &index, now);
    let total_for = |filters: FilterSet| {
        aggregator
            .aggregate("p1", &responses, &filters)
            .unwrap()
            .total
    };

    assert_eq!(
        total_for(FilterSet {
            country: Some("Nepal".to_string()),
            ..FilterSet::default()
        }),
        3
    );
    assert_eq!(
        total_for(FilterSet {
            time: Some(TimeWindow::Today),
            ..FilterSet::default()
        }),
        1
    );
    assert_eq!(
        total_for(FilterSet {
            time: Some(TimeWindow::Week),
            ..FilterSet::default()
        }),
        2
    );
    assert_eq!(
        total_for(FilterSet {
            time: Some(TimeWindow::Month),
            country: Some("Nepal".to_string()),
            ..FilterSet::default()
        }),
        2
    );
}

#[test]
fn day_windows_round_age_up() {
    let catalog = test_catalog();
    let now = Utc::now();
    let responses = vec![
        response_at("p1", "A", "s1", "Nepal", now - Duration::days(1)),
        response_at("p1", "A", "s2", "Nepal", now - Duration::days(1) - Duration::minutes(1)),
    ];
    let index = index_for(&responses);

    let today = Aggregator::at(&catalog, &index, now)
        .aggregate(
            "p1",
            &responses,
            &FilterSet {
                time: Some(TimeWindow::Today),
                ..FilterSet::default()
            },
        )
        .unwrap();

    assert_eq!(today.total, 1);
}

#[test]
fn unknown_poll_is_not_found() {
    let catalog = test_catalog();
    let index = index_for(&[]);

    let result = Aggregator::new(&catalog, &index).aggregate("nope", &[], &FilterSet::default());

    assert_eq!(result, Err(PollsError::PollNotFound));
}

#[test]
fn country_histogram_keeps_top_ten_in_stable_order() {
    let catalog = test_catalog();
    let mut responses = Vec::new();
    for (i, country) in [
        "Nepal", "India", "Japan", "Qatar", "Germany", "Canada", "Brazil", "Kenya", "Peru",
        "Chile", "Norway", "Spain",
    ]
    .iter()
    .enumerate()
    {
        responses.push(response_at("p1", "A", &format!("s{i}"), country, Utc::now()));
    }
    responses.push(response_at("p1", "B", "extra1", "Spain", Utc::now()));
    responses.push(response_at("p1", "B", "extra2", "Spain", Utc::now()));
    responses.push(response_at("p1", "B", "extra3", "India", Utc::now()));
    let index = index_for(&responses);

    let histogram =
        Aggregator::new(&catalog, &index).country_histogram(&responses, &FilterSet::default());

    assert_eq!(histogram.len(), 10);
    let names: Vec<&str> = histogram.iter().map(|c| c.country.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Spain", "India", "Nepal", "Japan", "Qatar", "Germany", "Canada", "Brazil", "Kenya",
            "Peru"
        ]
    );
    assert_eq!(histogram[0].count, 3);
    assert_eq!(histogram[0].percentage, 20.0);
}

#[test]
fn statistics_summarize_every_dimension() {
    let catalog = test_catalog();
    let responses = vec![
        response_at("p1", "A", "s1", "Nepal", Utc::now()),
        response_at("p1", "B", "s2", "India", Utc::now()),
    ];
    let index = index_for(&responses);
    let demographics = vec![crate::models::response::DemographicRecord {
        age_group: "18-24".to_string(),
        residence: "Urban".to_string(),
        affiliation: "Independent".to_string(),
        timestamp: Utc::now(),
        session_id: "s1".to_string(),
        user_country: "Nepal".to_string(),
    }];

    let stats = Aggregator::new(&catalog, &index).statistics(&responses, &demographics);

    assert_eq!(stats.total_responses, 2);
    assert_eq!(stats.total_demographics, 1);
    assert_eq!(stats.polls_by_category.get("Governance"), Some(&2));
    assert_eq!(stats.responses_by_country.get("India"), Some(&1));
    assert_eq!(stats.responses_by_age.get("18-24"), Some(&1));
    assert_eq!(stats.responses_by_residence.get("Urban"), Some(&1));
    assert_eq!(stats.responses_by_affiliation.get("Independent"), Some(&1));
    assert_eq!(stats.response_timeline.iter().map(|p| p.count).sum::<u64>(), 2);
}
