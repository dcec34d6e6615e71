use shroud_lattice::Scheme;
use shroud_runtime::{
    AggregationMode, AggregationRequest, ArithmeticOp, ArithmeticRequest, ScoringRequest,
    SimilarityRequest, VoteRequest,
};

use crate::{assert_close, get_engine};

#[test]
fn weighted_scoring() {
    let engine = get_engine();

    let result = engine
        .weighted_score(&ScoringRequest {
            metric_a: vec![0.9, 0.1, 0.5],
            metric_b: vec![0.1, 0.9, 0.5],
            weight_a: vec![0.7],
            weight_b: vec![0.3],
            scheme: None,
            preset: None,
        })
        .unwrap();

    assert_close(&result.scores, &[0.66, 0.34, 0.5], 1e-3);
    assert_eq!(result.best_index, 0);
}

#[test]
fn similarity_ranks_the_query_first() {
    let engine = get_engine();
    let query = vec![0.5, -1.0, 2.0, 0.25];

    let result = engine
        .similarity_rank(&SimilarityRequest {
            query: query.clone(),
            candidates: vec![
                vec![0.1, 0.1, 0.1, 0.1],
                vec![-0.5, 1.0, -2.0, -0.25],
                query.clone(),
                vec![0.0, 0.0, 1.0, 0.0],
            ],
            preset: None,
        })
        .unwrap();

    let order = result.ranking.iter().map(|r| r.index).collect::<Vec<_>>();
    assert_eq!(order, vec![2, 3, 0, 1]);
}

#[test]
fn aggregation_vectors() {
    let engine = get_engine();
    let participants = vec![
        vec![1.0, 2.0, 3.0, 4.0],
        vec![0.5, 1.5, 2.5, 3.5],
        vec![2.0, 3.0, 1.0, 0.5],
    ];

    let sum = engine
        .aggregate(&AggregationRequest {
            participants: participants.clone(),
            mode: AggregationMode::Sum,
            scheme: None,
            preset: None,
        })
        .unwrap();

    assert_close(&sum.values, &[3.5, 6.5, 6.5, 8.0], 1e-3);

    let average = engine
        .aggregate(&AggregationRequest {
            participants,
            mode: AggregationMode::Average,
            scheme: None,
            preset: Some("standard".to_owned()),
        })
        .unwrap();

    assert_close(
        &average.values,
        &[3.5 / 3.0, 6.5 / 3.0, 6.5 / 3.0, 8.0 / 3.0],
        1e-3,
    );
}

#[test]
fn vote_tally() {
    let engine = get_engine();

    let result = engine
        .tally_votes(&VoteRequest {
            votes: vec![0, 1, 2, 0, 1, 0, 2, 1, 0, 0],
            num_candidates: 3,
            preset: None,
        })
        .unwrap();

    assert_eq!(result.tallies, vec![5, 3, 2]);
    assert_eq!(result.winner_label, "candidate_0");
}

#[test]
fn verified_arithmetic_on_the_standard_preset() {
    let engine = get_engine();
    let a = (0..100).map(|i| i as f64 / 10.0).collect::<Vec<_>>();
    let b = (0..100).map(|i| 1.0 - i as f64 / 50.0).collect::<Vec<_>>();

    for scheme in [Scheme::ApproxReal, Scheme::ExactInteger] {
        let result = engine
            .verified_arithmetic(&ArithmeticRequest {
                a: a.clone(),
                b: b.clone(),
                operations: vec![
                    ArithmeticOp::Add,
                    ArithmeticOp::Multiply,
                    ArithmeticOp::DotProduct,
                    ArithmeticOp::Negate,
                ],
                scheme,
                preset: Some("standard".to_owned()),
            })
            .unwrap();

        let tol = match scheme {
            Scheme::ApproxReal => 5e-2,
            Scheme::ExactInteger => 0.0,
        };

        for outcome in result.outcomes {
            assert!(outcome.max_abs_error <= tol, "{scheme}: {outcome:?}");
        }
    }
}
