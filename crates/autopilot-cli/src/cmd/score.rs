use super::{load_valid_config, read_json};
use crate::output::{print_json, print_table};
use autopilot_core::risk::{RiskScore, RiskScorer};
use autopilot_core::types::ActionRequest;
use std::path::Path;

/// Accepts a single request object or an array of them.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ScoreInput {
    One(ActionRequest),
    Many(Vec<ActionRequest>),
}

pub fn run(config: Option<&Path>, input: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_valid_config(config)?;
    let scorer = RiskScorer::new(config.risk);

    match read_json::<ScoreInput>(input)? {
        ScoreInput::One(request) => {
            let score = scorer.score(&request)?;
            if json {
                print_json(&score)?;
            } else {
                print_score(&request, &score);
            }
        }
        ScoreInput::Many(requests) => {
            let results = scorer.score_batch(&requests);
            if json {
                let list: Vec<serde_json::Value> = requests
                    .iter()
                    .zip(&results)
                    .map(|(req, result)| match result {
                        Ok(score) => serde_json::json!({ "id": req.id, "result": score }),
                        Err(e) => serde_json::json!({
                            "id": req.id,
                            "error": e.to_string(),
                            "kind": e.kind(),
                        }),
                    })
                    .collect();
                print_json(&list)?;
            } else {
                let rows = requests
                    .iter()
                    .zip(&results)
                    .map(|(req, result)| match result {
                        Ok(s) => vec![
                            req.id.clone(),
                            req.action.to_string(),
                            format!("{:.2}", s.value),
                            s.band.to_string(),
                            s.recommendation.to_string(),
                        ],
                        Err(e) => vec![
                            req.id.clone(),
                            req.action.to_string(),
                            "-".to_string(),
                            "-".to_string(),
                            format!("error: {e}"),
                        ],
                    })
                    .collect();
                print_table(&["ID", "ACTION", "VALUE", "BAND", "ADVICE"], rows);
            }
        }
    }
    Ok(())
}

fn print_score(request: &ActionRequest, score: &RiskScore) {
    println!(
        "{} {} on {}: {:.2} ({}, {})",
        request.id, request.action, request.target_id, score.value, score.band, score.recommendation
    );
    let rows = score
        .factors
        .iter()
        .map(|f| {
            vec![
                f.name.clone(),
                format!("{:.2}", f.score),
                format!("{:.2}", f.weight),
                f.reason.clone(),
            ]
        })
        .collect();
    print_table(&["FACTOR", "SCORE", "WEIGHT", "REASON"], rows);
}
