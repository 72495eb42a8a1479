mod common;

use anyhow::Result;
use learner_summary_api::database::models::Metric;
use reqwest::StatusCode;
use serde_json::Value;

async fn get_json(url: String) -> Result<(StatusCode, Value)> {
    let res = reqwest::get(url).await?;
    let status = res.status();
    Ok((status, res.json::<Value>().await?))
}

#[tokio::test]
async fn summary_round_trip() -> Result<()> {
    let server = common::spawn_server(common::seeded_store()).await?;

    let (status, body) = get_json(format!(
        "{}/api/chat/mdl_user/{}",
        server.base_url,
        common::SEEDED_USER
    ))
    .await?;

    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert_eq!(body["success"], true);
    assert!(body["message"].is_string());

    let data = &body["data"];
    assert_eq!(data["user_id"], common::SEEDED_USER);
    assert_eq!(data["profile"]["id"], common::SEEDED_USER);
    assert_eq!(data["course_completed_count"], 3);
    assert_eq!(data["user_degree"], "B1");

    let categories = data["category_progress"].as_array().expect("category_progress array");
    assert_eq!(categories.len(), 7);
    let reading = categories
        .iter()
        .find(|c| c["category_group"] == "閱讀")
        .expect("reading category");
    assert_eq!(reading["total_courses"], 4);
    assert_eq!(reading["completed_courses"], 2);
    assert_eq!(reading["completion_percent"], 50.0);

    let stats = &data["thirty_day_stats"];
    assert_eq!(stats["enrolled_courses_30days"], 0);
    assert!(stats["current_timestamp"].is_i64());
    assert!(stats["thirty_days_ago_timestamp"].is_i64());
    Ok(())
}

#[tokio::test]
async fn unknown_user_is_404_without_metric_queries() -> Result<()> {
    let server = common::spawn_server(common::seeded_store()).await?;

    let (status, body) = get_json(format!("{}/api/chat/mdl_user/999", server.base_url)).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap_or_default().contains("999"));
    assert!(body.get("data").is_none());
    assert_eq!(server.store.auxiliary_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn failing_count_still_succeeds() -> Result<()> {
    let store = common::seeded_store().failing(Metric::CompletedCourseCount);
    let server = common::spawn_server(store).await?;

    let (status, body) = get_json(format!(
        "{}/api/chat/mdl_user/{}",
        server.base_url,
        common::SEEDED_USER
    ))
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["course_completed_count"], 0);
    Ok(())
}

#[tokio::test]
async fn failing_thirty_day_stats_omit_timestamps() -> Result<()> {
    let store = common::seeded_store().failing(Metric::ThirtyDayStats);
    let server = common::spawn_server(store).await?;

    let (status, body) = get_json(format!(
        "{}/api/chat/mdl_user/{}",
        server.base_url,
        common::SEEDED_USER
    ))
    .await?;

    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"]["thirty_day_stats"];
    assert_eq!(stats["completion_rate_30days"], 0.0);
    assert!(stats.get("current_timestamp").is_none());
    assert!(stats.get("thirty_days_ago_timestamp").is_none());
    Ok(())
}

#[tokio::test]
async fn connection_failure_is_500() -> Result<()> {
    let server = common::spawn_server(common::seeded_store().unreachable()).await?;

    let (status, body) = get_json(format!(
        "{}/api/chat/mdl_user/{}",
        server.base_url,
        common::SEEDED_USER
    ))
    .await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap_or_default().contains("tunnel is down"));
    Ok(())
}

#[tokio::test]
async fn non_numeric_id_is_rejected() -> Result<()> {
    let server = common::spawn_server(common::seeded_store()).await?;

    let (status, body) = get_json(format!("{}/api/chat/mdl_user/abc", server.base_url)).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(server.store.calls("find_profile"), 0);
    Ok(())
}

#[tokio::test]
async fn profile_and_recent_endpoints() -> Result<()> {
    let store = common::seeded_store()
        .with_profile(learner_summary_api::testing::sample_profile(12))
        .with_profile(learner_summary_api::testing::sample_profile(13));
    let server = common::spawn_server(store).await?;

    let (status, body) =
        get_json(format!("{}/api/chat/mdl_user/12/profile", server.base_url)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "learner12");
    assert_eq!(server.store.auxiliary_calls(), 0);

    let (status, body) =
        get_json(format!("{}/api/chat/mdl_user?limit=2", server.base_url)).await?;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["data"]
        .as_array()
        .expect("data array")
        .iter()
        .filter_map(|p| p["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![common::SEEDED_USER, 13]);
    Ok(())
}

#[tokio::test]
async fn malformed_limit_gets_json_envelope() -> Result<()> {
    let server = common::spawn_server(common::seeded_store()).await?;

    let res = reqwest::get(format!("{}/api/chat/mdl_user?limit=abc", server.base_url)).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let content_type = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("application/json"), "content-type: {}", content_type);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(server.store.calls("recent_profiles"), 0);
    Ok(())
}
